//! Domain event system — decoupled observation of workflow progress.
//!
//! The engine publishes an event for every node entered, routing decision,
//! tool invocation and appended message. Front-ends subscribe to decide what
//! intermediate activity to show; nothing in the workflow depends on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The engine started running a node
    NodeEntered {
        thread_id: String,
        node: String,
        timestamp: DateTime<Utc>,
    },

    /// The engine took an edge
    Routed {
        thread_id: String,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// A message was appended to the conversation state
    MessageAppended {
        thread_id: String,
        node: String,
        role: String,
        content: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        call_id: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The relevance grader reached a decision
    GradeComputed {
        thread_id: String,
        relevant: bool,
        model_consulted: bool,
        timestamp: DateTime<Utc>,
    },

    /// A node received a model response
    ResponseGenerated {
        thread_id: String,
        node: String,
        model: String,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A turn reached its end state
    TurnCompleted {
        thread_id: String,
        rewrites: u32,
        steps: usize,
        timestamp: DateTime<Utc>,
    },

    /// A turn was aborted by a fatal error
    TurnFailed {
        thread_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
