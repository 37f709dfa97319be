//! Reasoning agent — decides whether to answer directly or call tools.
//!
//! Prepends the system prompt once per thread, then asks the model, bound
//! to every registered tool, for the next step. Exactly one assistant
//! message is appended per run.

use crate::model::NodeModel;
use chrono::Utc;
use docpilot_core::error::Result;
use docpilot_core::event::{DomainEvent, EventBus};
use docpilot_core::message::{ConversationState, Message};
use docpilot_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, info};

pub struct ReasoningAgent {
    model: NodeModel,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    event_bus: Option<Arc<EventBus>>,
}

impl ReasoningAgent {
    pub fn new(model: NodeModel, tools: Arc<ToolRegistry>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            tools,
            system_prompt: system_prompt.into(),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run one reasoning step.
    ///
    /// `active_question` is the reformulated question when the turn has been
    /// through the rewriter; the model is told explicitly to work on it.
    /// Model failures propagate and end the turn.
    pub async fn run(
        &self,
        state: &mut ConversationState,
        active_question: Option<&str>,
    ) -> Result<Message> {
        if state.ensure_system_prompt(&self.system_prompt) {
            debug!(thread_id = %state.thread_id, "System prompt added to thread");
        }

        let mut messages = state.messages().to_vec();
        if let Some(question) = active_question {
            // Request-only note; never stored in the thread.
            messages.push(Message::system(format!(
                "The active question for this step is the reformulated one: {question}"
            )));
        }

        let response = self
            .model
            .complete(messages, self.tools.definitions(), None)
            .await?;

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ResponseGenerated {
                thread_id: state.thread_id.to_string(),
                node: "agent".into(),
                model: response.model.clone(),
                tokens_used: response.usage.as_ref().map_or(0, |u| u.total_tokens),
                timestamp: Utc::now(),
            });
        }

        let mut message = response.message;
        message.tool_call_id = None;

        info!(
            thread_id = %state.thread_id,
            tool_calls = message.tool_calls.len(),
            "Reasoning step complete"
        );

        state.push(message.clone());
        Ok(message)
    }
}
