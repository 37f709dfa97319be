//! Tool executor — runs the tool calls requested by the reasoning agent.
//!
//! Calls in one batch are dispatched concurrently, but results are appended
//! in the order the calls were requested, each stamped with its
//! `tool_call_id`. Failures never abort the turn: they become error-flagged
//! tool-result messages the reasoning agent sees on its next pass.

use chrono::Utc;
use docpilot_core::error::{Error, Result, ToolError};
use docpilot_core::event::{DomainEvent, EventBus};
use docpilot_core::message::{ConversationState, Message, MessageToolCall};
use docpilot_core::tool::{ToolCall, ToolRegistry};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct ToolExecutor {
    tools: Arc<ToolRegistry>,

    /// Limit on each individual tool invocation
    timeout: Duration,

    /// Extra attempts after a failed invocation (0 = call exactly once)
    retry_attempts: u32,

    event_bus: Option<Arc<EventBus>>,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: Duration::from_secs(60),
            retry_attempts: 0,
            event_bus: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Execute every call on the latest assistant message and append one
    /// tool-result message per call.
    pub async fn run(&self, state: &mut ConversationState) -> Result<Vec<Message>> {
        let calls = match state.last() {
            Some(last) if last.requests_tools() => last.tool_calls.clone(),
            _ => {
                return Err(Error::Internal(
                    "tool executor reached without pending tool calls".into(),
                ));
            }
        };

        info!(thread_id = %state.thread_id, count = calls.len(), "Executing tool calls");

        let results = join_all(calls.iter().map(|call| self.execute_one(call))).await;

        state.extend(results.iter().cloned());
        Ok(results)
    }

    async fn execute_one(&self, call: &MessageToolCall) -> Message {
        let started = Instant::now();
        let outcome = match ToolCall::from_message(call) {
            Ok(parsed) => self.invoke_with_retry(&parsed).await,
            Err(e) => Err(e),
        };

        let success = outcome.is_ok();
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ToolExecuted {
                tool_name: call.name.clone(),
                call_id: call.id.clone(),
                success,
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });
        }

        match outcome {
            Ok(output) => Message::tool_result(&call.id, output.text),
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool execution failed");
                Message::tool_error(&call.id, format!("Error: {e}"))
            }
        }
    }

    async fn invoke_with_retry(
        &self,
        call: &ToolCall,
    ) -> std::result::Result<docpilot_core::tool::ToolOutput, ToolError> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, self.tools.execute(call)).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                }),
            };

            match result {
                // Unknown tools and bad arguments will not improve on retry.
                Err(ToolError::NotFound(_)) | Err(ToolError::InvalidArguments(_)) => return result,
                Err(ref e) if attempt < self.retry_attempts => {
                    attempt += 1;
                    warn!(tool = %call.name, attempt, error = %e, "Retrying tool call");
                }
                _ => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use docpilot_core::message::{Role, ThreadId};

    fn state_requesting(calls: Vec<MessageToolCall>) -> ConversationState {
        let mut state = ConversationState::new(ThreadId::from("t1"));
        state.push(Message::user("q"));
        let mut request = Message::assistant("");
        request.tool_calls = calls;
        state.push(request);
        state
    }

    #[tokio::test]
    async fn results_follow_call_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(
            StaticTool::new("slow", "slow result").delayed(Duration::from_millis(50)),
        ));
        registry.register(Arc::new(StaticTool::new("fast", "fast result")));
        let executor = ToolExecutor::new(Arc::new(registry));

        let mut state = state_requesting(vec![
            make_tool_call("c1", "slow", serde_json::json!({})),
            make_tool_call("c2", "fast", serde_json::json!({})),
            make_tool_call("c3", "slow", serde_json::json!({})),
        ]);
        let appended = executor.run(&mut state).await.unwrap();

        let ids: Vec<&str> = appended
            .iter()
            .map(|m| m.tool_call_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(appended[1].content, "fast result");
        assert!(appended.iter().all(|m| m.role == Role::Tool));
        assert_eq!(state.len(), 5);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_message() {
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()));
        let mut state = state_requesting(vec![make_tool_call("c1", "missing", serde_json::json!({}))]);

        let appended = executor.run(&mut state).await.unwrap();
        assert!(appended[0].is_tool_error());
        assert!(appended[0].content.contains("Tool not found: missing"));
    }

    #[tokio::test]
    async fn failure_is_recorded_not_raised() {
        let mut registry = ToolRegistry::new();
        let tool = Arc::new(FlakyTool::broken("web_search"));
        registry.register(tool.clone());
        let executor = ToolExecutor::new(Arc::new(registry));

        let mut state = state_requesting(vec![make_tool_call("c1", "web_search", serde_json::json!({"query": "x"}))]);
        let appended = executor.run(&mut state).await.unwrap();

        assert!(appended[0].is_tool_error());
        assert!(appended[0].content.contains("network unreachable"));
        assert_eq!(tool.calls(), 1);
    }

    #[tokio::test]
    async fn retries_when_configured() {
        let mut registry = ToolRegistry::new();
        let tool = Arc::new(FlakyTool::new("web_search", 1));
        registry.register(tool.clone());
        let executor = ToolExecutor::new(Arc::new(registry)).with_retry_attempts(2);

        let mut state = state_requesting(vec![make_tool_call("c1", "web_search", serde_json::json!({}))]);
        let appended = executor.run(&mut state).await.unwrap();

        assert!(!appended[0].is_tool_error());
        assert_eq!(appended[0].content, "recovered");
        assert_eq!(tool.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(
            StaticTool::new("slow", "late").delayed(Duration::from_secs(120)),
        ));
        let executor = ToolExecutor::new(Arc::new(registry)).with_timeout(Duration::from_secs(5));

        let mut state = state_requesting(vec![make_tool_call("c1", "slow", serde_json::json!({}))]);
        let appended = executor.run(&mut state).await.unwrap();
        assert!(appended[0].is_tool_error());
        assert!(appended[0].content.contains("timed out"));
    }

    #[tokio::test]
    async fn invalid_arguments_become_error_message() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StaticTool::new("web_search", "x")));
        let executor = ToolExecutor::new(Arc::new(registry));

        let mut bad = make_tool_call("c1", "web_search", serde_json::json!({}));
        bad.arguments = "{oops".into();
        let mut state = state_requesting(vec![bad]);

        let appended = executor.run(&mut state).await.unwrap();
        assert!(appended[0].is_tool_error());
        assert!(appended[0].content.contains("Invalid tool arguments"));
    }

    #[tokio::test]
    async fn publishes_tool_events() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StaticTool::new("web_search", "x")));
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let executor = ToolExecutor::new(Arc::new(registry)).with_event_bus(bus);

        let mut state = state_requesting(vec![make_tool_call("c1", "web_search", serde_json::json!({}))]);
        executor.run(&mut state).await.unwrap();

        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::ToolExecuted { call_id, success, .. } => {
                assert_eq!(call_id, "c1");
                assert!(success);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn requires_pending_calls() {
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()));
        let mut state = ConversationState::new(ThreadId::from("t1"));
        state.push(Message::user("q"));
        assert!(executor.run(&mut state).await.is_err());
    }
}
