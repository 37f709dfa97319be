//! Answer generator — writes the final answer from the retrieved context.

use crate::context::{history_excerpt, latest_tool_results, usable_context};
use crate::model::NodeModel;
use crate::prompts::{self, SupportDomain};
use chrono::Utc;
use docpilot_core::error::Result;
use docpilot_core::event::{DomainEvent, EventBus};
use docpilot_core::message::{ConversationState, Message};
use std::sync::Arc;
use tracing::info;

/// Prior questions and answers shown to the generator.
const HISTORY_LINES: usize = 6;

const NO_CONTEXT: &str = "No relevant context was retrieved.";

pub struct AnswerGenerator {
    model: NodeModel,
    domain: SupportDomain,
    event_bus: Option<Arc<EventBus>>,
}

impl AnswerGenerator {
    pub fn new(model: NodeModel, domain: SupportDomain) -> Self {
        Self {
            model,
            domain,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Generate the final answer to `question` and append it.
    ///
    /// `turn_start` is the index of the current turn's user message; earlier
    /// messages are offered as conversation history.
    pub async fn run(
        &self,
        state: &mut ConversationState,
        question: &str,
        turn_start: usize,
    ) -> Result<Message> {
        let context = usable_context(&latest_tool_results(state))
            .unwrap_or_else(|| NO_CONTEXT.to_string());
        let earlier = &state.messages()[..turn_start.min(state.len())];
        let history = history_excerpt(earlier, HISTORY_LINES);

        let response = self
            .model
            .prompt(prompts::generate_prompt(&self.domain, question, &context, &history))
            .await?;

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ResponseGenerated {
                thread_id: state.thread_id.to_string(),
                node: "generate".into(),
                model: response.model.clone(),
                tokens_used: response.usage.as_ref().map_or(0, |u| u.total_tokens),
                timestamp: Utc::now(),
            });
        }

        let mut message = response.message;
        // The generator is never bound to tools.
        message.tool_calls.clear();

        info!(
            thread_id = %state.thread_id,
            model = %response.model,
            chars = message.content.len(),
            "Answer generated"
        );

        state.push(message.clone());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use docpilot_config::AssistantConfig;
    use docpilot_core::message::{Role, ThreadId};
    use std::sync::Arc;

    fn generator(provider: Arc<SequentialMockProvider>) -> AnswerGenerator {
        AnswerGenerator::new(
            NodeModel::new(provider, "gpt-4o"),
            SupportDomain::from(&AssistantConfig::default()),
        )
    }

    fn with_tool_results(results: Vec<Message>) -> ConversationState {
        let mut state = ConversationState::new(ThreadId::from("t1"));
        state.ensure_system_prompt("rules");
        state.push(Message::user("How do I set AT+PP on an xDot?"));
        let mut request = Message::assistant("");
        request.tool_calls = results
            .iter()
            .map(|m| make_tool_call(m.tool_call_id.as_deref().unwrap(), "technical_docs_retriever", serde_json::json!({})))
            .collect();
        state.push(request);
        state.extend(results);
        state
    }

    #[tokio::test]
    async fn uses_latest_tool_results_as_context() {
        let provider = Arc::new(SequentialMockProvider::single_text(
            "From internal documents (xdot-at.md): send AT+PP=2.",
        ));
        let answerer = generator(provider.clone());
        let mut state = with_tool_results(vec![
            Message::tool_result("c1", "Source: xdot-at.md\nSend AT+PP=2 then AT&W."),
            Message::tool_error("c2", "Error: web search down"),
        ]);

        let answer = answerer.run(&mut state, "How do I set AT+PP on an xDot?", 1).await.unwrap();
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(state.last().unwrap().content, answer.content);

        let prompt = &provider.requests()[0].messages[0].content;
        assert!(prompt.contains("Context: Source: xdot-at.md\nSend AT+PP=2 then AT&W."));
        assert!(!prompt.contains("web search down"));
        assert!(provider.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn no_context_is_stated() {
        let provider = Arc::new(SequentialMockProvider::single_text("I don't know."));
        let answerer = generator(provider.clone());
        let mut state = with_tool_results(vec![Message::tool_error("c1", "Error: timeout")]);

        let answer = answerer.run(&mut state, "q", 1).await.unwrap();
        assert_eq!(answer.content, "I don't know.");
        assert!(provider.requests()[0].messages[0].content.contains(NO_CONTEXT));
    }

    #[tokio::test]
    async fn earlier_turns_are_offered_as_history() {
        let provider = Arc::new(SequentialMockProvider::single_text("ok"));
        let answerer = generator(provider.clone());

        let mut state = ConversationState::new(ThreadId::from("t1"));
        state.ensure_system_prompt("rules");
        state.push(Message::user("How do I configure an MTCDT?"));
        state.push(Message::assistant("Use the MTCDT web UI."));
        let turn_start = state.len();
        state.push(Message::user("what about the IP version of that device"));
        let mut request = Message::assistant("");
        request.tool_calls = vec![make_tool_call("c1", "technical_docs_retriever", serde_json::json!({}))];
        state.push(request);
        state.push(Message::tool_result("c1", "Source: mtcdtip.md\nMTCDTIP setup"));

        answerer.run(&mut state, "what about the IP version of that device", turn_start)
            .await
            .unwrap();
        let prompt = &provider.requests()[0].messages[0].content;
        assert!(prompt.contains("User: How do I configure an MTCDT?"));
        assert!(prompt.contains("Assistant: Use the MTCDT web UI."));
        assert!(!prompt.contains("User: what about the IP version"));
    }
}
