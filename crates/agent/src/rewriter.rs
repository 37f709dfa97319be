//! Query rewriter — reformulates a question that retrieved nothing relevant.

use crate::model::NodeModel;
use crate::prompts;
use docpilot_core::error::Result;
use docpilot_core::message::{ConversationState, META_REWRITTEN_FROM, Message};
use tracing::info;

pub struct QueryRewriter {
    model: NodeModel,
}

impl QueryRewriter {
    pub fn new(model: NodeModel) -> Self {
        Self { model }
    }

    /// Ask the model for an improved question and append it as a user
    /// message tagged with the ID of the question it rewrites.
    ///
    /// `previous` is the last reformulation of this turn, if any.
    pub async fn run(
        &self,
        state: &mut ConversationState,
        original: &Message,
        previous: Option<&str>,
    ) -> Result<Message> {
        let response = self
            .model
            .prompt(prompts::rewrite_prompt(&original.content, previous))
            .await?;

        let text = response.message.content.trim();
        // An empty reformulation would leave the next pass without a question.
        let text = if text.is_empty() {
            original.content.as_str()
        } else {
            text
        };

        let message = Message::user(text).with_metadata(META_REWRITTEN_FROM, original.id.clone());
        info!(thread_id = %state.thread_id, rewritten = %message.content, "Question rewritten");

        state.push(message.clone());
        Ok(message)
    }
}
