//! Per-turn working state.

use docpilot_core::message::{ConversationState, Message};
use std::fmt;

/// The nodes of the support workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Agent,
    Tools,
    Rewrite,
    Generate,
}

impl NodeId {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeId::Agent => "agent",
            NodeId::Tools => "tool_executor",
            NodeId::Rewrite => "rewrite",
            NodeId::Generate => "generate",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a turn carries besides the message log itself.
///
/// The rewrite counter and the active question live here, never in the
/// conversation, so they reset with every turn.
#[derive(Debug, Clone)]
pub struct TurnState {
    pub conversation: ConversationState,

    /// The user message that started this turn
    pub original_question: Message,

    /// The question retrieval is currently working on
    pub active_question: String,

    /// Most recent reformulation, if the turn has been rewritten
    pub last_rewrite: Option<String>,

    pub rewrites: u32,

    /// Nodes visited so far, in order
    pub path: Vec<NodeId>,
}

impl TurnState {
    /// Start a turn by appending the user's message to the conversation.
    pub fn begin(mut conversation: ConversationState, user_text: impl Into<String>) -> Self {
        let question = Message::user(user_text);
        conversation.push(question.clone());
        Self {
            active_question: question.content.clone(),
            original_question: question,
            conversation,
            last_rewrite: None,
            rewrites: 0,
            path: Vec::new(),
        }
    }

    /// Position of the turn's user message in the log.
    ///
    /// Looked up by ID because the system prompt may be prepended mid-turn.
    pub fn turn_start(&self) -> usize {
        self.conversation
            .messages()
            .iter()
            .position(|m| m.id == self.original_question.id)
            .unwrap_or(0)
    }

    /// Record a reformulated question.
    pub fn record_rewrite(&mut self, question: &str) {
        self.rewrites += 1;
        self.active_question = question.to_string();
        self.last_rewrite = Some(question.to_string());
    }

    /// Messages appended from the turn's user message onward.
    pub fn new_messages(&self) -> &[Message] {
        self.conversation.since(self.turn_start())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpilot_core::message::{Role, ThreadId};

    #[test]
    fn begin_appends_the_question() {
        let mut conversation = ConversationState::new(ThreadId::from("t1"));
        conversation.push(Message::user("earlier"));
        conversation.push(Message::assistant("earlier answer"));

        let turn = TurnState::begin(conversation, "How do I reset an MTCAP?");
        assert_eq!(turn.conversation.len(), 3);
        assert_eq!(turn.turn_start(), 2);
        assert_eq!(turn.active_question, "How do I reset an MTCAP?");
        assert_eq!(turn.new_messages()[0].role, Role::User);
        assert!(turn.last_rewrite.is_none());
    }

    #[test]
    fn turn_start_survives_system_prompt_insertion() {
        let conversation = ConversationState::new(ThreadId::from("t1"));
        let mut turn = TurnState::begin(conversation, "q");
        assert_eq!(turn.turn_start(), 0);

        turn.conversation.ensure_system_prompt("rules");
        assert_eq!(turn.turn_start(), 1);
        assert_eq!(turn.new_messages().len(), 1);
    }

    #[test]
    fn rewrites_update_active_question() {
        let mut turn = TurnState::begin(ConversationState::new(ThreadId::from("t1")), "xdot port?");
        turn.record_rewrite("Which AT command sets the xDot LoRa port?");
        assert_eq!(turn.rewrites, 1);
        assert_eq!(turn.active_question, "Which AT command sets the xDot LoRa port?");
        assert_eq!(turn.original_question.content, "xdot port?");
        assert_eq!(
            turn.last_rewrite.as_deref(),
            Some("Which AT command sets the xDot LoRa port?")
        );
    }

    #[test]
    fn node_names() {
        assert_eq!(NodeId::Tools.to_string(), "tool_executor");
        assert_eq!(NodeId::Agent.as_str(), "agent");
    }
}
