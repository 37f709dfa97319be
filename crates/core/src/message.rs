//! Message and conversation-state domain types.
//!
//! These are the value objects that flow through a turn:
//! the user asks → the reasoning agent answers or requests tools → tool results
//! are appended → the grader/rewriter/generator append their own messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a multi-turn conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The language model
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// Metadata key marking a tool-result message that carries an error description.
pub const META_TOOL_ERROR: &str = "tool_error";

/// Metadata key marking a user message produced by the query rewriter.
pub const META_REWRITTEN_FROM: &str = "rewritten_from";

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Optional metadata (node that produced it, error flags, etc.)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Create a tool result message describing a failed invocation.
    pub fn tool_error(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::tool_result(tool_call_id, content).with_metadata(META_TOOL_ERROR, true)
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Whether this message is an assistant message requesting tools.
    pub fn requests_tools(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    /// Whether this is a tool result that reports a failure.
    pub fn is_tool_error(&self) -> bool {
        self.role == Role::Tool
            && self
                .metadata
                .get(META_TOOL_ERROR)
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

/// The append-only message log of one thread.
///
/// Messages are only ever appended. The single exception is the system
/// prompt, which is prepended once when the thread has none; afterwards it is
/// always `messages()[0]` and no other system message is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// The thread this state belongs to
    pub thread_id: ThreadId,

    messages: Vec<Message>,

    /// When this thread was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create an empty state for a thread.
    pub fn new(thread_id: ThreadId) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// All messages, in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message.
    ///
    /// System messages are routed through [`ensure_system_prompt`](Self::ensure_system_prompt),
    /// so a second system message is discarded instead of breaking the singleton.
    pub fn push(&mut self, message: Message) {
        if message.role == Role::System {
            if !self.ensure_system_prompt(message.content) {
                tracing::warn!(thread_id = %self.thread_id, "Ignoring extra system message");
            }
            return;
        }
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Append several messages in order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        for m in messages {
            self.push(m);
        }
    }

    /// Prepend the system prompt if the thread has none yet.
    ///
    /// Returns `true` if a system message was inserted.
    pub fn ensure_system_prompt(&mut self, prompt: impl Into<String>) -> bool {
        if self.has_system_prompt() {
            return false;
        }
        self.updated_at = Utc::now();
        self.messages.insert(0, Message::system(prompt));
        true
    }

    pub fn has_system_prompt(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::System)
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The most recent user message.
    pub fn last_user(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// The first non-system message of the thread.
    pub fn first_question(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role != Role::System)
    }

    /// Messages appended at or after `index`.
    pub fn since(&self, index: usize) -> &[Message] {
        &self.messages[index.min(self.messages.len())..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("How do I set AT+PP?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "How do I set AT+PP?");
        assert!(msg.tool_calls.is_empty());
        assert!(!msg.requests_tools());
    }

    #[test]
    fn tool_error_is_flagged() {
        let ok = Message::tool_result("call_1", "passage");
        let err = Message::tool_error("call_2", "Error: network down");
        assert!(!ok.is_tool_error());
        assert!(err.is_tool_error());
        assert_eq!(err.tool_call_id.as_deref(), Some("call_2"));
    }

    #[test]
    fn system_prompt_is_prepended_once() {
        let mut state = ConversationState::new(ThreadId::from("t1"));
        state.push(Message::user("hello"));

        assert!(state.ensure_system_prompt("rules"));
        assert!(!state.ensure_system_prompt("other rules"));

        assert_eq!(state.len(), 2);
        assert_eq!(state.messages()[0].role, Role::System);
        assert_eq!(state.messages()[0].content, "rules");
    }

    #[test]
    fn pushing_a_second_system_message_is_ignored() {
        let mut state = ConversationState::new(ThreadId::from("t1"));
        state.push(Message::system("first"));
        state.push(Message::user("q"));
        state.push(Message::system("second"));

        let systems = state
            .messages()
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        assert_eq!(systems, 1);
        assert_eq!(state.messages()[0].content, "first");
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn first_question_skips_system() {
        let mut state = ConversationState::new(ThreadId::from("t1"));
        state.push(Message::user("first question"));
        state.ensure_system_prompt("rules");
        state.push(Message::assistant("answer"));
        state.push(Message::user("follow-up"));

        assert_eq!(state.first_question().unwrap().content, "first question");
        assert_eq!(state.last_user().unwrap().content, "follow-up");
    }

    #[test]
    fn since_returns_tail() {
        let mut state = ConversationState::new(ThreadId::from("t1"));
        state.push(Message::user("a"));
        state.push(Message::assistant("b"));
        assert_eq!(state.since(1).len(), 1);
        assert!(state.since(10).is_empty());
    }

    #[test]
    fn state_serialization_roundtrip() {
        let mut state = ConversationState::new(ThreadId::from("t1"));
        state.push(Message::user("Test message"));
        let json = serde_json::to_string(&state).unwrap();
        let restored: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.thread_id, ThreadId::from("t1"));
        assert_eq!(restored.messages(), state.messages());
    }
}
