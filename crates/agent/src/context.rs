//! Helpers that read the conversation log on behalf of the nodes.

use docpilot_core::message::{ConversationState, META_REWRITTEN_FROM, Message, Role};

/// Tool-result messages produced for the most recent tool-requesting
/// assistant message, in call order.
pub fn latest_tool_results(state: &ConversationState) -> Vec<&Message> {
    let messages = state.messages();
    let Some(start) = messages.iter().rposition(|m| m.requests_tools()) else {
        return Vec::new();
    };
    messages[start + 1..]
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect()
}

/// Join the successful tool results into one context block.
///
/// Returns `None` when there is nothing usable, e.g. every call failed.
pub fn usable_context(results: &[&Message]) -> Option<String> {
    let parts: Vec<&str> = results
        .iter()
        .filter(|m| !m.is_tool_error())
        .map(|m| m.content.as_str())
        .filter(|c| !c.trim().is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// The last `limit` user questions and final answers in `messages`,
/// rendered as `User: ...` / `Assistant: ...` lines. Reformulated questions
/// are internal and left out.
pub fn history_excerpt(messages: &[Message], limit: usize) -> String {
    let lines: Vec<String> = messages
        .iter()
        .filter_map(|m| match m.role {
            Role::User if m.metadata.contains_key(META_REWRITTEN_FROM) => None,
            Role::User => Some(format!("User: {}", m.content)),
            Role::Assistant if !m.requests_tools() && !m.content.is_empty() => {
                Some(format!("Assistant: {}", m.content))
            }
            _ => None,
        })
        .collect();
    let skip = lines.len().saturating_sub(limit);
    lines[skip..].join("\n")
}
