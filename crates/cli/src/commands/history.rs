//! `docpilot history` — Show stored conversation threads.

use super::{CliResult, load_config, open_store};
use docpilot_core::message::{Role, ThreadId};

pub async fn run(thread: Option<String>) -> CliResult {
    let config = load_config()?;
    let store = open_store(&config).await?;

    let Some(thread) = thread else {
        let threads = store
            .threads()
            .await
            .map_err(|e| format!("Failed to list threads: {e}"))?;
        if threads.is_empty() {
            println!("  No conversations stored yet.");
        }
        for id in threads {
            println!("  {id}");
        }
        return Ok(());
    };

    let thread_id = ThreadId::from(&thread);
    let state = store
        .get(&thread_id)
        .await
        .map_err(|e| format!("Failed to load thread: {e}"))?
        .ok_or_else(|| format!("No conversation stored for thread '{thread}'"))?;

    println!("🧵 Thread {thread_id} ({} messages)", state.len());
    println!();
    for message in state.messages() {
        let label = match message.role {
            Role::System => continue,
            Role::User => "You",
            Role::Assistant if message.requests_tools() => {
                let names: Vec<&str> = message.tool_calls.iter().map(|c| c.name.as_str()).collect();
                println!("  [tools] {}", names.join(", "));
                continue;
            }
            Role::Assistant => "Assistant",
            Role::Tool if message.is_tool_error() => "Tool error",
            Role::Tool => "Tool",
        };
        let mut lines = message.content.lines();
        if let Some(first) = lines.next() {
            println!("  {label} > {first}");
        }
        for line in lines {
            println!("  {:width$}   {line}", "", width = label.len());
        }
    }
    Ok(())
}
