//! `docpilot ask` — Interactive or single-message support chat.

use super::{CliResult, load_config, open_index, open_store};
use docpilot_config::AppConfig;
use docpilot_core::event::{DomainEvent, EventBus};
use docpilot_core::message::ThreadId;
use docpilot_core::retriever::Retriever;
use docpilot_workflow::WorkflowEngine;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

pub async fn run(thread: Option<String>, message: Option<String>, show_steps: bool) -> CliResult {
    let config = load_config()?;

    // Check for API key early — give a clear error
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export OPENAI_API_KEY=sk-...");
        eprintln!("    export DOCPILOT_API_KEY=sk-...   (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let engine = build_engine(&config).await?;
    let thread_id = thread
        .map(|t| ThreadId::from(&t))
        .unwrap_or_default();

    if show_steps || config.workflow.surface_tool_activity {
        spawn_step_printer(engine.event_bus());
    }

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let outcome = engine.run_turn(&thread_id, &msg).await;
        eprint!("\r              \r");
        let outcome = outcome?;
        println!("{}", outcome.answer.content);
        eprintln!("  (thread: {thread_id})");
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║     docpilot Support — Interactive Mode      ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Products:  {}", config.assistant.product_families.join(", "));
    println!("  Thread:    {thread_id}");
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        eprint!("  ...");
        match engine.run_turn(&thread_id, line).await {
            Ok(outcome) => {
                eprint!("\r     \r");
                println!();
                for text in outcome.answer.content.lines() {
                    println!("  Assistant > {text}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye! (thread: {thread_id})");
    println!();
    Ok(())
}

/// Wire provider, index, tools and checkpoint store into an engine.
async fn build_engine(config: &AppConfig) -> Result<WorkflowEngine, Box<dyn std::error::Error>> {
    let router = docpilot_providers::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;

    let index = open_index(config).await?;
    if config.knowledge.docs_dir.is_dir() {
        match index.sync_folder(&config.knowledge.docs_dir).await {
            Ok(report) if !report.added.is_empty() => {
                eprintln!("  Indexed {} new document(s)", report.added.len());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Document sync failed; using existing index"),
        }
    }
    let retriever: Arc<dyn Retriever> = Arc::new(index);
    let tools = Arc::new(docpilot_tools::build_registry(config, retriever));

    let store = open_store(config).await?;
    let event_bus = Arc::new(EventBus::default());

    Ok(WorkflowEngine::from_config(config, provider, tools, store, event_bus)
        .map_err(|e| format!("Invalid workflow: {e}"))?)
}

fn spawn_step_printer(bus: Arc<EventBus>) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        eprintln!("  · {line}");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// One-line description of the events worth showing to a user.
fn describe(event: &DomainEvent) -> Option<String> {
    match event {
        DomainEvent::NodeEntered { node, .. } => Some(node.clone()),
        DomainEvent::ToolExecuted {
            tool_name,
            success,
            duration_ms,
            ..
        } => Some(format!(
            "{tool_name} {} in {duration_ms}ms",
            if *success { "returned" } else { "failed" }
        )),
        DomainEvent::GradeComputed {
            relevant,
            model_consulted,
            ..
        } => Some(format!(
            "context {} ({})",
            if *relevant { "relevant" } else { "not relevant" },
            if *model_consulted { "model grade" } else { "keyword check" }
        )),
        DomainEvent::MessageAppended { node, content, .. } if node == "rewrite" => {
            Some(format!("rewritten question: {content}"))
        }
        _ => None,
    }
}
