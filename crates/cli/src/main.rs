//! docpilot CLI — the main entry point.
//!
//! Commands:
//! - `onboard` — Initialize config & folders
//! - `ask`     — Interactive chat or single-message mode
//! - `ingest`  — Index new documents from the docs folder
//! - `docs`    — List or remove indexed documents
//! - `history` — Show a stored conversation thread
//! - `doctor`  — Diagnose configuration and connectivity

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "docpilot",
    about = "docpilot — technical support assistant over your product documents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and folders
    Onboard,

    /// Ask the support assistant
    Ask {
        /// Conversation thread to continue (a new one is started if omitted)
        #[arg(short, long)]
        thread: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Print intermediate workflow steps (tool calls, grades, rewrites)
        #[arg(long)]
        show_steps: bool,
    },

    /// Index new documents from the docs folder
    Ingest,

    /// Manage indexed documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Show a conversation thread (lists threads if none given)
    History {
        thread: Option<String>,
    },

    /// Diagnose configuration, provider and index health
    Doctor,
}

#[derive(Subcommand)]
enum DocsAction {
    /// List indexed documents
    List,

    /// Remove a document and its chunks from the index
    Remove {
        /// File name as shown by `docs list`
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Ask {
            thread,
            message,
            show_steps,
        } => commands::ask::run(thread, message, show_steps).await?,
        Commands::Ingest => commands::docs::ingest().await?,
        Commands::Docs { action } => match action {
            DocsAction::List => commands::docs::list().await?,
            DocsAction::Remove { file } => commands::docs::remove(&file).await?,
        },
        Commands::History { thread } => commands::history::run(thread).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
