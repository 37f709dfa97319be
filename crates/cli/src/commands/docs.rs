//! `docpilot ingest` / `docpilot docs` — Document index management.

use super::{CliResult, load_config, open_index};

pub async fn ingest() -> CliResult {
    let config = load_config()?;
    let docs_dir = &config.knowledge.docs_dir;
    if !docs_dir.is_dir() {
        return Err(format!(
            "Docs folder {} does not exist — run `docpilot onboard` or set knowledge.docs_dir",
            docs_dir.display()
        )
        .into());
    }

    let index = open_index(&config).await?;
    let report = index
        .sync_folder(docs_dir)
        .await
        .map_err(|e| format!("Ingestion failed: {e}"))?;

    println!("📥 Synced {}", docs_dir.display());
    for name in &report.added {
        println!("  + {name}");
    }
    for name in &report.failed {
        println!("  ! {name} (unreadable, skipped)");
    }
    println!(
        "  {} new document(s), {} chunk(s), {} already indexed",
        report.added.len(),
        report.chunks,
        report.skipped
    );
    Ok(())
}

pub async fn list() -> CliResult {
    let config = load_config()?;
    let index = open_index(&config).await?;
    let documents = index.documents().await;

    if documents.is_empty() {
        println!("  No documents indexed. Add files to {} and run `docpilot ingest`.",
            config.knowledge.docs_dir.display());
        return Ok(());
    }

    println!("📚 Indexed documents ({} chunks)", index.chunk_count().await);
    for name in documents {
        println!("  - {name}");
    }
    Ok(())
}

pub async fn remove(file: &str) -> CliResult {
    let config = load_config()?;
    let index = open_index(&config).await?;

    if index
        .remove_file(file)
        .await
        .map_err(|e| format!("Failed to update index: {e}"))?
    {
        println!("🗑️  Removed {file} from the index.");
    } else {
        println!("  {file} is not in the index.");
    }
    Ok(())
}
