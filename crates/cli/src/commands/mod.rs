pub mod ask;
pub mod docs;
pub mod doctor;
pub mod history;
pub mod onboard;

use docpilot_config::AppConfig;
use docpilot_core::checkpoint::CheckpointStore;
use docpilot_memory::{
    DocumentIndex, FileCheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore,
};
use std::sync::Arc;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the checkpoint store selected by `[checkpoint].backend`.
pub async fn open_store(
    config: &AppConfig,
) -> Result<Arc<dyn CheckpointStore>, Box<dyn std::error::Error>> {
    let path = &config.checkpoint.path;
    let store: Arc<dyn CheckpointStore> = match config.checkpoint.backend.as_str() {
        "memory" => Arc::new(InMemoryCheckpointStore::new()),
        "file" => Arc::new(FileCheckpointStore::new(path.clone())),
        _ => Arc::new(
            SqliteCheckpointStore::open(path)
                .await
                .map_err(|e| format!("Failed to open checkpoint database: {e}"))?,
        ),
    };
    Ok(store)
}

/// Open the document index under `[knowledge].persist_dir`.
pub async fn open_index(config: &AppConfig) -> Result<DocumentIndex, Box<dyn std::error::Error>> {
    let knowledge = &config.knowledge;
    Ok(DocumentIndex::open(
        knowledge.persist_dir.clone(),
        knowledge.chunk_size,
        knowledge.chunk_overlap,
    )
    .await
    .map_err(|e| format!("Failed to open document index: {e}"))?)
}
