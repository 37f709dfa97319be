//! File-based checkpoint store — one pretty-printed JSON file per thread.
//!
//! Storage location: `<dir>/<encoded thread_id>.json`. ASCII letters, digits
//! and `-` are kept; every other byte is written as `_xx` hex, so distinct
//! thread IDs never share a file. Each `put` rewrites the file
//! through a temporary sibling and a rename, so a crash mid-write leaves the
//! previous snapshot intact.

use async_trait::async_trait;
use docpilot_core::checkpoint::CheckpointStore;
use docpilot_core::error::CheckpointError;
use docpilot_core::message::{ConversationState, ThreadId};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A directory of JSON checkpoint files.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map a thread ID to a file name that is safe on every platform.
    fn path_for(&self, thread_id: &ThreadId) -> PathBuf {
        let mut name = String::with_capacity(thread_id.as_str().len() + 5);
        for byte in thread_id.as_str().bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("_{byte:02x}"));
            }
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, CheckpointError> {
        let path = self.path_for(thread_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CheckpointError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let state: ConversationState =
            serde_json::from_str(&content).map_err(|e| CheckpointError::Corrupted {
                thread_id: thread_id.to_string(),
                reason: e.to_string(),
            })?;
        if state.thread_id != *thread_id {
            return Err(CheckpointError::Corrupted {
                thread_id: thread_id.to_string(),
                reason: format!("file holds thread '{}'", state.thread_id),
            });
        }
        Ok(Some(state))
    }

    async fn put(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CheckpointError::Storage(format!("Failed to create checkpoint directory: {e}"))
        })?;

        let json = serde_json::to_string_pretty(state).map_err(|e| {
            CheckpointError::Storage(format!("Failed to serialize checkpoint: {e}"))
        })?;

        let path = self.path_for(thread_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to write checkpoint: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to replace checkpoint: {e}")))?;

        debug!(thread_id = %thread_id, messages = state.len(), "Checkpoint written");
        Ok(())
    }

    async fn threads(&self) -> Result<Vec<ThreadId>, CheckpointError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CheckpointError::Storage(e.to_string())),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // The stored state carries the real ID; file names are encoded.
            if let Ok(content) = tokio::fs::read_to_string(&path).await
                && let Ok(state) = serde_json::from_str::<ConversationState>(&content)
            {
                ids.push(state.thread_id);
            }
        }
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ids)
    }
}
