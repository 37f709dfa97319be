//! Checkpoint store trait — per-thread persistence of conversation state.
//!
//! A checkpoint is the full `ConversationState` of one thread. Every write
//! replaces the previous snapshot; nothing is merged and nothing expires.

use crate::error::CheckpointError;
use crate::message::{ConversationState, ThreadId};
use async_trait::async_trait;

/// Storage for thread checkpoints.
///
/// Implementations: in-memory (tests, ephemeral sessions), JSON files, SQLite.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "file", "memory").
    fn name(&self) -> &str;

    /// Load the latest snapshot of a thread, if any.
    async fn get(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, CheckpointError>;

    /// Replace the snapshot of a thread with `state`.
    async fn put(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<(), CheckpointError>;

    /// All thread IDs with a stored snapshot.
    async fn threads(&self) -> Result<Vec<ThreadId>, CheckpointError>;
}
