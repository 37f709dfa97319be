//! In-memory checkpoint store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use docpilot_core::checkpoint::CheckpointStore;
use docpilot_core::error::CheckpointError;
use docpilot_core::message::{ConversationState, ThreadId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A checkpoint store that keeps snapshots in a map.
/// Nothing survives the process.
pub struct InMemoryCheckpointStore {
    threads: Arc<RwLock<HashMap<ThreadId, ConversationState>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            threads: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, CheckpointError> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn put(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<(), CheckpointError> {
        self.threads
            .write()
            .await
            .insert(thread_id.clone(), state.clone());
        Ok(())
    }

    async fn threads(&self) -> Result<Vec<ThreadId>, CheckpointError> {
        let mut ids: Vec<ThreadId> = self.threads.read().await.keys().cloned().collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docpilot_core::message::Message;

    #[tokio::test]
    async fn unknown_thread_is_none() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.get(&ThreadId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_snapshot() {
        let store = InMemoryCheckpointStore::new();
        let id = ThreadId::from("t1");

        let mut state = ConversationState::new(id.clone());
        state.push(Message::user("first"));
        store.put(&id, &state).await.unwrap();

        state.push(Message::assistant("answer"));
        store.put(&id, &state).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(store.threads().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let store = InMemoryCheckpointStore::new();
        let a = ThreadId::from("a");
        let b = ThreadId::from("b");

        let mut sa = ConversationState::new(a.clone());
        sa.push(Message::user("question a"));
        store.put(&a, &sa).await.unwrap();

        let sb = ConversationState::new(b.clone());
        store.put(&b, &sb).await.unwrap();

        assert_eq!(store.get(&a).await.unwrap().unwrap().len(), 1);
        assert!(store.get(&b).await.unwrap().unwrap().is_empty());
        assert_eq!(store.threads().await.unwrap().len(), 2);
    }
}
