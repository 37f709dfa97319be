//! Retriever trait — ranked passage lookup over the private document corpus.
//!
//! Index construction, chunking and ranking belong to the implementation;
//! the workflow only needs passages with their provenance.

use crate::error::RetrievalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One ranked passage returned by a retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Source document name (used for citations)
    pub source: String,

    /// Position of the chunk inside its document
    pub chunk_index: usize,

    /// Passage text
    pub content: String,

    /// Ranking score, higher is better
    pub score: f32,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `limit` passages for `query`, best first.
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<Passage>, RetrievalError>;
}
