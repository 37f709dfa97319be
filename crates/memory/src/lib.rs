//! Persistence for docpilot: checkpoint stores and the document index.
//!
//! Checkpoint stores implement `docpilot_core::CheckpointStore`; the
//! document index implements `docpilot_core::Retriever`.

pub mod document_index;
pub mod file_backend;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use document_index::{Chunk, DocumentIndex, SyncReport, chunk_text};
pub use file_backend::FileCheckpointStore;
pub use in_memory::InMemoryCheckpointStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCheckpointStore;
