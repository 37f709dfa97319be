//! Document index — chunked, persisted keyword index over the support docs folder.
//!
//! Layout under `persist_dir`:
//! - `index.jsonl` — one JSON-encoded [`Chunk`] per line
//! - `processed_files.json` — names of documents already ingested
//!
//! `sync_folder` only ingests files that are not yet recorded, so re-running
//! ingestion over an unchanged folder is a no-op.

use async_trait::async_trait;
use docpilot_core::error::RetrievalError;
use docpilot_core::retriever::{Passage, Retriever};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.jsonl";
const PROCESSED_FILE: &str = "processed_files.json";
const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// One stored slice of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// File name the chunk came from
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
}

/// Outcome of a folder sync.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    /// Newly ingested documents
    pub added: Vec<String>,
    /// Chunks created for them
    pub chunks: usize,
    /// Documents that were already indexed
    pub skipped: usize,
    /// Documents that could not be read; they are retried on the next sync
    pub failed: Vec<String>,
}

#[derive(Default)]
struct IndexState {
    chunks: Vec<Chunk>,
    processed: BTreeSet<String>,
}

/// A persisted chunk index with keyword ranking.
pub struct DocumentIndex {
    persist_dir: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
    state: Arc<RwLock<IndexState>>,
}

impl DocumentIndex {
    /// Open the index stored in `persist_dir`, starting empty if nothing is there.
    pub async fn open(
        persist_dir: impl Into<PathBuf>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, RetrievalError> {
        let persist_dir = persist_dir.into();
        let chunks = load_chunks(&persist_dir.join(INDEX_FILE)).await?;
        let processed = load_processed(&persist_dir.join(PROCESSED_FILE)).await?;
        debug!(
            dir = %persist_dir.display(),
            chunks = chunks.len(),
            documents = processed.len(),
            "Document index loaded"
        );

        Ok(Self {
            persist_dir,
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            state: Arc::new(RwLock::new(IndexState { chunks, processed })),
        })
    }

    /// Ingest every supported file in `docs_dir` that has not been indexed yet.
    pub async fn sync_folder(&self, docs_dir: &Path) -> Result<SyncReport, RetrievalError> {
        let mut entries = tokio::fs::read_dir(docs_dir).await.map_err(|e| {
            RetrievalError::Storage(format!("Failed to read {}: {e}", docs_dir.display()))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RetrievalError::Storage(e.to_string()))?
        {
            let path = entry.path();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()));
            if path.is_file() && supported {
                files.push(path);
            }
        }
        files.sort();

        let mut report = SyncReport::default();
        let mut state = self.state.write().await;

        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                continue;
            };
            if state.processed.contains(&name) {
                report.skipped += 1;
                continue;
            }

            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) => {
                    let err = RetrievalError::LoadFailed {
                        file: name.clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "Skipping document");
                    report.failed.push(name);
                    continue;
                }
            };

            let pieces = chunk_text(&text, self.chunk_size, self.chunk_overlap);
            info!(file = %name, chunks = pieces.len(), "Indexing document");
            report.chunks += pieces.len();
            state
                .chunks
                .extend(pieces.into_iter().enumerate().map(|(i, content)| Chunk {
                    source: name.clone(),
                    chunk_index: i,
                    content,
                }));
            state.processed.insert(name.clone());
            report.added.push(name);
        }

        if !report.added.is_empty() {
            self.flush(&state).await?;
        }
        Ok(report)
    }

    /// Drop a document and its chunks. Returns `false` if it was not indexed.
    pub async fn remove_file(&self, name: &str) -> Result<bool, RetrievalError> {
        let mut state = self.state.write().await;
        let before = state.chunks.len();
        state.chunks.retain(|c| c.source != name);
        let removed_record = state.processed.remove(name);
        let removed = removed_record || state.chunks.len() < before;
        if removed {
            self.flush(&state).await?;
            info!(file = %name, "Removed document from index");
        }
        Ok(removed)
    }

    /// Names of all indexed documents.
    pub async fn documents(&self) -> Vec<String> {
        self.state.read().await.processed.iter().cloned().collect()
    }

    /// Total number of stored chunks.
    pub async fn chunk_count(&self) -> usize {
        self.state.read().await.chunks.len()
    }

    /// Rank chunks by keyword occurrence, best first.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<Passage> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '+')
                    .to_lowercase()
            })
            .filter(|w| w.chars().count() >= 2)
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let state = self.state.read().await;
        let mut results: Vec<Passage> = state
            .chunks
            .iter()
            .filter_map(|chunk| {
                let lower = chunk.content.to_lowercase();
                let occurrences: usize = terms.iter().map(|t| lower.matches(t.as_str()).count()).sum();
                let distinct = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                if occurrences == 0 {
                    return None;
                }
                // Distinct term coverage dominates raw frequency.
                let density = occurrences as f32 / (chunk.content.len() as f32 / 100.0).max(1.0);
                Some(Passage {
                    source: chunk.source.clone(),
                    chunk_index: chunk.chunk_index,
                    content: chunk.content.clone(),
                    score: distinct as f32 + density.min(1.0),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        results
    }

    /// Rewrite both index files from the in-memory state.
    async fn flush(&self, state: &IndexState) -> Result<(), RetrievalError> {
        tokio::fs::create_dir_all(&self.persist_dir).await.map_err(|e| {
            RetrievalError::Storage(format!("Failed to create index directory: {e}"))
        })?;

        let mut content = String::new();
        for chunk in &state.chunks {
            let line = serde_json::to_string(chunk)
                .map_err(|e| RetrievalError::Storage(format!("Failed to serialize chunk: {e}")))?;
            content.push_str(&line);
            content.push('\n');
        }
        tokio::fs::write(self.persist_dir.join(INDEX_FILE), content)
            .await
            .map_err(|e| RetrievalError::Storage(format!("Failed to write index: {e}")))?;

        let processed: Vec<&String> = state.processed.iter().collect();
        let json = serde_json::to_string_pretty(&processed)
            .map_err(|e| RetrievalError::Storage(e.to_string()))?;
        tokio::fs::write(self.persist_dir.join(PROCESSED_FILE), json)
            .await
            .map_err(|e| RetrievalError::Storage(format!("Failed to write file record: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl Retriever for DocumentIndex {
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<Passage>, RetrievalError> {
        Ok(self.search(query, limit).await)
    }
}

async fn load_chunks(path: &Path) -> Result<Vec<Chunk>, RetrievalError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RetrievalError::Storage(e.to_string())),
    };

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Chunk>(line) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                warn!(error = %e, "Skipping corrupted index line");
                None
            }
        })
        .collect())
}

async fn load_processed(path: &Path) -> Result<BTreeSet<String>, RetrievalError> {
    match tokio::fs::read_to_string(path).await {
        Ok(c) => serde_json::from_str(&c)
            .map_err(|e| RetrievalError::Storage(format!("Corrupted {PROCESSED_FILE}: {e}"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
        Err(e) => Err(RetrievalError::Storage(e.to_string())),
    }
}

/// Split `text` into windows of `size` characters overlapping by `overlap`.
///
/// A window is shortened to the last whitespace in its final quarter so that
/// words are not cut in half where that is possible.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let overlap = overlap.min(size - 1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let floor = start + size * 3 / 4;
            if let Some(ws) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        if !piece.trim().is_empty() {
            chunks.push(piece.trim().to_string());
        }
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_doc(dir: &Path, name: &str, body: &str) {
        tokio::fs::write(dir.join(name), body).await.unwrap();
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello world", 1000, 300), vec!["hello world"]);
        assert!(chunk_text("", 1000, 300).is_empty());
    }

    #[test]
    fn long_text_overlaps() {
        let text = "word ".repeat(600);
        let chunks = chunk_text(&text, 1000, 300);
        assert!(chunks.len() >= 4);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
        assert!(chunks.iter().all(|c| !c.starts_with(' ')));
    }

    #[tokio::test]
    async fn sync_ingests_only_new_files() {
        let docs = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();
        write_doc(docs.path(), "mdot.md", "The mDot AT+PP command sets the port.").await;
        write_doc(docs.path(), "notes.pdf", "ignored").await;

        let index = DocumentIndex::open(persist.path(), 1000, 300).await.unwrap();
        let first = index.sync_folder(docs.path()).await.unwrap();
        assert_eq!(first.added, vec!["mdot.md"]);
        assert_eq!(first.chunks, 1);

        write_doc(docs.path(), "mtcap.txt", "Reset the MTCAP gateway by holding RESET.").await;
        let second = index.sync_folder(docs.path()).await.unwrap();
        assert_eq!(second.added, vec!["mtcap.txt"]);
        assert_eq!(second.skipped, 1);
        assert_eq!(index.documents().await, vec!["mdot.md", "mtcap.txt"]);
    }

    #[tokio::test]
    async fn unreadable_file_is_skipped() {
        let docs = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();
        tokio::fs::write(docs.path().join("a_latin1.txt"), [0x4d, 0x54, 0xe9, 0xff])
            .await
            .unwrap();
        write_doc(docs.path(), "b_mtcap.txt", "Reset the MTCAP gateway by holding RESET.").await;

        let index = DocumentIndex::open(persist.path(), 1000, 300).await.unwrap();
        let report = index.sync_folder(docs.path()).await.unwrap();
        assert_eq!(report.added, vec!["b_mtcap.txt"]);
        assert_eq!(report.failed, vec!["a_latin1.txt"]);
        assert_eq!(index.documents().await, vec!["b_mtcap.txt"]);

        let reopened = DocumentIndex::open(persist.path(), 1000, 300).await.unwrap();
        assert_eq!(reopened.documents().await, vec!["b_mtcap.txt"]);
    }

    #[tokio::test]
    async fn index_survives_reopen() {
        let docs = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();
        write_doc(docs.path(), "xdot.txt", "xDot sleep mode draws very little current.").await;

        {
            let index = DocumentIndex::open(persist.path(), 1000, 300).await.unwrap();
            index.sync_folder(docs.path()).await.unwrap();
        }

        let index = DocumentIndex::open(persist.path(), 1000, 300).await.unwrap();
        assert_eq!(index.chunk_count().await, 1);
        let report = index.sync_folder(docs.path()).await.unwrap();
        assert!(report.added.is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn search_ranks_by_term_coverage() {
        let docs = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();
        write_doc(docs.path(), "a.txt", "The AT+PP command configures the LoRa port.").await;
        write_doc(docs.path(), "b.txt", "Port forwarding on the Conduit gateway.").await;

        let index = DocumentIndex::open(persist.path(), 1000, 300).await.unwrap();
        index.sync_folder(docs.path()).await.unwrap();

        let results = index.retrieve("AT+PP port", 4).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "a.txt");
        assert!(results[0].score > results[1].score);

        assert!(index.search("zigbee", 4).await.is_empty());
        assert!(index.search("", 4).await.is_empty());
    }

    #[tokio::test]
    async fn remove_file_drops_chunks() {
        let docs = TempDir::new().unwrap();
        let persist = TempDir::new().unwrap();
        write_doc(docs.path(), "old.txt", "Legacy firmware notes.").await;

        let index = DocumentIndex::open(persist.path(), 1000, 300).await.unwrap();
        index.sync_folder(docs.path()).await.unwrap();

        assert!(index.remove_file("old.txt").await.unwrap());
        assert!(!index.remove_file("old.txt").await.unwrap());
        assert_eq!(index.chunk_count().await, 0);
        assert!(index.documents().await.is_empty());
    }

    #[tokio::test]
    async fn missing_docs_dir_is_an_error() {
        let persist = TempDir::new().unwrap();
        let index = DocumentIndex::open(persist.path(), 1000, 300).await.unwrap();
        let err = index
            .sync_folder(Path::new("/nonexistent/docs"))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Storage(_)));
    }
}
