//! Technical docs retriever tool — searches the private support documents.
//!
//! Wraps any `Retriever` (normally the `DocumentIndex`) and renders the
//! passages with their source document so the answer can cite it.

use async_trait::async_trait;
use docpilot_core::error::ToolError;
use docpilot_core::retriever::{Passage, Retriever};
use docpilot_core::tool::{Tool, ToolOutput};
use std::sync::Arc;
use tracing::debug;

pub const DOCS_RETRIEVER_NAME: &str = "technical_docs_retriever";

pub struct DocsRetrieverTool {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl DocsRetrieverTool {
    pub fn new(retriever: Arc<dyn Retriever>, top_k: usize) -> Self {
        Self {
            retriever,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl Tool for DocsRetrieverTool {
    fn name(&self) -> &str {
        DOCS_RETRIEVER_NAME
    }

    fn description(&self) -> &str {
        "Search and return information from the internal technical documents: \
         product manuals, datasheets, AT command references and support notes. \
         Use this first for any product question."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords or question to look up in the documents"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let passages = self
            .retriever
            .retrieve(query, self.top_k)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: DOCS_RETRIEVER_NAME.into(),
                reason: e.to_string(),
            })?;

        debug!(query, passages = passages.len(), "Document retrieval");

        if passages.is_empty() {
            return Ok(ToolOutput::text("No matching passages in the internal documents."));
        }

        Ok(ToolOutput {
            text: render_passages(&passages),
            data: serde_json::to_value(&passages).ok(),
        })
    }
}

fn render_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| format!("Source: {}\n{}", p.source, p.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
