//! Support case lookup tool — searches historical support cases.
//!
//! The tool only formats results; fetching cases is delegated to a
//! [`CaseSource`]. Registered only when `[case_lookup].enabled` is set.

use async_trait::async_trait;
use docpilot_core::error::ToolError;
use docpilot_core::tool::{Tool, ToolOutput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const CASE_LOOKUP_NAME: &str = "support_case_lookup";

/// A resolved support case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportCase {
    pub case_id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Where support cases come from.
#[async_trait]
pub trait CaseSource: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Vec<SupportCase>, String>;
}

/// Case source backed by a JSON endpoint: `GET {api_url}/cases?q=<query>`.
pub struct HttpCaseSource {
    api_url: String,
    client: reqwest::Client,
}

impl HttpCaseSource {
    pub fn new(api_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl CaseSource for HttpCaseSource {
    async fn lookup(&self, query: &str) -> Result<Vec<SupportCase>, String> {
        let response = self
            .client
            .get(format!("{}/cases", self.api_url))
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("case service returned {}", response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| format!("unreadable response: {e}"))
    }
}

pub struct CaseLookupTool {
    source: Arc<dyn CaseSource>,
}

impl CaseLookupTool {
    pub fn new(source: Arc<dyn CaseSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for CaseLookupTool {
    fn name(&self) -> &str {
        CASE_LOOKUP_NAME
    }

    fn description(&self) -> &str {
        "Look up previously resolved support cases by case number or keywords."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Case number or keywords describing the issue"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let cases = self
            .source
            .lookup(query)
            .await
            .map_err(|reason| ToolError::ExecutionFailed {
                tool_name: CASE_LOOKUP_NAME.into(),
                reason,
            })?;

        if cases.is_empty() {
            return Ok(ToolOutput::text(format!("No support cases found for: {query}")));
        }

        let text = cases
            .iter()
            .map(|c| {
                let mut entry = format!("Case {}: {}\n{}", c.case_id, c.title, c.summary);
                if let Some(url) = &c.url {
                    entry.push_str(&format!("\n{url}"));
                }
                entry
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(ToolOutput {
            text,
            data: serde_json::to_value(&cases).ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticCases(Vec<SupportCase>);

    #[async_trait]
    impl CaseSource for StaticCases {
        async fn lookup(&self, _query: &str) -> Result<Vec<SupportCase>, String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn formats_cases() {
        let tool = CaseLookupTool::new(Arc::new(StaticCases(vec![SupportCase {
            case_id: "00123".into(),
            title: "MTCDT fails to join".into(),
            summary: "Wrong frequency plan".into(),
            url: Some("https://support.example.com/00123".into()),
        }])));
        let out = tool
            .execute(serde_json::json!({"query": "00123"}))
            .await
            .unwrap();
        assert!(out.text.starts_with("Case 00123: MTCDT fails to join"));
        assert!(out.text.ends_with("https://support.example.com/00123"));
    }

    #[tokio::test]
    async fn no_cases() {
        let tool = CaseLookupTool::new(Arc::new(StaticCases(vec![])));
        let out = tool.execute(serde_json::json!({"query": "x"})).await.unwrap();
        assert!(out.text.contains("No support cases"));
    }

    #[tokio::test]
    async fn unreachable_service_is_execution_failure() {
        let tool = CaseLookupTool::new(Arc::new(HttpCaseSource::new("http://127.0.0.1:9")));
        let err = tool
            .execute(serde_json::json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
