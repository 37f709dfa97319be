//! Web search tool — Tavily-compatible search API.
//!
//! Sends `POST {api_url}/search` and renders the top results. Results can be
//! restricted to the product vendor's domains through `include_domains`.

use async_trait::async_trait;
use docpilot_core::error::ToolError;
use docpilot_core::tool::{Tool, ToolOutput};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const WEB_SEARCH_NAME: &str = "web_search";

pub struct WebSearchTool {
    api_url: String,
    api_key: Option<String>,
    max_results: usize,
    include_domains: Vec<String>,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("docpilot/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key,
            max_results: 2,
            include_domains: Vec::new(),
            client,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    pub fn with_include_domains(mut self, domains: Vec<String>) -> Self {
        self.include_domains = domains;
        self
    }

    fn failure(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: WEB_SEARCH_NAME.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_NAME
    }

    fn description(&self) -> &str {
        "Search the internet for product information that is not in the internal \
         documents. Returns titles, URLs and content snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query, including the product name"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Self::failure("search API key is not configured"))?;

        let body = SearchRequest {
            api_key,
            query,
            max_results: self.max_results,
            include_domains: &self.include_domains,
        };

        debug!(query, max_results = self.max_results, "Web search");

        let response = self
            .client
            .post(format!("{}/search", self.api_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::failure(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "Web search returned error");
            return Err(Self::failure(format!("search API returned {status}")));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("unreadable response: {e}")))?;

        Ok(ToolOutput {
            text: render_results(query, &payload.results),
            data: serde_json::to_value(&payload.results).ok(),
        })
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    #[serde(skip_serializing_if = "no_domains")]
    include_domains: &'a [String],
}

fn no_domains(domains: &&[String]) -> bool {
    domains.is_empty()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

fn render_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No web results found for: {query}");
    }
    results
        .iter()
        .map(|r| format!("Source: {} ({})\n{}", r.title, r.url, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
