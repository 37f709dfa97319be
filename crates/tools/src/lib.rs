//! Tool adapters for docpilot.
//!
//! Each external capability the reasoning agent can call is wrapped behind
//! the `docpilot_core::Tool` contract:
//! - `technical_docs_retriever` over the private document index
//! - `web_search` over a Tavily-compatible search API
//! - `support_case_lookup` over historical support cases (optional)

pub mod case_lookup;
pub mod docs_retriever;
pub mod web_search;

use docpilot_config::AppConfig;
use docpilot_core::retriever::Retriever;
use docpilot_core::tool::ToolRegistry;
use std::sync::Arc;

pub use case_lookup::{CaseLookupTool, CaseSource, HttpCaseSource, SupportCase};
pub use docs_retriever::DocsRetrieverTool;
pub use web_search::WebSearchTool;

/// Build the tool registry described by the configuration.
///
/// Registration order (and so the order the model sees) is: document
/// retriever, web search, case lookup.
pub fn build_registry(config: &AppConfig, retriever: Arc<dyn Retriever>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(DocsRetrieverTool::new(
        retriever,
        config.knowledge.top_k,
    )));

    if config.web_search.enabled {
        registry.register(Arc::new(
            WebSearchTool::new(&config.web_search.api_url, config.web_search.api_key.clone())
                .with_max_results(config.web_search.max_results)
                .with_include_domains(config.web_search.include_domains.clone()),
        ));
    }

    if config.case_lookup.enabled {
        match &config.case_lookup.api_url {
            Some(url) => registry.register(Arc::new(CaseLookupTool::new(Arc::new(
                HttpCaseSource::new(url),
            )))),
            None => tracing::warn!("case_lookup is enabled but has no api_url; not registering"),
        }
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docpilot_core::error::RetrievalError;
    use docpilot_core::retriever::Passage;

    struct NoDocs;

    #[async_trait]
    impl Retriever for NoDocs {
        async fn retrieve(&self, _q: &str, _k: usize) -> Result<Vec<Passage>, RetrievalError> {
            Ok(vec![])
        }
    }

    #[test]
    fn default_registry_has_retriever_then_search() {
        let registry = build_registry(&AppConfig::default(), Arc::new(NoDocs));
        assert_eq!(registry.names(), vec!["technical_docs_retriever", "web_search"]);
    }

    #[test]
    fn case_lookup_registered_when_enabled() {
        let mut config = AppConfig::default();
        config.web_search.enabled = false;
        config.case_lookup.enabled = true;
        config.case_lookup.api_url = Some("http://localhost:9000".into());
        let registry = build_registry(&config, Arc::new(NoDocs));
        assert_eq!(
            registry.names(),
            vec!["technical_docs_retriever", "support_case_lookup"]
        );
    }

    #[test]
    fn case_lookup_without_url_is_skipped() {
        let mut config = AppConfig::default();
        config.case_lookup.enabled = true;
        let registry = build_registry(&config, Arc::new(NoDocs));
        assert!(registry.get("support_case_lookup").is_none());
    }
}
