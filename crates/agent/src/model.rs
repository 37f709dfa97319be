//! Per-node model binding.
//!
//! Each workflow node talks to the language model through a [`NodeModel`]:
//! the shared provider plus the model name and sampling settings that node
//! uses. Providers are built once at startup and shared between nodes.

use docpilot_core::error::ProviderError;
use docpilot_core::message::Message;
use docpilot_core::provider::{
    Provider, ProviderRequest, ProviderResponse, ResponseFormat, ToolDefinition,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct NodeModel {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per response
    max_tokens: Option<u32>,
}

impl NodeModel {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `messages`, optionally bound to tools or a structured output schema.
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        response_format: Option<ResponseFormat>,
    ) -> Result<ProviderResponse, ProviderError> {
        let mut request = ProviderRequest::new(&self.model, messages, self.temperature);
        request.max_tokens = self.max_tokens;
        request.tools = tools;
        request.response_format = response_format;

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            messages = request.messages.len(),
            "Calling model"
        );
        self.provider.complete(request).await
    }

    /// Send a single user prompt with no tools.
    pub async fn prompt(&self, text: impl Into<String>) -> Result<ProviderResponse, ProviderError> {
        self.complete(vec![Message::user(text)], Vec::new(), None)
            .await
    }
}

impl std::fmt::Debug for NodeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeModel")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
