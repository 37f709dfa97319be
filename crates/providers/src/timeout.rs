//! Provider timeout wrapper.
//!
//! Bounds every model call with an externally imposed deadline. A call that
//! exceeds it fails with [`ProviderError::Timeout`] instead of hanging the turn.

use async_trait::async_trait;
use docpilot_core::error::ProviderError;
use docpilot_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A provider that wraps another and cancels calls running past `timeout`.
pub struct TimeoutProvider {
    inner: Arc<dyn Provider>,
    timeout: Duration,
}

impl TimeoutProvider {
    /// Wrap with a timeout given in seconds.
    pub fn secs(inner: Arc<dyn Provider>, secs: u64) -> Self {
        Self {
            inner,
            timeout: Duration::from_secs(secs),
        }
    }
}

#[async_trait]
impl Provider for TimeoutProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        match tokio::time::timeout(self.timeout, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    provider = %self.inner.name(),
                    model = %model,
                    timeout_secs = self.timeout.as_secs(),
                    "Model call timed out"
                );
                Err(ProviderError::Timeout(format!(
                    "Provider '{}' timed out after {}s",
                    self.inner.name(),
                    self.timeout.as_secs()
                )))
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        match tokio::time::timeout(self.timeout, self.inner.health_check()).await {
            Ok(result) => result,
            Err(_) => Ok(false),
        }
    }
}
