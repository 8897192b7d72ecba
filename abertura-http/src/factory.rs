use std::sync::Arc;
use std::time::Duration;

use abertura_core::api::{BackendConfig, BackendRegistry, LeadRepositoryFactory};
use abertura_core::{ApiError, LeadRepository};
use async_trait::async_trait;

use crate::leads::HttpLeadRepository;

/// Factory for the `http` backend. `endpoint` is the lead API base URL.
pub struct HttpBackendFactory;

#[async_trait]
impl LeadRepositoryFactory for HttpBackendFactory {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    async fn create(
        &self,
        config: &BackendConfig,
    ) -> Result<Arc<dyn LeadRepository>, ApiError> {
        let endpoint = config.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ApiError::Configuration(format!(
                "http backend needs an http(s) endpoint, got '{endpoint}'"
            )));
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Arc::new(HttpLeadRepository::new(endpoint, timeout)?))
    }
}

/// Adds the `http` backend to `registry`.
pub fn register(registry: &mut BackendRegistry) {
    registry.register(Box::new(HttpBackendFactory));
}
