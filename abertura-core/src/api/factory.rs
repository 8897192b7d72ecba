use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::repository::{ApiError, LeadRepository};

/// Backend-agnostic lead API configuration.
///
/// `backend` must match the [`LeadRepositoryFactory::backend_name`] of a
/// registered factory. `endpoint` is passed through to that factory
/// unchanged.
///
/// | backend  | endpoint examples                        |
/// |----------|------------------------------------------|
/// | `memory` | ignored                                  |
/// | `http`   | `https://api.attualize.com.br/v1`        |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Lowercase identifier matching a registered factory (e.g. `"http"`).
    pub backend: String,
    pub endpoint: String,
    /// Per-request timeout for network backends.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            endpoint: String::new(),
            timeout_secs: 10,
        }
    }
}

/// One implementation per lead backend. Each backend crate exports a unit
/// struct implementing this trait, registered with a [`BackendRegistry`] at
/// startup.
#[async_trait]
pub trait LeadRepositoryFactory: Send + Sync {
    /// Unique, lowercase identifier for this backend.
    fn backend_name(&self) -> &'static str;

    async fn create(&self, config: &BackendConfig)
    -> Result<Arc<dyn LeadRepository>, ApiError>;
}

/// Registry of [`LeadRepositoryFactory`] instances, keyed by backend name.
pub struct BackendRegistry {
    factories: HashMap<&'static str, Box<dyn LeadRepositoryFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in `memory` backend.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(super::memory::MemoryBackendFactory));
        registry
    }

    /// Register a backend factory, replacing any with the same name.
    pub fn register(
        &mut self,
        factory: Box<dyn LeadRepositoryFactory>,
    ) {
        self.factories.insert(factory.backend_name(), factory);
    }

    /// Names of every registered backend, sorted alphabetically.
    pub fn available_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Dispatch to the factory matching `config.backend`.
    ///
    /// # Errors
    /// * [`ApiError::Configuration`] when no factory is registered for the
    ///   requested backend name.
    /// * Any error the chosen factory itself returns.
    pub async fn create(
        &self,
        config: &BackendConfig,
    ) -> Result<Arc<dyn LeadRepository>, ApiError> {
        let factory = self
            .factories
            .get(config.backend.as_str())
            .ok_or_else(|| {
                ApiError::Configuration(format!(
                    "unknown backend '{}'; available: {:?}",
                    config.backend,
                    self.available_backends()
                ))
            })?;

        factory.create(config).await
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
