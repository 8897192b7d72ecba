use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::BackendConfig;
use crate::calculations::{PricingTable, PricingTableError};
use crate::models::Address;
use crate::session::SessionPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid pricing table: {0}")]
    Pricing(#[from] PricingTableError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { debounce_ms: 2000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_days: SessionPolicy::DEFAULT_TTL_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostalCodeConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for PostalCodeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://viacep.com.br".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Everything the wizard can be tuned with. Every field has a default, so an
/// empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    pub pricing: PricingTable,
    pub fiscal_address: Address,
    pub autosave: AutosaveConfig,
    pub session: SessionConfig,
    pub backend: BackendConfig,
    pub postal_code: PostalCodeConfig,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            pricing: PricingTable::default(),
            fiscal_address: Address::provider_fiscal_address(),
            autosave: AutosaveConfig::default(),
            session: SessionConfig::default(),
            backend: BackendConfig::default(),
            postal_code: PostalCodeConfig::default(),
        }
    }
}

/// Longest session lifetime accepted, ten years.
pub const MAX_TTL_DAYS: i64 = 3650;

/// Longest autosave delay accepted, one minute.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

impl WizardConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pricing.validate()?;

        if !(1..=MAX_TTL_DAYS).contains(&self.session.ttl_days) {
            return Err(ConfigError::Invalid(format!(
                "session.ttl_days must be between 1 and {MAX_TTL_DAYS}, got {}",
                self.session.ttl_days
            )));
        }
        if self.autosave.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Invalid(format!(
                "autosave.debounce_ms must be at most {MAX_DEBOUNCE_MS}, got {}",
                self.autosave.debounce_ms
            )));
        }
        if self.backend.backend.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.backend is empty".to_string()));
        }
        if self.backend.backend == "http" && self.backend.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "backend.endpoint is required for the http backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Points the lead API at `url`, switching to the `http` backend.
    pub fn with_api_url(
        mut self,
        url: impl Into<String>,
    ) -> Self {
        self.backend.backend = "http".to_string();
        self.backend.endpoint = url.into();
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.autosave.debounce_ms)
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy::from_days(self.session.ttl_days)
    }
}
