//! Downstream service configuration (state service, identity service)

use serde::Deserialize;

use super::error::ValidationError;

/// Configuration for the remote state service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateServiceConfig {
    /// Base URL, scheme included
    pub base_url: String,

    /// API key sent on every request
    pub api_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

impl StateServiceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_service("STATE_SERVICE", &self.base_url, &self.api_key)
    }
}

/// Configuration for the identity service mirror.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityServiceConfig {
    /// Base URL, scheme included
    pub base_url: String,

    /// API key sent on every request
    pub api_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

impl IdentityServiceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_service("IDENTITY_SERVICE", &self.base_url, &self.api_key)
    }
}

fn validate_service(
    name: &'static str,
    base_url: &str,
    api_key: &str,
) -> Result<(), ValidationError> {
    if base_url.is_empty() || api_key.is_empty() {
        return Err(ValidationError::MissingRequired(name));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ValidationError::InvalidServiceUrl(name));
    }
    Ok(())
}

fn default_service_timeout() -> u64 {
    10
}
