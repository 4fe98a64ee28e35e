//! Configuration for the analysis collaborator

use crate::error::{Result, StockError};
use agent_utils::EnvLookup;
use agent_utils::env::ProcessEnv;
use std::time::Duration;

/// Configuration for reaching the stock analysis service
#[derive(Debug, Clone)]
pub struct StockConfig {
    /// Base URL of the analysis service
    pub analysis_url: String,

    /// Request timeout for one complete analysis
    pub request_timeout: Duration,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            analysis_url: "http://127.0.0.1:8100".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl StockConfig {
    /// Create a new configuration builder
    pub fn builder() -> StockConfigBuilder {
        StockConfigBuilder::default()
    }

    /// Load from `ANALYSIS_SERVICE_URL` and `ANALYSIS_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Load from any environment source
    pub fn from_lookup(env: &impl EnvLookup) -> Result<Self> {
        let defaults = Self::default();
        let timeout_secs = env
            .parse("ANALYSIS_TIMEOUT_SECS", defaults.request_timeout.as_secs())
            .map_err(|e| StockError::ConfigError(e.to_string()))?;

        Self::builder()
            .analysis_url(env.string("ANALYSIS_SERVICE_URL", &defaults.analysis_url))
            .request_timeout(Duration::from_secs(timeout_secs))
            .build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.analysis_url).map_err(|e| {
            StockError::ConfigError(format!(
                "invalid analysis service URL '{}': {e}",
                self.analysis_url
            ))
        })?;

        if self.request_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for StockConfig
#[derive(Debug, Default)]
pub struct StockConfigBuilder {
    analysis_url: Option<String>,
    request_timeout: Option<Duration>,
}

impl StockConfigBuilder {
    /// Set the analysis service base URL
    pub fn analysis_url(mut self, url: impl Into<String>) -> Self {
        self.analysis_url = Some(url.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<StockConfig> {
        let defaults = StockConfig::default();

        let config = StockConfig {
            analysis_url: self
                .analysis_url
                .map_or(defaults.analysis_url, |u| u.trim_end_matches('/').to_string()),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}
