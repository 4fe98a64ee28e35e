//! Analysis service trait

use crate::analysis::StockAnalysis;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a service as reported by its own probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    #[default]
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        };
        f.write_str(label)
    }
}

/// Health probe result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub overall_status: HealthStatus,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ServiceHealth {
    pub fn healthy() -> Self {
        Self {
            overall_status: HealthStatus::Healthy,
            details: serde_json::Value::Null,
        }
    }

    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            overall_status: HealthStatus::Unhealthy,
            details: serde_json::json!({ "error": reason.into() }),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == HealthStatus::Healthy
    }
}

/// The stock analysis collaborator
///
/// One call performs the whole pipeline for a ticker: data retrieval,
/// scoring and recommendation.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Analyse `ticker`; `query_text` is the user's original wording
    async fn perform_complete_analysis(&self, ticker: &str, query_text: &str)
    -> Result<StockAnalysis>;

    /// Probe the service's own health
    async fn service_health(&self) -> ServiceHealth;
}
