//! HTTP delegate for the analysis service
//!
//! Forwards each analysis to a remote service: `POST {base}/analyze` with
//! `{ticker, query}` returns a [`StockAnalysis`], `GET {base}/health` returns
//! a [`ServiceHealth`].

use crate::analysis::StockAnalysis;
use crate::config::StockConfig;
use crate::error::{Result, StockError};
use crate::service::{AnalysisService, ServiceHealth};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Analysis service reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpAnalysisService {
    base_url: String,
    timeout_secs: u64,
    http_client: reqwest::Client,
}

impl HttpAnalysisService {
    /// Create a client for the configured service
    pub fn new(config: &StockConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StockError::ConfigError(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.analysis_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout.as_secs(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(&self, err: reqwest::Error) -> StockError {
        if err.is_timeout() {
            StockError::Timeout(self.timeout_secs)
        } else {
            StockError::NetworkError(err)
        }
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn perform_complete_analysis(
        &self,
        ticker: &str,
        query_text: &str,
    ) -> Result<StockAnalysis> {
        let url = format!("{}/analyze", self.base_url);
        debug!(%ticker, %url, "requesting analysis");

        let response = self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "ticker": ticker, "query": query_text }))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StockError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: response.text().await.unwrap_or_default(),
            });
        }
        if !status.is_success() {
            return Err(StockError::ApiError(format!(
                "HTTP {} for {}: {}",
                status,
                ticker,
                response.text().await.unwrap_or_default()
            )));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let analysis: StockAnalysis = serde_json::from_str(&body)?;
        Ok(analysis)
    }

    async fn service_health(&self) -> ServiceHealth {
        let url = format!("{}/health", self.base_url);

        let response = match self.http_client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "analysis service health probe failed");
                return ServiceHealth::unhealthy(e.to_string());
            }
        };

        if !response.status().is_success() {
            return ServiceHealth::unhealthy(format!("HTTP {}", response.status()));
        }

        match response.json::<ServiceHealth>().await {
            Ok(health) => health,
            Err(e) => ServiceHealth::unhealthy(format!("malformed health document: {e}")),
        }
    }
}
