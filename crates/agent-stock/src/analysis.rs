//! Analysis result types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Investment action suggested by the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    #[serde(alias = "buy", alias = "Buy")]
    Buy,
    #[serde(alias = "hold", alias = "Hold")]
    Hold,
    #[serde(alias = "sell", alias = "Sell")]
    Sell,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::Sell => "SELL",
        };
        f.write_str(label)
    }
}

/// Price snapshot for the analysed ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub current_price: f64,
    pub previous_close: f64,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

impl MarketData {
    pub fn new(current_price: f64, previous_close: f64) -> Self {
        Self {
            current_price,
            previous_close,
            volume: None,
            market_cap: None,
        }
    }

    /// Percentage change against the previous close (0 when unknown)
    pub fn price_change_percentage(&self) -> f64 {
        if self.previous_close == 0.0 {
            return 0.0;
        }
        (self.current_price - self.previous_close) / self.previous_close * 100.0
    }
}

/// Recommendation with its supporting rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentRecommendation {
    pub recommendation: Recommendation,
    /// Confidence on a 0-100 scale
    pub confidence_score: f64,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub risk_assessment: String,
    #[serde(default)]
    pub reasoning: String,
}

impl InvestmentRecommendation {
    pub fn new(recommendation: Recommendation, confidence_score: f64) -> Self {
        Self {
            recommendation,
            confidence_score: confidence_score.clamp(0.0, 100.0),
            key_factors: Vec::new(),
            risk_assessment: String::new(),
            reasoning: String::new(),
        }
    }

    pub fn with_factor(mut self, factor: impl Into<String>) -> Self {
        self.key_factors.push(factor.into());
        self
    }

    pub fn with_risk(mut self, risk: impl Into<String>) -> Self {
        self.risk_assessment = risk.into();
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}

/// Complete analysis of one ticker
///
/// `recommendation` is absent when the analysis could not reach a verdict;
/// callers treat that as a soft failure and surface `summary` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAnalysis {
    pub ticker: String,
    pub company_name: String,
    #[serde(default)]
    pub market_data: Option<MarketData>,
    #[serde(default)]
    pub recommendation: Option<InvestmentRecommendation>,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl StockAnalysis {
    pub fn new(ticker: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            company_name: company_name.into(),
            market_data: None,
            recommendation: None,
            summary: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_market_data(mut self, market_data: MarketData) -> Self {
        self.market_data = Some(market_data);
        self
    }

    pub fn with_recommendation(mut self, recommendation: InvestmentRecommendation) -> Self {
        self.recommendation = Some(recommendation);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}
