//! Stock analysis collaborator
//!
//! The analysis algorithms (market data retrieval, technical and fundamental
//! scoring, recommendation generation) run outside this workspace. This crate
//! holds the seam to them:
//!
//! - [`StockAnalysis`] and friends: the result model returned for one ticker
//! - [`AnalysisService`]: the async trait the A2A layer calls into
//! - [`HttpAnalysisService`]: a delegate that forwards to an analysis service over HTTP
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_stock::{AnalysisService, HttpAnalysisService, StockConfig};
//!
//! let config = StockConfig::from_env()?;
//! let service = HttpAnalysisService::new(&config)?;
//! let analysis = service.perform_complete_analysis("AAPL", "analyze AAPL").await?;
//! println!("{}", analysis.company_name);
//! ```

pub mod analysis;
pub mod client;
pub mod config;
pub mod error;
pub mod service;

pub use analysis::{InvestmentRecommendation, MarketData, Recommendation, StockAnalysis};
pub use client::HttpAnalysisService;
pub use config::StockConfig;
pub use error::{Result, StockError};
pub use service::{AnalysisService, HealthStatus, ServiceHealth};
