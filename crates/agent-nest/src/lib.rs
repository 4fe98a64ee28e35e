//! A2A integration layer for the stock agent
//!
//! This crate lets the stock agent join a NANDA-style peer network:
//!
//! - [`query`]: ticker and intent extraction from free text
//! - [`codec`]: A2A wire messages in and out
//! - [`registry`]: discovery-service client with retry and backoff
//! - [`bridge`]: per-message orchestration (forward to a peer or analyse locally)
//! - [`adapter`]: lifecycle around the bridge, registration and heartbeats
//! - [`server`] and [`api`]: the A2A endpoint and the plain HTTP API
//! - [`launcher`]: runs one or both servers with coordinated shutdown
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_nest::{Launcher, NestConfig, RunMode};
//! use std::sync::Arc;
//!
//! let config = NestConfig::from_env();
//! let launcher = Launcher::new(config, analysis_service, RunMode::Dual);
//! launcher.run().await?;
//! ```

pub mod adapter;
pub mod api;
pub mod audit;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod launcher;
pub mod query;
pub mod registry;
pub mod retry;
pub mod server;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapter::{AdapterStatus, AgentStatus, NestAdapter, RegistryStatus, StatusReporter};
pub use audit::{AuditEvent, AuditLog, AuditStats, TracingAuditLog};
pub use bridge::{AgentBridge, BridgeHealth};
pub use codec::{A2AMessage, ErrorCode, ParsedQuery, ReplyContext};
pub use config::NestConfig;
pub use error::{NestError, Result, TransportError};
pub use launcher::{Launcher, RunMode, wait_for_signal};
pub use query::{Intent, QueryIntent};
pub use registry::{RegistrationState, RegistryClient};
pub use retry::RetryPolicy;
