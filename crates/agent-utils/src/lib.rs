//! Shared utilities for stock agents
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment variable parsing.

pub mod env;
pub mod logging;

pub use env::{EnvError, EnvLookup};
pub use logging::{LogFormat, init_tracing_with};
