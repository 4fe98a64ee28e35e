//! Error types for agent-core

use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for agent operations
#[derive(Error, Debug)]
pub enum Error {
    /// Identity fields are missing or malformed
    #[error("Invalid agent identity: {0}")]
    InvalidIdentity(String),
}
