//! Core abstractions for stock agents
//!
//! This crate defines the types shared by every layer of an agent process:
//! the immutable [`AgentIdentity`], the [`MessageHandler`] trait that peer
//! transports call into, and the crate-wide error type.

pub mod error;
pub mod handler;
pub mod identity;

pub use error::{Error, Result};
pub use handler::MessageHandler;
pub use identity::AgentIdentity;
