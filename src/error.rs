//! Unified error handling for the fetchq crate
//!
//! Domain errors live next to their modules ([`ProtocolError`],
//! [`QueueError`], [`RegistryError`], [`FetchError`], ...); this module
//! provides the umbrella [`Error`] enum for use across module boundaries
//! and the crate-wide [`Result`] alias. Binaries use `anyhow` at the edge.

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::coordinator::registry::RegistryError;
pub use crate::coordinator::server::ServerError;
pub use crate::protocol::ProtocolError;
pub use crate::queue::QueueError;
pub use crate::worker::agent::AgentError;
pub use crate::worker::client::ClientError;
pub use crate::worker::fetcher::FetchError;

/// Unified error type for the fetchq crate
#[derive(Error, Debug)]
pub enum Error {
    /// Wire protocol and framing errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Task queue errors
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Worker registry errors
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Coordinator server lifecycle errors
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// Worker-side transport errors
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Worker agent startup errors
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// Fetch collaborator errors
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the unified [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;
