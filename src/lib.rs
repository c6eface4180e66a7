//! fetchq - Distributed URL-fetch task queue
//!
//! A coordinator process owns an in-memory priority task queue and a
//! worker registry; remote worker agents pull work over a length-prefixed
//! TCP protocol, fetch and summarize pages, and report results.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Wire framing and the typed message set
//! - [`models`] - Task data model and lifecycle state machine
//! - [`queue`] - Pending/active/terminal task sets and scheduling
//! - [`coordinator`] - Server, worker registry, snapshot writer, console
//! - [`worker`] - Worker agent loop, protocol client, page fetcher
//! - [`config`] - Configuration loading with defaults
//! - [`metrics`] - Prometheus counters and gauges
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use fetchq::coordinator::{CoordinatorConfig, CoordinatorServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = CoordinatorServer::new(CoordinatorConfig::default())?;
//!     server.add_task("https://example.com", 5).await;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod models;
pub mod protocol;
pub mod queue;
pub mod worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::coordinator::{CoordinatorConfig, CoordinatorServer, WorkerRegistry};
    pub use crate::error::{Error, Result};
    pub use crate::models::{Task, TaskSnapshot, TaskStatus};
    pub use crate::protocol::{Request, Response};
    pub use crate::queue::TaskQueue;
    pub use crate::worker::{PageFetcher, WorkerAgent, WorkerPool};
}

// Direct re-exports for convenience
pub use models::{Task, TaskSnapshot, TaskStatus};
