//! Coordinator process for distributed URL fetching
//!
//! The coordinator owns the task queue and the worker registry and serves
//! both over the length-prefixed TCP protocol. Workers pull: the
//! coordinator never pushes work to a connection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │          Coordinator Server         │
//! │                                     │
//! │  ┌──────────────────────────────┐   │
//! │  │       Worker Registry        │   │
//! │  │  - Registration              │   │
//! │  │  - Heartbeat tracking        │   │
//! │  │  - Advisory liveness         │   │
//! │  └──────────────────────────────┘   │
//! │                                     │
//! │  ┌──────────────────────────────┐   │
//! │  │         Task Queue           │   │
//! │  │  - Priority ordering         │   │
//! │  │  - Assignment / completion   │   │
//! │  │  - Terminal retention        │   │
//! │  └──────────────────────────────┘   │
//! │                                     │
//! │  ┌──────────────────────────────┐   │
//! │  │       TCP dispatch           │   │
//! │  │  register / heartbeat        │   │
//! │  │  get_task / submit_result    │   │
//! │  └──────────────────────────────┘   │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use fetchq::coordinator::{CoordinatorConfig, CoordinatorServer};
//!
//! let server = CoordinatorServer::new(CoordinatorConfig::default())?;
//! server.start_with_shutdown(shutdown_signal).await?;
//! ```

pub mod config;
pub mod console;
pub mod registry;
pub mod server;
pub mod snapshot;

pub use config::CoordinatorConfig;
pub use registry::{WorkerRecord, WorkerRegistry, WorkerStatus};
pub use server::{CoordinatorServer, CoordinatorState, ServerError, SharedState};
pub use snapshot::StateSnapshot;
