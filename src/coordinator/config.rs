//! Coordinator server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration for the coordinator server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Listening address for the worker protocol
    pub bind_address: SocketAddr,

    /// Heartbeat liveness window in seconds (advisory)
    pub heartbeat_timeout_secs: u64,

    /// Maximum concurrently served connections
    pub max_connections: usize,

    /// Where the dashboard state snapshot is written
    pub snapshot_path: PathBuf,

    /// Seconds between state snapshot writes
    pub snapshot_interval_secs: u64,

    /// Seconds between advisory liveness log lines
    pub liveness_log_interval_secs: u64,

    /// Terminal tasks retained in memory before the oldest is evicted
    pub max_terminal_tasks: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".parse().expect("valid default address"),
            heartbeat_timeout_secs: 30,
            max_connections: 64,
            snapshot_path: PathBuf::from("data/state.json"),
            snapshot_interval_secs: 1,
            liveness_log_interval_secs: 10,
            max_terminal_tasks: 10_000,
        }
    }
}

impl CoordinatorConfig {
    /// Create a new config builder
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat_timeout_secs",
                reason: "liveness window must be at least one second".to_string(),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_connections",
                reason: "must allow at least one connection".to_string(),
            });
        }

        if self.snapshot_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "snapshot_interval_secs",
                reason: "snapshot interval must be at least one second".to_string(),
            });
        }

        if self.max_terminal_tasks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_terminal_tasks",
                reason: "must retain at least one terminal task".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for [`CoordinatorConfig`]
#[derive(Debug, Default)]
pub struct CoordinatorConfigBuilder {
    bind_address: Option<SocketAddr>,
    heartbeat_timeout_secs: Option<u64>,
    max_connections: Option<usize>,
    snapshot_path: Option<PathBuf>,
    snapshot_interval_secs: Option<u64>,
    liveness_log_interval_secs: Option<u64>,
    max_terminal_tasks: Option<usize>,
}

impl CoordinatorConfigBuilder {
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set bind address from a `host:port` string
    pub fn bind_address_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.bind_address = Some(addr.parse().map_err(|_| ConfigError::InvalidValue {
            field: "bind_address",
            reason: format!("invalid address: {addr}"),
        })?);
        Ok(self)
    }

    pub fn heartbeat_timeout_secs(mut self, secs: u64) -> Self {
        self.heartbeat_timeout_secs = Some(secs);
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn snapshot_interval_secs(mut self, secs: u64) -> Self {
        self.snapshot_interval_secs = Some(secs);
        self
    }

    pub fn liveness_log_interval_secs(mut self, secs: u64) -> Self {
        self.liveness_log_interval_secs = Some(secs);
        self
    }

    pub fn max_terminal_tasks(mut self, max: usize) -> Self {
        self.max_terminal_tasks = Some(max);
        self
    }

    pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
        let defaults = CoordinatorConfig::default();
        let config = CoordinatorConfig {
            bind_address: self.bind_address.unwrap_or(defaults.bind_address),
            heartbeat_timeout_secs: self
                .heartbeat_timeout_secs
                .unwrap_or(defaults.heartbeat_timeout_secs),
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            snapshot_path: self.snapshot_path.unwrap_or(defaults.snapshot_path),
            snapshot_interval_secs: self
                .snapshot_interval_secs
                .unwrap_or(defaults.snapshot_interval_secs),
            liveness_log_interval_secs: self
                .liveness_log_interval_secs
                .unwrap_or(defaults.liveness_log_interval_secs),
            max_terminal_tasks: self
                .max_terminal_tasks
                .unwrap_or(defaults.max_terminal_tasks),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}
