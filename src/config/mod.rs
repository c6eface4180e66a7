//! Configuration management for fetchq
//!
//! Settings come from a TOML file plus `FETCHQ_*` environment overrides.
//! Configuration is never a startup failure: a missing or malformed file
//! logs a warning and the defaults apply, and invalid values are replaced
//! by their defaults one by one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::CoordinatorConfig;
use crate::worker::{AgentConfig, FetcherConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coordinator process configuration
    pub coordinator: CoordinatorSettings,

    /// Worker process configuration
    pub worker: WorkerSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Coordinator-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Host the worker protocol listens on
    pub host: String,

    /// Port the worker protocol listens on
    pub port: u16,

    /// Advisory heartbeat liveness window in seconds
    pub heartbeat_timeout_secs: u64,

    /// Maximum concurrently served connections
    pub max_connections: usize,

    /// Dashboard snapshot file path
    pub snapshot_path: PathBuf,

    /// Seconds between snapshot writes
    pub snapshot_interval_secs: u64,

    /// Terminal tasks retained before the oldest is evicted
    pub max_terminal_tasks: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        let defaults = CoordinatorConfig::default();
        Self {
            host: defaults.bind_address.ip().to_string(),
            port: defaults.bind_address.port(),
            heartbeat_timeout_secs: defaults.heartbeat_timeout_secs,
            max_connections: defaults.max_connections,
            snapshot_path: defaults.snapshot_path,
            snapshot_interval_secs: defaults.snapshot_interval_secs,
            max_terminal_tasks: defaults.max_terminal_tasks,
        }
    }
}

impl CoordinatorSettings {
    /// Resolve into the server configuration
    ///
    /// An unresolvable host falls back to the default bind address rather
    /// than failing startup.
    pub fn to_server_config(&self) -> CoordinatorConfig {
        let defaults = CoordinatorConfig::default();

        let bind_address: SocketAddr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .unwrap_or_else(|| {
                tracing::warn!(
                    host = %self.host,
                    port = self.port,
                    fallback = %defaults.bind_address,
                    "cannot resolve bind address, using default"
                );
                defaults.bind_address
            });

        CoordinatorConfig {
            bind_address,
            heartbeat_timeout_secs: self.heartbeat_timeout_secs,
            max_connections: self.max_connections,
            snapshot_path: self.snapshot_path.clone(),
            snapshot_interval_secs: self.snapshot_interval_secs,
            liveness_log_interval_secs: defaults.liveness_log_interval_secs,
            max_terminal_tasks: self.max_terminal_tasks,
        }
    }
}

/// Worker-side settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Coordinator host to connect to
    pub coordinator_host: String,

    /// Coordinator port to connect to
    pub coordinator_port: u16,

    /// User-Agent for fetches; a pool value is rotated in when absent
    pub user_agent: Option<String>,

    /// Per-fetch timeout in seconds
    pub fetch_timeout_secs: u64,

    /// Number of agents in the worker pool
    pub pool_size: usize,

    /// Seconds between polls when no task is available
    pub poll_interval_secs: u64,

    /// Seconds to back off after a transport error
    pub error_backoff_secs: u64,

    /// Maximum fetch requests per second per agent
    pub requests_per_second: u32,

    /// Fetch retry attempts for retryable failures
    pub max_retries: u32,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            coordinator_host: "127.0.0.1".to_string(),
            coordinator_port: 5000,
            user_agent: None,
            fetch_timeout_secs: 30,
            pool_size: 3,
            poll_interval_secs: 2,
            error_backoff_secs: 5,
            requests_per_second: 2,
            max_retries: 3,
        }
    }
}

impl WorkerSettings {
    /// The coordinator address as `host:port`
    pub fn coordinator_addr(&self) -> String {
        format!("{}:{}", self.coordinator_host, self.coordinator_port)
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            requests_per_second: self.requests_per_second,
            max_retries: self.max_retries,
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            error_backoff: Duration::from_secs(self.error_backoff_secs),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration with defaults, never failing
    ///
    /// File errors are logged and the defaults apply; environment
    /// overrides are applied on top; invalid values are normalized back to
    /// their defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = match path {
            Some(path) => match Self::from_file(path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "cannot load config file, using defaults"
                    );
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env();
        config.normalize();
        config
    }

    /// Apply `FETCHQ_*` environment overrides
    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("FETCHQ_COORDINATOR_HOST") {
            self.coordinator.host = host.clone();
            self.worker.coordinator_host = host;
        }

        if let Some(port) = std::env::var("FETCHQ_COORDINATOR_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.coordinator.port = port;
            self.worker.coordinator_port = port;
        }

        if let Ok(user_agent) = std::env::var("FETCHQ_USER_AGENT") {
            self.worker.user_agent = Some(user_agent);
        }

        if let Some(timeout) = std::env::var("FETCHQ_FETCH_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.worker.fetch_timeout_secs = timeout;
        }

        if let Some(pool_size) = std::env::var("FETCHQ_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.worker.pool_size = pool_size;
        }

        if let Ok(level) = std::env::var("FETCHQ_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("FETCHQ_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Replace invalid values with their defaults, warning per field
    fn normalize(&mut self) {
        if self.worker.pool_size == 0 {
            tracing::warn!("pool_size must be at least 1, using default");
            self.worker.pool_size = WorkerSettings::default().pool_size;
        }

        if self.worker.fetch_timeout_secs == 0 {
            tracing::warn!("fetch_timeout_secs must be at least 1, using default");
            self.worker.fetch_timeout_secs = WorkerSettings::default().fetch_timeout_secs;
        }

        if self.coordinator.max_connections == 0 {
            tracing::warn!("max_connections must be at least 1, using default");
            self.coordinator.max_connections = CoordinatorSettings::default().max_connections;
        }

        if self.coordinator.max_terminal_tasks == 0 {
            tracing::warn!("max_terminal_tasks must be at least 1, using default");
            self.coordinator.max_terminal_tasks =
                CoordinatorSettings::default().max_terminal_tasks;
        }

        if self.coordinator.snapshot_interval_secs == 0 {
            tracing::warn!("snapshot_interval_secs must be at least 1, using default");
            self.coordinator.snapshot_interval_secs =
                CoordinatorSettings::default().snapshot_interval_secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.coordinator.port, 5000);
        assert_eq!(config.worker.pool_size, 3);
        assert_eq!(config.worker.poll_interval_secs, 2);
        assert_eq!(config.worker.error_backoff_secs, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [worker]
            pool_size = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.worker.pool_size, 7);
        assert_eq!(config.worker.coordinator_port, 5000);
        assert_eq!(config.coordinator.host, "127.0.0.1");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/fetchq.toml")));
        assert_eq!(config.coordinator.port, 5000);
    }

    #[test]
    fn test_normalize_rejects_zero_pool() {
        let mut config = Config::default();
        config.worker.pool_size = 0;
        config.normalize();
        assert_eq!(config.worker.pool_size, 3);
    }

    #[test]
    fn test_coordinator_addr_string() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.coordinator_addr(), "127.0.0.1:5000");
    }

    #[test]
    fn test_to_server_config_resolves_address() {
        let settings = CoordinatorSettings {
            host: "127.0.0.1".into(),
            port: 6001,
            ..CoordinatorSettings::default()
        };

        let server_config = settings.to_server_config();
        assert_eq!(server_config.bind_address.port(), 6001);
        assert!(server_config.validate().is_ok());
    }

    #[test]
    fn test_to_server_config_bad_host_falls_back() {
        let settings = CoordinatorSettings {
            host: "definitely-not-a-real-host.invalid.".into(),
            port: 6001,
            ..CoordinatorSettings::default()
        };

        let server_config = settings.to_server_config();
        assert_eq!(
            server_config.bind_address,
            CoordinatorConfig::default().bind_address
        );
    }

    #[test]
    fn test_agent_config_conversion() {
        let settings = WorkerSettings {
            poll_interval_secs: 1,
            error_backoff_secs: 9,
            ..WorkerSettings::default()
        };

        let agent = settings.agent_config();
        assert_eq!(agent.poll_interval, Duration::from_secs(1));
        assert_eq!(agent.error_backoff, Duration::from_secs(9));
    }
}
