//! Worker registry with heartbeat tracking
//!
//! The registry records which workers exist and when each was last seen.
//! Records are created by `register`, refreshed by `heartbeat`, and never
//! evicted automatically: staleness is observable through the advisory
//! liveness check, but acting on it (eviction, task reassignment) is an
//! explicitly deferred decision.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;

// ============================================================================
// Worker Status
// ============================================================================

/// Status label carried by a registry record
///
/// Registration always issues `Available`; the label exists for the
/// dashboard snapshot and future scheduling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Available,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
        }
    }
}

// ============================================================================
// Worker Record
// ============================================================================

/// Registry entry for one worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Identity supplied by the worker at registration
    pub worker_id: String,

    /// Peer address of the registering connection
    pub remote_addr: Option<SocketAddr>,

    /// Current status label
    pub status: WorkerStatus,

    /// When the worker registered
    pub registered_at: DateTime<Utc>,

    /// Last heartbeat received; never moves backwards
    pub last_heartbeat: DateTime<Utc>,
}

impl WorkerRecord {
    fn new(worker_id: String, remote_addr: Option<SocketAddr>) -> Self {
        let now = Utc::now();
        Self {
            worker_id,
            remote_addr,
            status: WorkerStatus::Available,
            registered_at: now,
            last_heartbeat: now,
        }
    }

    /// Seconds elapsed since the last heartbeat
    pub fn seconds_since_heartbeat(&self) -> i64 {
        (Utc::now() - self.last_heartbeat).num_seconds()
    }

    /// Whether the worker was seen within `threshold` of `now`
    pub fn is_live(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now - self.last_heartbeat < threshold
    }
}

// ============================================================================
// Worker Registry
// ============================================================================

/// Tracks connected worker identities and last-seen times
///
/// A plain synchronous structure: the coordinator serializes access through
/// its single state mutex.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, WorkerRecord>,
}

/// Registry operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Registration with a missing or empty worker id
    #[error("invalid worker id")]
    InvalidWorkerId,

    /// Heartbeat for an id that never registered
    #[error("worker not found: {0}")]
    WorkerNotFound(String),
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the record for a worker
    ///
    /// Re-registration with the same id replaces the existing record (a
    /// reconnecting worker resumes under its original identity).
    pub fn register(
        &mut self,
        worker_id: &str,
        remote_addr: Option<SocketAddr>,
    ) -> Result<(), RegistryError> {
        if worker_id.is_empty() {
            return Err(RegistryError::InvalidWorkerId);
        }

        self.workers.insert(
            worker_id.to_string(),
            WorkerRecord::new(worker_id.to_string(), remote_addr),
        );
        Ok(())
    }

    /// Refresh a worker's last-seen timestamp
    pub fn heartbeat(&mut self, worker_id: &str) -> Result<(), RegistryError> {
        let record = self
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| RegistryError::WorkerNotFound(worker_id.to_string()))?;

        // Monotonic: never move the timestamp backwards.
        record.last_heartbeat = record.last_heartbeat.max(Utc::now());
        Ok(())
    }

    pub fn contains(&self, worker_id: &str) -> bool {
        self.workers.contains_key(worker_id)
    }

    pub fn get(&self, worker_id: &str) -> Option<&WorkerRecord> {
        self.workers.get(worker_id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// All records, in no particular order
    pub fn records(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.workers.values()
    }

    /// Advisory liveness: ids of workers seen within `threshold` of `now`
    ///
    /// The coordinator logs this signal but takes no action on it; stale
    /// workers are neither evicted nor have their tasks reassigned.
    pub fn live_workers(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<String> {
        self.workers
            .values()
            .filter(|r| r.is_live(now, threshold))
            .map(|r| r.worker_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_creates_record() {
        let mut registry = WorkerRegistry::new();
        registry.register("w1", None).unwrap();

        assert!(registry.contains("w1"));
        let record = registry.get("w1").unwrap();
        assert_eq!(record.status, WorkerStatus::Available);
        assert_eq!(record.worker_id, "w1");
    }

    #[test]
    fn test_register_empty_id_rejected() {
        let mut registry = WorkerRegistry::new();
        let err = registry.register("", None).unwrap_err();

        assert_eq!(err, RegistryError::InvalidWorkerId);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reregister_overwrites() {
        let mut registry = WorkerRegistry::new();
        registry.register("w1", None).unwrap();
        let first_registered = registry.get("w1").unwrap().registered_at;

        registry.register("w1", "127.0.0.1:9999".parse().ok()).unwrap();

        assert_eq!(registry.len(), 1);
        let record = registry.get("w1").unwrap();
        assert!(record.remote_addr.is_some());
        assert!(record.registered_at >= first_registered);
    }

    #[test]
    fn test_heartbeat_unknown_worker() {
        let mut registry = WorkerRegistry::new();
        let err = registry.heartbeat("ghost").unwrap_err();
        assert_eq!(err, RegistryError::WorkerNotFound("ghost".into()));
    }

    #[test]
    fn test_heartbeat_is_monotonic() {
        let mut registry = WorkerRegistry::new();
        registry.register("w1", None).unwrap();

        let mut previous = registry.get("w1").unwrap().last_heartbeat;
        for _ in 0..5 {
            registry.heartbeat("w1").unwrap();
            let current = registry.get("w1").unwrap().last_heartbeat;
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_live_workers_threshold() {
        let mut registry = WorkerRegistry::new();
        registry.register("fresh", None).unwrap();
        registry.register("stale", None).unwrap();

        // Age one record past the window by hand.
        let now = Utc::now();
        registry.workers.get_mut("stale").unwrap().last_heartbeat =
            now - Duration::seconds(120);

        let live = registry.live_workers(now, Duration::seconds(30));
        assert_eq!(live, vec!["fresh".to_string()]);

        // Advisory only: the stale record is still registered.
        assert!(registry.contains("stale"));
    }

    #[test]
    fn test_seconds_since_heartbeat() {
        let mut registry = WorkerRegistry::new();
        registry.register("w1", None).unwrap();
        assert!(registry.get("w1").unwrap().seconds_since_heartbeat() < 2);
    }
}
