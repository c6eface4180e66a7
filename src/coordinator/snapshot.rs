//! Dashboard state snapshot
//!
//! The coordinator periodically serializes its full state (workers, the
//! four task lists, and category counts) into a JSON document consumed
//! read-only by the status page. Writes go through a temp file and rename
//! so readers never observe a partial document.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coordinator::registry::WorkerStatus;
use crate::coordinator::server::CoordinatorState;
use crate::error::Result;
use crate::models::{format_timestamp, TaskSnapshot, TaskStatus};
use crate::queue::QueueStats;

/// Per-worker entry in the snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    pub status: WorkerStatus,
    pub last_heartbeat: String,
}

/// The four task lists, each ordered for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSets {
    pub pending: Vec<TaskSnapshot>,
    pub active: Vec<TaskSnapshot>,
    pub completed: Vec<TaskSnapshot>,
    pub failed: Vec<TaskSnapshot>,
}

/// The full snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub workers: BTreeMap<String, WorkerSnapshot>,
    pub tasks: TaskSets,
    pub stats: QueueStats,
}

/// Build the snapshot document from the current coordinator state
pub fn build_snapshot(state: &CoordinatorState) -> StateSnapshot {
    let workers = state
        .registry
        .records()
        .map(|record| {
            (
                record.worker_id.clone(),
                WorkerSnapshot {
                    status: record.status,
                    last_heartbeat: format_timestamp(record.last_heartbeat),
                },
            )
        })
        .collect();

    StateSnapshot {
        workers,
        tasks: TaskSets {
            pending: state.queue.pending_snapshots(),
            active: state.queue.active_snapshots(),
            completed: state.queue.terminal_snapshots(TaskStatus::Completed),
            failed: state.queue.terminal_snapshots(TaskStatus::Failed),
        },
        stats: state.queue.stats(),
    }
}

/// Write the snapshot document atomically
pub async fn write_snapshot(path: &Path, snapshot: &StateSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let payload = serde_json::to_vec_pretty(snapshot)?;

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &payload).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
