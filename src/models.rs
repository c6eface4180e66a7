// Core data structures for the fetchq task distribution system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Format used for all human-readable timestamps on the wire and in the
/// dashboard snapshot file.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp in the snapshot/wire format.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the pending set, not yet handed to a worker
    Pending,

    /// Assigned to a worker and currently being executed
    InProgress,

    /// Finished successfully with a result payload
    Completed,

    /// Finished with an error description
    Failed,
}

impl TaskStatus {
    /// Check whether this status is terminal (completed or failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of work: a URL to fetch, with a priority and a lifecycle status
///
/// Tasks are created by the submission entry point and mutated only by the
/// task queue: `dequeue` moves pending tasks to in-progress, `complete`
/// moves in-progress tasks to a terminal state. Ids are UUIDv4, generated
/// at creation and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub url: String,
    pub priority: i32,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub assigned_worker: Option<String>,
}

impl Task {
    /// Create a new pending task for a URL
    pub fn new(url: impl Into<String>, priority: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            priority,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            error: None,
            assigned_worker: None,
        }
    }

    /// Mark the task as assigned to a worker
    ///
    /// Called exactly once, when the task is dequeued for assignment.
    pub(crate) fn assign(&mut self, worker_id: impl Into<String>) {
        self.status = TaskStatus::InProgress;
        self.assigned_worker = Some(worker_id.into());
    }

    /// Transition to `Completed`, recording the result payload
    pub(crate) fn complete(&mut self, result: Option<Value>) {
        self.status = TaskStatus::Completed;
        self.result = result;
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// Transition to `Failed`, recording the error description
    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.result = None;
        self.completed_at = Some(Utc::now());
    }

    /// Produce the immutable snapshot sent in `get_task` responses and
    /// written to the dashboard state file
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id.clone(),
            url: self.url.clone(),
            priority: self.priority,
            status: self.status,
            created_at: format_timestamp(self.created_at),
            completed_at: self.completed_at.map(format_timestamp),
            result: self.result.clone(),
            error: self.error.clone(),
            assigned_worker: self.assigned_worker.clone(),
        }
    }
}

/// Immutable view of a task as it appears on the wire and in the snapshot
/// file: timestamps rendered as strings, optional fields nullable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub url: String,
    pub priority: i32,
    pub status: TaskStatus,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub assigned_worker: Option<String>,
}
