//! In-memory task queue and scheduler
//!
//! The queue owns the three disjoint task partitions (pending, active and
//! terminal) and brokers every lifecycle transition between them:
//!
//! - `enqueue` appends a new task to the pending set
//! - `dequeue` hands the highest-priority pending task to a worker,
//!   transferring ownership exactly once
//! - `complete` moves an active task into the terminal map
//!
//! Pending tasks are ordered by priority (higher first) with ties broken by
//! insertion order. Terminal tasks are retained in memory for inspection
//! under an explicit capacity policy; once the bound is reached the oldest
//! terminal task is evicted.
//!
//! The queue itself is a plain synchronous structure. The coordinator wraps
//! it (together with the worker registry) in a single mutex so that
//! read-then-write operations like pop-highest-priority are atomic across
//! connection handlers.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use serde_json::Value;
use thiserror::Error;

use crate::models::{Task, TaskSnapshot, TaskStatus};

// ============================================================================
// Errors and policies
// ============================================================================

/// Queue operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The task id is not in the active set: unknown, still pending, or
    /// already terminal (duplicate submissions are rejected)
    #[error("task not found in active set: {0}")]
    TaskNotFound(String),
}

/// Retention policy for terminal tasks
///
/// Terminal tasks stay in memory for inspection. Without a bound the map
/// grows forever, so retention is explicit: past `max_terminal`, the oldest
/// terminal task is dropped for each new one retained.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub max_terminal: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { max_terminal: 10_000 }
    }
}

impl RetentionPolicy {
    pub fn new(max_terminal: usize) -> Self {
        Self { max_terminal }
    }
}

/// Counts of tasks per lifecycle category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

// ============================================================================
// Pending ordering
// ============================================================================

/// Heap entry ordering pending tasks by (priority desc, insertion asc)
#[derive(Debug)]
struct PendingEntry {
    priority: i32,
    seq: u64,
    task: Task,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority wins; among equals the earlier
        // insertion (smaller seq) is the greater element.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

// ============================================================================
// Task Queue
// ============================================================================

/// The pending/active/terminal task sets and their transitions
#[derive(Debug)]
pub struct TaskQueue {
    pending: BinaryHeap<PendingEntry>,
    active: HashMap<String, Task>,
    terminal: HashMap<String, Task>,
    /// Terminal insertion order, oldest first, for retention eviction
    terminal_order: VecDeque<String>,
    retention: RetentionPolicy,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::with_retention(RetentionPolicy::default())
    }

    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            pending: BinaryHeap::new(),
            active: HashMap::new(),
            terminal: HashMap::new(),
            terminal_order: VecDeque::new(),
            retention,
            next_seq: 0,
        }
    }

    /// Append a new task to the pending set and return its id
    ///
    /// No deduplication by URL; the pending set is unbounded.
    pub fn enqueue(&mut self, url: impl Into<String>, priority: i32) -> String {
        let task = Task::new(url, priority);
        let id = task.id.clone();

        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(PendingEntry {
            priority,
            seq,
            task,
        });

        id
    }

    /// Hand the highest-priority pending task to a worker
    ///
    /// Selects by priority, ties broken by earliest insertion. The task
    /// moves from pending to active, is marked in-progress with the worker
    /// recorded, and its snapshot is returned. Once dequeued, a task is
    /// never handed to a second caller.
    pub fn dequeue(&mut self, worker_id: &str) -> Option<TaskSnapshot> {
        let entry = self.pending.pop()?;
        let mut task = entry.task;
        task.assign(worker_id);

        let snapshot = task.snapshot();
        self.active.insert(task.id.clone(), task);
        Some(snapshot)
    }

    /// Move an active task into the terminal map
    ///
    /// If `error` is present the task fails with that description and any
    /// result is cleared; otherwise it completes with the given result. An
    /// id not in the active set is rejected with no side effect; terminal
    /// tasks are never overwritten.
    pub fn complete(
        &mut self,
        task_id: &str,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<TaskStatus, QueueError> {
        let mut task = self
            .active
            .remove(task_id)
            .ok_or_else(|| QueueError::TaskNotFound(task_id.to_string()))?;

        match error {
            Some(error) => task.fail(error),
            None => task.complete(result),
        }
        let status = task.status;

        self.terminal.insert(task.id.clone(), task);
        self.terminal_order.push_back(task_id.to_string());
        self.enforce_retention();

        Ok(status)
    }

    fn enforce_retention(&mut self) {
        while self.terminal.len() > self.retention.max_terminal {
            match self.terminal_order.pop_front() {
                Some(oldest) => {
                    self.terminal.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Look up a terminal task by id
    pub fn terminal_task(&self, task_id: &str) -> Option<&Task> {
        self.terminal.get(task_id)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn terminal_len(&self) -> usize {
        self.terminal.len()
    }

    /// Counts per category, reflecting the retained terminal set
    pub fn stats(&self) -> QueueStats {
        let completed = self
            .terminal
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();

        QueueStats {
            pending: self.pending.len(),
            active: self.active.len(),
            completed,
            failed: self.terminal.len() - completed,
        }
    }

    /// Pending task snapshots in dequeue order
    pub fn pending_snapshots(&self) -> Vec<TaskSnapshot> {
        let mut entries: Vec<&PendingEntry> = self.pending.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.iter().map(|e| e.task.snapshot()).collect()
    }

    /// Active task snapshots, oldest assignment first
    pub fn active_snapshots(&self) -> Vec<TaskSnapshot> {
        let mut tasks: Vec<&Task> = self.active.values().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks.iter().map(|t| t.snapshot()).collect()
    }

    /// Terminal snapshots with the given status, in completion order
    pub fn terminal_snapshots(&self, status: TaskStatus) -> Vec<TaskSnapshot> {
        let mut tasks: Vec<&Task> = self
            .terminal
            .values()
            .filter(|t| t.status == status)
            .collect();
        tasks.sort_by_key(|t| t.completed_at);
        tasks.iter().map(|t| t.snapshot()).collect()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
