//! Coordinator server: accept loop, message dispatch, background tasks
//!
//! Every connection is served by its own tokio task, bounded by a
//! semaphore. All handlers funnel queue and registry mutations through one
//! mutex-guarded [`CoordinatorState`], which makes read-then-write
//! operations (pop-highest-priority, remove-by-id) atomic with respect to
//! each other: two concurrent `get_task` calls can never receive the same
//! task.
//!
//! Within a connection, requests are processed strictly in the order
//! received; there is no pipelining.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex, Semaphore};

use crate::coordinator::config::{ConfigError, CoordinatorConfig};
use crate::coordinator::registry::WorkerRegistry;
use crate::coordinator::snapshot;
use crate::metrics;
use crate::models::TaskStatus;
use crate::protocol::framing;
use crate::protocol::message::{Request, RequestDecodeError, Response};
use crate::queue::{RetentionPolicy, TaskQueue};

// ============================================================================
// Shared State
// ============================================================================

/// The mutable coordinator state: task queue plus worker registry
///
/// Guarded by a single mutex so that every dispatch observes and mutates a
/// consistent view of both structures.
#[derive(Debug)]
pub struct CoordinatorState {
    pub queue: TaskQueue,
    pub registry: WorkerRegistry,
}

impl CoordinatorState {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            queue: TaskQueue::with_retention(retention),
            registry: WorkerRegistry::new(),
        }
    }
}

/// Handle shared between connection handlers and background tasks
pub type SharedState = Arc<Mutex<CoordinatorState>>;

// ============================================================================
// Dispatch
// ============================================================================

/// Decode one inbound message and apply it to the shared state
///
/// Validation failures produce structured error responses with the exact
/// protocol messages; the connection stays open. `peer` is recorded as the
/// connection handle on registration.
pub async fn dispatch(state: &SharedState, message: Value, peer: Option<SocketAddr>) -> Response {
    let request = match Request::from_value(message) {
        Ok(request) => request,
        Err(RequestDecodeError::MissingAction) | Err(RequestDecodeError::Malformed(_)) => {
            return Response::error("Invalid message format");
        }
        Err(RequestDecodeError::UnknownAction(action)) => {
            tracing::debug!(action = %action, "unrecognized action");
            return Response::error("Unknown action");
        }
    };

    let mut guard = state.lock().await;

    match request {
        Request::Register { worker_id } => match guard.registry.register(&worker_id, peer) {
            Ok(()) => {
                metrics::set_registered_workers(guard.registry.len());
                tracing::info!(worker_id = %worker_id, "worker registered");
                Response::ok()
            }
            Err(_) => Response::error("Invalid worker ID"),
        },

        Request::Heartbeat { worker_id } => match guard.registry.heartbeat(&worker_id) {
            Ok(()) => {
                metrics::record_heartbeat();
                Response::ok()
            }
            Err(_) => {
                metrics::record_heartbeat_error();
                Response::error("Worker not found")
            }
        },

        Request::GetTask { worker_id } => match guard.queue.dequeue(&worker_id) {
            Some(task) => {
                metrics::record_task_assigned();
                tracing::info!(
                    task_id = %task.id,
                    worker_id = %worker_id,
                    priority = task.priority,
                    "task assigned"
                );
                Response::with_task(task)
            }
            None => Response::no_task(),
        },

        Request::SubmitResult {
            worker_id,
            task_id,
            result,
            error,
        } => match guard.queue.complete(&task_id, result, error) {
            Ok(status) => {
                match status {
                    TaskStatus::Failed => metrics::record_task_failed(),
                    _ => metrics::record_task_completed(),
                }
                tracing::info!(
                    task_id = %task_id,
                    worker_id = %worker_id,
                    status = %status,
                    "task finished"
                );
                Response::ok()
            }
            Err(_) => Response::error("Task not found"),
        },
    }
}

// ============================================================================
// Coordinator Server
// ============================================================================

/// The coordinator process: owns shared state and serves the TCP protocol
pub struct CoordinatorServer {
    config: CoordinatorConfig,
    state: SharedState,
}

impl CoordinatorServer {
    /// Create a new coordinator server
    pub fn new(config: CoordinatorConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let state = Arc::new(Mutex::new(CoordinatorState::new(RetentionPolicy::new(
            config.max_terminal_tasks,
        ))));

        Ok(Self { config, state })
    }

    /// Get a handle to the shared state
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Submission entry point: append a task to the pending set
    pub async fn add_task(&self, url: impl Into<String>, priority: i32) -> String {
        let url = url.into();
        let mut guard = self.state.lock().await;
        let id = guard.queue.enqueue(url.clone(), priority);
        metrics::record_task_enqueued();
        tracing::info!(task_id = %id, url = %url, priority, "task enqueued");
        id
    }

    /// Bind the listening socket
    ///
    /// Binding is separate from serving so callers (and tests) can learn
    /// the actual local address before the accept loop starts.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.bind_address;
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Bind and serve until the process is killed
    pub async fn start(&self) -> Result<(), ServerError> {
        self.start_with_shutdown(std::future::pending()).await
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections on an already-bound listener until `shutdown`
    /// resolves
    ///
    /// All connection handlers and background tasks observe the shutdown
    /// signal and exit cleanly rather than being abandoned.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr().map_err(ServerError::Io)?;
        tracing::info!(addr = %local_addr, "coordinator listening");

        let (shutdown_tx, _) = watch::channel(false);
        self.start_background_tasks(&shutdown_tx);

        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let permit = match semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            tracing::warn!(peer = %peer, "connection limit reached, rejecting");
                            drop(stream);
                            continue;
                        }
                    };

                    tracing::debug!(peer = %peer, "connection accepted");
                    let state = self.state.clone();
                    let shutdown_rx = shutdown_tx.subscribe();
                    tokio::spawn(async move {
                        handle_connection(state, stream, peer, shutdown_rx).await;
                        drop(permit);
                    });
                }
            }
        }

        let _ = shutdown_tx.send(true);
        tracing::info!("coordinator shutdown complete");
        Ok(())
    }

    /// Spawn the snapshot writer and the advisory liveness logger
    fn start_background_tasks(&self, shutdown_tx: &watch::Sender<bool>) {
        // Periodic dashboard snapshot.
        {
            let state = self.state.clone();
            let path = self.config.snapshot_path.clone();
            let interval = std::time::Duration::from_secs(self.config.snapshot_interval_secs);
            let mut shutdown_rx = shutdown_tx.subscribe();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = ticker.tick() => {
                            let document = {
                                let guard = state.lock().await;
                                snapshot::build_snapshot(&guard)
                            };
                            if let Err(e) = snapshot::write_snapshot(&path, &document).await {
                                tracing::warn!(error = %e, "failed to write state snapshot");
                            }
                        }
                    }
                }
            });
        }

        // Advisory liveness: computed and logged, never acted upon. Stale
        // workers keep their registry records and their in-flight tasks.
        {
            let state = self.state.clone();
            let window = chrono::Duration::seconds(self.config.heartbeat_timeout_secs as i64);
            let interval =
                std::time::Duration::from_secs(self.config.liveness_log_interval_secs);
            let mut shutdown_rx = shutdown_tx.subscribe();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = ticker.tick() => {
                            let guard = state.lock().await;
                            let total = guard.registry.len();
                            let live = guard.registry.live_workers(Utc::now(), window).len();
                            drop(guard);

                            if live < total {
                                tracing::warn!(live, total, "stale workers detected");
                            } else if total > 0 {
                                tracing::debug!(live, total, "all workers live");
                            }
                        }
                    }
                }
            });
        }
    }
}

/// Serve one connection until it closes, errors, or shutdown is signaled
///
/// Transport-level failures (broken frames, undecodable payloads, write
/// errors) terminate this handler only; the server keeps running.
async fn handle_connection(
    state: SharedState,
    stream: TcpStream,
    peer: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let (mut reader, mut writer) = stream.into_split();

    loop {
        let frame = tokio::select! {
            _ = shutdown_rx.changed() => break,
            frame = framing::read_frame(&mut reader) => frame,
        };

        match frame {
            Ok(Some(payload)) => {
                let message: Value = match serde_json::from_slice(&payload) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(peer = %peer, error = %e, "undecodable payload, closing connection");
                        break;
                    }
                };

                let response = dispatch(&state, message, Some(peer)).await;
                if let Err(e) = framing::write_message(&mut writer, &response).await {
                    tracing::warn!(peer = %peer, error = %e, "failed to send response");
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(peer = %peer, "peer disconnected");
                break;
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "protocol error, closing connection");
                break;
            }
        }
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server lifecycle errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration rejected by validation
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Could not bind the listening socket; aborts startup
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Listener I/O failure
    #[error("server I/O error: {0}")]
    Io(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_state() -> SharedState {
        Arc::new(Mutex::new(CoordinatorState::new(RetentionPolicy::default())))
    }

    #[tokio::test]
    async fn test_dispatch_register_ok() {
        let state = test_state();
        let response =
            dispatch(&state, json!({"action": "register", "worker_id": "w1"}), None).await;

        assert_eq!(response, Response::ok());
        assert!(state.lock().await.registry.contains("w1"));
    }

    #[tokio::test]
    async fn test_dispatch_register_empty_id() {
        let state = test_state();
        let response =
            dispatch(&state, json!({"action": "register", "worker_id": ""}), None).await;

        assert_eq!(response, Response::error("Invalid worker ID"));
    }

    #[tokio::test]
    async fn test_dispatch_heartbeat_unregistered() {
        let state = test_state();
        let response =
            dispatch(&state, json!({"action": "heartbeat", "worker_id": "ghost"}), None).await;

        assert_eq!(response, Response::error("Worker not found"));
    }

    #[tokio::test]
    async fn test_dispatch_get_task_empty_queue() {
        let state = test_state();
        let response =
            dispatch(&state, json!({"action": "get_task", "worker_id": "w1"}), None).await;

        assert_eq!(response, Response::no_task());
    }

    #[tokio::test]
    async fn test_dispatch_get_task_returns_highest_priority() {
        let state = test_state();
        {
            let mut guard = state.lock().await;
            guard.queue.enqueue("https://low.example", 1);
            guard.queue.enqueue("https://high.example", 5);
        }

        let response =
            dispatch(&state, json!({"action": "get_task", "worker_id": "w1"}), None).await;

        let task = response.task().expect("task snapshot");
        assert_eq!(task.priority, 5);
        assert_eq!(task.assigned_worker.as_deref(), Some("w1"));
    }

    #[tokio::test]
    async fn test_dispatch_submit_result_unknown_task() {
        let state = test_state();
        let message = json!({
            "action": "submit_result",
            "worker_id": "w1",
            "task_id": "unknown",
            "result": null,
            "error": null,
        });

        let response = dispatch(&state, message, None).await;
        assert_eq!(response, Response::error("Task not found"));
    }

    #[tokio::test]
    async fn test_dispatch_submit_result_completes_task() {
        let state = test_state();
        let task_id = {
            let mut guard = state.lock().await;
            let id = guard.queue.enqueue("https://example.com", 1);
            guard.queue.dequeue("w1").unwrap();
            id
        };

        let message = json!({
            "action": "submit_result",
            "worker_id": "w1",
            "task_id": task_id,
            "result": {"title": "Example"},
        });

        let response = dispatch(&state, message, None).await;
        assert_eq!(response, Response::ok());

        let guard = state.lock().await;
        assert_eq!(guard.queue.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_dispatch_missing_action() {
        let state = test_state();
        let response = dispatch(&state, json!({"worker_id": "w1"}), None).await;
        assert_eq!(response, Response::error("Invalid message format"));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_action() {
        let state = test_state();
        let response = dispatch(&state, json!({"action": "reboot"}), None).await;
        assert_eq!(response, Response::error("Unknown action"));
    }

    #[tokio::test]
    async fn test_server_creation_and_add_task() {
        let server = CoordinatorServer::new(CoordinatorConfig::default()).unwrap();
        let id = server.add_task("https://example.com", 3).await;

        let state = server.state();
        let guard = state.lock().await;
        assert_eq!(guard.queue.pending_len(), 1);
        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_get_task_no_double_assignment() {
        let state = test_state();
        {
            let mut guard = state.lock().await;
            for i in 0..4 {
                guard.queue.enqueue(format!("https://example.com/{i}"), 1);
            }
        }

        let mut handles = Vec::new();
        for i in 0..8 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                let message = json!({"action": "get_task", "worker_id": format!("w{i}")});
                dispatch(&state, message, None).await
            }));
        }

        let mut assigned = Vec::new();
        for handle in handles {
            if let Some(task) = handle.await.unwrap().task() {
                assigned.push(task.id.clone());
            }
        }

        // Four tasks, eight callers: each id handed out exactly once.
        assert_eq!(assigned.len(), 4);
        let unique: std::collections::HashSet<_> = assigned.iter().collect();
        assert_eq!(unique.len(), 4);
    }
}
