//! Worker agent: the polling loop
//!
//! Each agent owns one connection and moves through
//! `Disconnected → Registering → Polling ⇄ Executing` until stopped. The
//! steady loop is: heartbeat (best effort), poll for a task, execute it
//! through the fetch collaborator, report the outcome, repeat. No task
//! means a short fixed backoff; a transport failure means a longer backoff
//! followed by reconnect and re-registration under the same worker id.
//!
//! The agent never terminates on its own once started; only `stop()` (or
//! a failed startup registration) ends it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::TaskSnapshot;
use crate::protocol::Response;
use crate::worker::client::{ClientError, CoordinatorClient};
use crate::worker::fetcher::FetchError;

// ============================================================================
// Fetch collaborator seam
// ============================================================================

/// The fetch-and-extract collaborator invoked for every assigned task
///
/// Production uses [`crate::worker::PageFetcher`]; tests substitute mocks.
#[async_trait]
pub trait FetchExtract: Send + Sync {
    /// Fetch `url` and extract a structured result from the document
    async fn fetch_and_extract(&self, url: &str) -> Result<Value, FetchError>;
}

// ============================================================================
// Agent configuration
// ============================================================================

/// Timing knobs for the polling loop
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Sleep between polls when no task is available
    pub poll_interval: Duration,

    /// Sleep after a transport-level error before reconnecting
    pub error_backoff: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Agent startup errors
#[derive(Error, Debug)]
pub enum AgentError {
    /// Could not reach the coordinator at startup
    #[error(transparent)]
    Transport(#[from] ClientError),

    /// Coordinator answered registration with an error response
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),
}

/// Stop handle for a running agent
#[derive(Debug, Clone)]
pub struct AgentHandle {
    running: Arc<AtomicBool>,
}

impl AgentHandle {
    /// Mark the agent not-running; the loop exits at its next check
    ///
    /// In-flight execution is not cancelled: it completes or fails
    /// normally, and its result send then fails silently.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Worker Agent
// ============================================================================

/// One polling worker with its own connection and generated identity
pub struct WorkerAgent {
    worker_id: String,
    client: CoordinatorClient,
    executor: Arc<dyn FetchExtract>,
    config: AgentConfig,
    running: Arc<AtomicBool>,
}

impl WorkerAgent {
    pub fn new(
        coordinator_addr: impl Into<String>,
        executor: Arc<dyn FetchExtract>,
        config: AgentConfig,
    ) -> Self {
        Self {
            worker_id: Uuid::new_v4().to_string(),
            client: CoordinatorClient::new(coordinator_addr),
            executor,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            running: self.running.clone(),
        }
    }

    /// Connect, register, and run the polling loop until stopped
    ///
    /// Startup aborts with an error if the coordinator is unreachable or
    /// rejects the registration. After startup, transport failures are
    /// absorbed by backoff and reconnect.
    pub async fn start(&mut self) -> Result<(), AgentError> {
        tracing::info!(worker_id = %self.worker_id, addr = %self.client.addr(), "worker starting");

        self.client.connect().await?;
        self.register().await?;
        tracing::info!(worker_id = %self.worker_id, "registered with coordinator");

        self.running.store(true, Ordering::SeqCst);
        self.run_loop().await;

        self.client.disconnect();
        tracing::info!(worker_id = %self.worker_id, "worker stopped");
        Ok(())
    }

    async fn register(&mut self) -> Result<(), AgentError> {
        match self.client.register(&self.worker_id).await? {
            Response::Error { message } => Err(AgentError::RegistrationRejected(message)),
            _ => Ok(()),
        }
    }

    async fn run_loop(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.poll_once().await {
                tracing::warn!(
                    worker_id = %self.worker_id,
                    error = %e,
                    "transport error in worker loop, backing off"
                );
                tokio::time::sleep(self.config.error_backoff).await;
                self.reconnect().await;
            }
        }
    }

    /// One iteration of the steady loop: heartbeat, poll, maybe execute
    async fn poll_once(&mut self) -> Result<(), ClientError> {
        // Heartbeat is best effort: an error *response* is only logged,
        // while a transport error propagates into the backoff path.
        if let Response::Error { message } = self.client.heartbeat(&self.worker_id).await? {
            tracing::warn!(worker_id = %self.worker_id, message = %message, "heartbeat rejected");
        }

        let response = self.client.get_task(&self.worker_id).await?;
        match response.task().cloned() {
            Some(task) => self.execute(task).await?,
            None => tokio::time::sleep(self.config.poll_interval).await,
        }

        Ok(())
    }

    /// Execute one task and report its outcome
    ///
    /// Fetch failures never surface as transport errors: they are reported
    /// through `submit_result` with a human-readable description.
    async fn execute(&mut self, task: TaskSnapshot) -> Result<(), ClientError> {
        tracing::info!(
            worker_id = %self.worker_id,
            task_id = %task.id,
            url = %task.url,
            "executing task"
        );

        let (result, error) = match self.executor.fetch_and_extract(&task.url).await {
            Ok(result) => (Some(result), None),
            Err(e) => {
                tracing::warn!(
                    worker_id = %self.worker_id,
                    task_id = %task.id,
                    error = %e,
                    "task execution failed"
                );
                (None, Some(e.to_string()))
            }
        };

        let response = self
            .client
            .submit_result(&self.worker_id, &task.id, result, error)
            .await?;
        if let Response::Error { message } = response {
            tracing::warn!(
                worker_id = %self.worker_id,
                task_id = %task.id,
                message = %message,
                "result submission rejected"
            );
        }

        Ok(())
    }

    /// Re-establish the connection and registration under the same id
    async fn reconnect(&mut self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.client.connect().await {
            tracing::warn!(worker_id = %self.worker_id, error = %e, "reconnect failed");
            return;
        }

        match self.register().await {
            Ok(()) => {
                tracing::info!(worker_id = %self.worker_id, "reconnected and re-registered")
            }
            Err(e) => {
                tracing::warn!(worker_id = %self.worker_id, error = %e, "re-registration failed");
                self.client.disconnect();
            }
        }
    }
}

// ============================================================================
// Worker Pool
// ============================================================================

/// Runs a fixed-size pool of agents, each on its own tokio task
pub struct WorkerPool {
    handles: Vec<AgentHandle>,
    joins: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` agents against one coordinator, sharing the executor
    pub fn spawn(
        size: usize,
        coordinator_addr: &str,
        executor: Arc<dyn FetchExtract>,
        config: AgentConfig,
    ) -> Self {
        let mut handles = Vec::with_capacity(size);
        let mut joins = Vec::with_capacity(size);

        for _ in 0..size {
            let mut agent =
                WorkerAgent::new(coordinator_addr, executor.clone(), config.clone());
            handles.push(agent.handle());

            joins.push(tokio::spawn(async move {
                let worker_id = agent.worker_id().to_string();
                if let Err(e) = agent.start().await {
                    tracing::error!(worker_id = %worker_id, error = %e, "worker agent exited");
                }
            }));
        }

        Self { handles, joins }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every agent and wait for their tasks to finish
    pub async fn shutdown(self) {
        for handle in &self.handles {
            handle.stop();
        }
        for join in self.joins {
            let _ = join.await;
        }
    }
}
