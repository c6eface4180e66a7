//! Shared helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use fetchq::coordinator::{CoordinatorConfig, CoordinatorServer, SharedState};
use fetchq::protocol::framing;

/// A coordinator serving on an ephemeral port with a temp snapshot path
pub struct TestCoordinator {
    pub addr: SocketAddr,
    pub server: Arc<CoordinatorServer>,
    stop: Option<oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<()>,
    _snapshot_dir: tempfile::TempDir,
}

impl TestCoordinator {
    /// Bind on 127.0.0.1:0 and start serving
    pub async fn start() -> Self {
        let snapshot_dir = tempfile::tempdir().expect("temp dir");

        let config = CoordinatorConfig::builder()
            .bind_address_str("127.0.0.1:0")
            .unwrap()
            .snapshot_path(snapshot_dir.path().join("state.json"))
            .build()
            .unwrap();

        let server = Arc::new(CoordinatorServer::new(config).unwrap());
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let serving = server.clone();
        let join = tokio::spawn(async move {
            serving
                .serve(listener, async {
                    let _ = stopped.await;
                })
                .await
                .expect("serve");
        });

        Self {
            addr,
            server,
            stop: Some(stop),
            join,
            _snapshot_dir: snapshot_dir,
        }
    }

    pub fn state(&self) -> SharedState {
        self.server.state()
    }

    /// Open a raw protocol connection to the coordinator
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.expect("connect")
    }

    /// Signal shutdown and wait for the accept loop to exit
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = self.join.await;
    }
}

/// Send a raw JSON message and read the JSON response
pub async fn round_trip(stream: &mut TcpStream, message: &Value) -> Value {
    framing::write_message(stream, message)
        .await
        .expect("write message");
    framing::read_message(stream)
        .await
        .expect("read message")
        .expect("response present")
}

/// Poll `predicate` against the locked coordinator state until it holds or
/// `timeout` elapses
pub async fn wait_for_state<F>(state: &SharedState, mut predicate: F, timeout: Duration) -> bool
where
    F: FnMut(&fetchq::coordinator::CoordinatorState) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        {
            let guard = state.lock().await;
            if predicate(&guard) {
                return true;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
