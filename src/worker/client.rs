//! TCP client for talking to the coordinator
//!
//! One request/response round-trip per call, framed by the wire protocol.
//! Any transport failure marks the connection dead; callers decide when to
//! reconnect. Messages carry the worker id, so a reconnected client resumes
//! under the same identity.

use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::protocol::framing;
use crate::protocol::message::{Request, Response};
use crate::protocol::ProtocolError;

/// Client-side transport errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// No round-trip attempted: `connect` has not succeeded yet
    #[error("not connected to coordinator")]
    NotConnected,

    /// TCP connect failed
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Framing or serialization failure mid round-trip
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Client for the coordinator's wire protocol
pub struct CoordinatorClient {
    addr: String,
    stream: Option<TcpStream>,
}

impl CoordinatorClient {
    /// Create a client for a `host:port` coordinator address
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Establish (or re-establish) the TCP connection
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.addr.clone(),
                source,
            })?;

        tracing::debug!(addr = %self.addr, "connected to coordinator");
        self.stream = Some(stream);
        Ok(())
    }

    /// Close the connection
    pub fn disconnect(&mut self) {
        self.stream = None;
    }

    /// Send one request and wait for its response
    ///
    /// The connection is dropped on any transport error so the next call
    /// fails fast with `NotConnected` until the caller reconnects.
    pub async fn request(&mut self, request: &Request) -> Result<Response, ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        let result = Self::round_trip(stream, request).await;
        if result.is_err() {
            self.stream = None;
        }
        result.map_err(ClientError::Protocol)
    }

    async fn round_trip(
        stream: &mut TcpStream,
        request: &Request,
    ) -> Result<Response, ProtocolError> {
        framing::write_message(stream, request).await?;

        match framing::read_message(stream).await? {
            Some(response) => Ok(response),
            // Server closed between our request and its response.
            None => Err(ProtocolError::ConnectionBroken),
        }
    }

    pub async fn register(&mut self, worker_id: &str) -> Result<Response, ClientError> {
        self.request(&Request::register(worker_id)).await
    }

    pub async fn heartbeat(&mut self, worker_id: &str) -> Result<Response, ClientError> {
        self.request(&Request::heartbeat(worker_id)).await
    }

    pub async fn get_task(&mut self, worker_id: &str) -> Result<Response, ClientError> {
        self.request(&Request::get_task(worker_id)).await
    }

    pub async fn submit_result(
        &mut self,
        worker_id: &str,
        task_id: &str,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<Response, ClientError> {
        self.request(&Request::submit_result(worker_id, task_id, result, error))
            .await
    }
}
