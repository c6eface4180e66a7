//! Typed request/response message set
//!
//! The message set is a closed tagged union: one variant per recognized
//! action, with required fields checked at decode time. Inbound frames are
//! first decoded as a raw JSON value so the coordinator can distinguish a
//! missing `action` field from an unrecognized action.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::TaskSnapshot;

// ============================================================================
// Requests
// ============================================================================

/// A request from a worker to the coordinator, tagged by `action`
///
/// The `worker_id` and `task_id` fields default to empty strings when
/// absent on the wire; the dispatch layer rejects empty identifiers with
/// the appropriate validation response instead of failing the decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Announce a worker to the coordinator
    Register {
        #[serde(default)]
        worker_id: String,
    },

    /// Refresh a registered worker's liveness timestamp
    Heartbeat {
        #[serde(default)]
        worker_id: String,
    },

    /// Ask for the next pending task
    GetTask {
        #[serde(default)]
        worker_id: String,
    },

    /// Report the outcome of an assigned task
    SubmitResult {
        #[serde(default)]
        worker_id: String,
        #[serde(default)]
        task_id: String,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Reasons an inbound value failed to decode into a [`Request`]
#[derive(Debug)]
pub enum RequestDecodeError {
    /// Message is not an object or carries no `action` field
    MissingAction,

    /// `action` names no recognized operation
    UnknownAction(String),

    /// Recognized action with malformed fields
    Malformed(serde_json::Error),
}

impl Request {
    const ACTIONS: &'static [&'static str] =
        &["register", "heartbeat", "get_task", "submit_result"];

    /// Decode a raw JSON value into a typed request
    ///
    /// Decoding is two-phase so validation failures map onto the protocol's
    /// error responses: no `action` field is distinct from an action no
    /// dispatch arm recognizes.
    pub fn from_value(value: Value) -> Result<Self, RequestDecodeError> {
        let action = match value.get("action") {
            Some(Value::String(action)) => action.clone(),
            Some(other) => return Err(RequestDecodeError::UnknownAction(other.to_string())),
            None => return Err(RequestDecodeError::MissingAction),
        };

        if !Self::ACTIONS.contains(&action.as_str()) {
            return Err(RequestDecodeError::UnknownAction(action));
        }

        serde_json::from_value(value).map_err(RequestDecodeError::Malformed)
    }

    /// The worker identity carried by this request
    pub fn worker_id(&self) -> &str {
        match self {
            Self::Register { worker_id }
            | Self::Heartbeat { worker_id }
            | Self::GetTask { worker_id }
            | Self::SubmitResult { worker_id, .. } => worker_id,
        }
    }

    pub fn register(worker_id: impl Into<String>) -> Self {
        Self::Register {
            worker_id: worker_id.into(),
        }
    }

    pub fn heartbeat(worker_id: impl Into<String>) -> Self {
        Self::Heartbeat {
            worker_id: worker_id.into(),
        }
    }

    pub fn get_task(worker_id: impl Into<String>) -> Self {
        Self::GetTask {
            worker_id: worker_id.into(),
        }
    }

    pub fn submit_result(
        worker_id: impl Into<String>,
        task_id: impl Into<String>,
        result: Option<Value>,
        error: Option<String>,
    ) -> Self {
        Self::SubmitResult {
            worker_id: worker_id.into(),
            task_id: task_id.into(),
            result,
            error,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// A coordinator response, tagged by `status`
///
/// Serialized shapes match the dispatch table exactly: `{"status": "ok"}`,
/// `{"status": "ok", "has_task": false}`, `{"status": "ok", "has_task":
/// true, "task": {...}}` and `{"status": "error", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_task: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task: Option<TaskSnapshot>,
    },
    Error {
        message: String,
    },
}

impl Response {
    /// Plain `{status: ok}` acknowledgement
    pub fn ok() -> Self {
        Self::Ok {
            has_task: None,
            task: None,
        }
    }

    /// `get_task` response when the pending set is empty
    pub fn no_task() -> Self {
        Self::Ok {
            has_task: Some(false),
            task: None,
        }
    }

    /// `get_task` response carrying an assigned task snapshot
    pub fn with_task(task: TaskSnapshot) -> Self {
        Self::Ok {
            has_task: Some(true),
            task: Some(task),
        }
    }

    /// Structured validation error; the connection stays open
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// The task snapshot, if this is a `get_task` response that carries one
    pub fn task(&self) -> Option<&TaskSnapshot> {
        match self {
            Self::Ok { task, .. } => task.as_ref(),
            Self::Error { .. } => None,
        }
    }
}
