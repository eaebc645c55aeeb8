//! Task protocol message types
//!
//! Requests and responses are correlated by `TaskId`; `WireMessage` is
//! the framing-level envelope a transport exchanges between peers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::DeviceInfo;

/// Correlation key for one in-flight task
///
/// The correlator matches responses to requests strictly by this id;
/// uniqueness across concurrent offloads is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a fresh unique id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of work a task request carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Validate some input on the peer (e.g., run a classifier)
    Validation,
    /// Run a computation on the peer
    Computation,
    /// Synchronize state with the peer
    Sync,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskKind::Validation => "validation",
            TaskKind::Computation => "computation",
            TaskKind::Sync => "sync",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "validation" => Ok(Self::Validation),
            "computation" | "calculation" => Ok(Self::Computation),
            "sync" => Ok(Self::Sync),
            _ => Err(format!(
                "Invalid task kind: {}. Use: validation, computation, sync",
                s
            )),
        }
    }
}

/// A unit of work submitted to the linked peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Correlation key, unique per in-flight task
    pub task_id: TaskId,
    /// Kind of work requested
    pub kind: TaskKind,
    /// Task-kind-specific payload
    pub payload: serde_json::Value,
    /// When the request was created
    pub created_at: DateTime<Utc>,
}

impl TaskRequest {
    /// Create a request with a fresh unique id and current timestamp
    pub fn new(kind: TaskKind, payload: serde_json::Value) -> Self {
        Self {
            task_id: TaskId::generate(),
            kind,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Create a request with an explicit id
    pub fn with_id(id: impl Into<TaskId>, kind: TaskKind, payload: serde_json::Value) -> Self {
        Self {
            task_id: id.into(),
            kind,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// The peer's answer to one task request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    /// Correlation key of the originating request
    pub task_id: TaskId,
    /// Whether the peer executed the task successfully
    pub succeeded: bool,
    /// Result payload, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure description, present when `succeeded` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the peer produced this response
    pub responded_at: DateTime<Utc>,
}

impl TaskResponse {
    /// Successful response
    pub fn ok(task_id: TaskId, result: serde_json::Value) -> Self {
        Self {
            task_id,
            succeeded: true,
            result: Some(result),
            error: None,
            responded_at: Utc::now(),
        }
    }

    /// Failed response
    pub fn fail(task_id: TaskId, error: impl Into<String>) -> Self {
        Self {
            task_id,
            succeeded: false,
            result: None,
            error: Some(error.into()),
            responded_at: Utc::now(),
        }
    }
}

/// Envelope exchanged between linked peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Pairing handshake: present a credential secret and our identity
    Pair {
        secret: String,
        device: DeviceInfo,
    },
    /// Answer to a pairing handshake
    PairAck {
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        device: Option<DeviceInfo>,
    },
    /// Task delegation
    Task(TaskRequest),
    /// Task result
    TaskResult(TaskResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_ids_are_unique() {
        let a = TaskRequest::new(TaskKind::Sync, json!({}));
        let b = TaskRequest::new(TaskKind::Sync, json!({}));
        assert_ne!(a.task_id, b.task_id);
    }

    #[test]
    fn test_task_kind_parsing() {
        assert_eq!("validation".parse::<TaskKind>().unwrap(), TaskKind::Validation);
        assert_eq!("calculation".parse::<TaskKind>().unwrap(), TaskKind::Computation);
        assert_eq!("sync".parse::<TaskKind>().unwrap(), TaskKind::Sync);
        assert!("juggling".parse::<TaskKind>().is_err());
    }

    #[test]
    fn test_wire_message_tagging() {
        let msg = WireMessage::Task(TaskRequest::with_id(
            "t1",
            TaskKind::Validation,
            json!({"image": "abc"}),
        ));
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["type"], "task");
        assert_eq!(encoded["task_id"], "t1");

        let decoded: WireMessage = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_response_roundtrip_omits_empty_fields() {
        let resp = TaskResponse::ok(TaskId::from("t2"), json!({"ok": true}));
        let encoded = serde_json::to_value(&resp).unwrap();
        assert!(encoded.get("error").is_none());
        assert_eq!(encoded["succeeded"], true);
    }
}
