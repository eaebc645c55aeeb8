//! Request-response correlation with per-task deadlines
//!
//! Each offload registers a oneshot channel keyed by task id. Response
//! arrival and deadline firing race for the same entry; the pending
//! table is mutated under one lock, so whichever path removes the entry
//! first wins and the other is a no-op.

use devlink_core::config::DEFAULT_TASK_TIMEOUT;
use devlink_core::{TaskId, TaskKind, TaskRequest, TaskResponse};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::transport::{Transport, TransportError};

/// Terminal failure of one offload call
#[derive(Debug, Error)]
pub enum OffloadError {
    /// No response arrived within the configured window; the peer may
    /// have received the request but did not answer
    #[error("task {0} timed out")]
    Timeout(TaskId),
    /// The delivery attempt itself failed; the request never left
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// The correlation was cancelled or its slot was replaced by a
    /// newer offload with the same task id
    #[error("task {0} cancelled")]
    Cancelled(TaskId),
}

/// Owns the table of in-flight task requests and matches incoming
/// responses to them under a timeout
///
/// Responses are matched strictly by task id, never by arrival order.
/// Multiple offloads may be outstanding simultaneously, each with an
/// independent deadline. Wrap in an `Arc` to share with the inbound
/// response path.
pub struct TaskCorrelator {
    pending: Mutex<HashMap<TaskId, oneshot::Sender<TaskResponse>>>,
    timeout: Duration,
}

impl Default for TaskCorrelator {
    fn default() -> Self {
        Self::new(DEFAULT_TASK_TIMEOUT)
    }
}

impl TaskCorrelator {
    /// Create a correlator with the given per-task timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<TaskId, oneshot::Sender<TaskResponse>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Submit a task to the linked peer and await its response
    ///
    /// Exactly one of three outcomes occurs:
    /// 1. a matching [`deliver_response`](Self::deliver_response) before
    ///    the deadline resolves with that response;
    /// 2. the deadline elapses with no match: [`OffloadError::Timeout`];
    /// 3. `transport.send` fails: [`OffloadError::Transport`]
    ///    immediately, without waiting for the deadline.
    ///
    /// The deadline is armed when the correlation is registered, before
    /// the delivery attempt, so a stalled `send` counts against the
    /// same window as the wait for the response.
    ///
    /// Registering a second offload under the same task id silently
    /// replaces the first's slot (the displaced caller observes
    /// [`OffloadError::Cancelled`]); callers must guarantee uniqueness.
    pub async fn offload<T: Transport + ?Sized>(
        &self,
        request: TaskRequest,
        transport: &T,
    ) -> Result<TaskResponse, OffloadError> {
        let task_id = request.task_id.clone();
        let (tx, rx) = oneshot::channel();
        let deadline = tokio::time::Instant::now() + self.timeout;

        {
            let mut pending = self.pending();
            if pending.insert(task_id.clone(), tx).is_some() {
                debug!(task = %task_id, "replaced pending correlation slot");
            }
        }

        match tokio::time::timeout_at(deadline, transport.send(&request)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.pending().remove(&task_id);
                warn!(task = %task_id, error = %e, "task delivery failed");
                return Err(OffloadError::Transport(e));
            }
            Err(_) => {
                self.pending().remove(&task_id);
                debug!(task = %task_id, "task timed out during delivery");
                return Err(OffloadError::Timeout(task_id));
            }
        }

        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(response)) => Ok(response),
            // Sender dropped: cancelled, or the slot was replaced
            Ok(Err(_)) => Err(OffloadError::Cancelled(task_id)),
            Err(_) => {
                // Deadline won the race; a response landing after this
                // removal is discarded as unknown
                self.pending().remove(&task_id);
                debug!(task = %task_id, "task timed out");
                Err(OffloadError::Timeout(task_id))
            }
        }
    }

    /// Feed an inbound response to its awaiting offload call
    ///
    /// Unknown, late, or duplicate task ids are silently discarded;
    /// that is not an error. Synchronous and non-blocking.
    pub fn deliver_response(&self, response: TaskResponse) {
        let entry = self.pending().remove(&response.task_id);
        match entry {
            Some(tx) => {
                // Receiver may have just timed out; dropping the
                // response here is the correct no-op
                let _ = tx.send(response);
            }
            None => {
                debug!(task = %response.task_id, "discarding response for unknown task");
            }
        }
    }

    /// Cancel a pending correlation, behaving like an immediate timeout
    ///
    /// Returns whether an entry was present. The awaiting caller
    /// observes [`OffloadError::Cancelled`].
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        self.pending().remove(task_id).is_some()
    }

    /// Number of correlations currently in flight
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Build a validation task with a fresh id and current timestamp
    pub fn build_validation_task(&self, payload: serde_json::Value) -> TaskRequest {
        TaskRequest::new(TaskKind::Validation, payload)
    }

    /// Build a computation task with a fresh id and current timestamp
    pub fn build_computation_task(&self, payload: serde_json::Value) -> TaskRequest {
        TaskRequest::new(TaskKind::Computation, payload)
    }

    /// Build a sync task with a fresh id and current timestamp
    pub fn build_sync_task(&self, payload: serde_json::Value) -> TaskRequest {
        TaskRequest::new(TaskKind::Sync, payload)
    }
}
