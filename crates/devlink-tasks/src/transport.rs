//! Transport capability consumed by the correlator
//!
//! The core does not specify wire encoding; anything that can deliver a
//! request to the linked peer satisfies this trait. The peer side must
//! eventually feed a matching response into
//! [`TaskCorrelator::deliver_response`](crate::TaskCorrelator::deliver_response),
//! or the caller observes a timeout.

use async_trait::async_trait;
use devlink_core::TaskRequest;
use thiserror::Error;

/// Delivery failures, distinct from timeouts
///
/// A transport failure means the request never left; a timeout means
/// the peer received it but did not answer in time. Callers use the
/// distinction to decide whether an immediate retry is sensible.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("delivery refused: {0}")]
    Refused(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Capability that attempts to deliver a serialized request to the
/// remote endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt to deliver the request to the linked peer
    async fn send(&self, request: &TaskRequest) -> Result<(), TransportError>;
}
