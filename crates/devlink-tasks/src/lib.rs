//! devlink Tasks - Offloading work to the linked peer
//!
//! The [`TaskCorrelator`] owns the table of in-flight task requests,
//! matches asynchronous responses back to them by task id, and enforces
//! a per-task deadline. Delivery itself goes through an injected
//! [`Transport`] capability; the correlator makes no assumptions about
//! ordering or delivery guarantees of the wire.

pub mod correlator;
pub mod transport;

pub use correlator::{OffloadError, TaskCorrelator};
pub use transport::{Transport, TransportError};
