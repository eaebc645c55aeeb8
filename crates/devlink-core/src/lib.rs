//! devlink Core - Shared types and protocol definitions
//!
//! This crate provides the foundational types used across all devlink
//! components: device identity, task protocol messages, configuration,
//! and the clock abstraction used for deterministic expiry testing.

pub mod clock;
pub mod config;
pub mod device;
pub mod protocol;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LinkConfig;
pub use device::{DeviceId, DeviceInfo, DeviceRole};
pub use protocol::{TaskId, TaskKind, TaskRequest, TaskResponse, WireMessage};
