//! devlink Net - Reference transport implementation
//!
//! Frames `WireMessage`s as a u32 big-endian length prefix followed by
//! a JSON body, over plain TCP. Outbound delivery goes through
//! [`TcpTransport`]; the inbound side runs a [`TaskListener`] that
//! answers pairing handshakes against a `PairingSession` and task
//! requests via an injected [`TaskHandler`].
//!
//! The wire channel is not encrypted; this transport is meant for
//! trusted local networks.

pub mod frame;
pub mod handshake;
pub mod listener;
pub mod tcp;

pub use handshake::{pair_with, HandshakeError};
pub use listener::{TaskHandler, TaskListener};
pub use tcp::TcpTransport;
