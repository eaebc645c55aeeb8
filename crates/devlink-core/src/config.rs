//! Configuration for devlink
//!
//! Defaults match the published protocol constants; each value can be
//! overridden from the environment (`DEVLINK_*`) or the CLI.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default listening port for the task/pairing listener
pub const DEFAULT_PORT: u16 = 8765;

/// Default validity window for a pairing credential
pub const DEFAULT_PAIRING_TTL: Duration = Duration::from_millis(30_000);

/// Default deadline for one offloaded task
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Main configuration for a devlink instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Listening port
    pub port: u16,
    /// How long an issued pairing credential stays valid
    pub pairing_ttl: Duration,
    /// How long one offloaded task may stay pending
    pub task_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            pairing_ttl: DEFAULT_PAIRING_TTL,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

impl LinkConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set pairing credential TTL
    pub fn with_pairing_ttl(mut self, ttl: Duration) -> Self {
        self.pairing_ttl = ttl;
        self
    }

    /// Builder pattern: set per-task timeout
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Load configuration from `DEVLINK_PORT`, `DEVLINK_PAIRING_TTL_MS`
    /// and `DEVLINK_TASK_TIMEOUT_MS`, falling back to defaults for any
    /// variable that is unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = env_parse::<u16>("DEVLINK_PORT") {
            config.port = port;
        }
        if let Some(ms) = env_parse::<u64>("DEVLINK_PAIRING_TTL_MS") {
            config.pairing_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("DEVLINK_TASK_TIMEOUT_MS") {
            config.task_timeout = Duration::from_millis(ms);
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}
