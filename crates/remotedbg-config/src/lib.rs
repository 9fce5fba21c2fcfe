//! Configuration for the remote debugging backend
//!
//! All fields are optional in the TOML file; anything missing falls back to
//! the defaults in [`constants`].

pub mod constants;

use crate::constants::{
    DEFAULT_COMPILE_LIMIT_MS, DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_GDB_PATH,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_TERMINATE_RETRIES,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Timeouts and channel sizing for a debugger adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterTimeouts {
    /// Timeout in milliseconds for one MI request/response round trip
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Wall-clock limit in milliseconds for compiling submitted sources
    #[serde(default = "default_compile_limit_ms")]
    pub compile_limit_ms: u64,
    /// Capacity of the per-session debug event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Retries for a failing terminate during session teardown
    #[serde(default = "default_terminate_retries")]
    pub terminate_retries: u32,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_compile_limit_ms() -> u64 {
    DEFAULT_COMPILE_LIMIT_MS
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_terminate_retries() -> u32 {
    DEFAULT_TERMINATE_RETRIES
}

impl Default for AdapterTimeouts {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            compile_limit_ms: default_compile_limit_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            terminate_retries: default_terminate_retries(),
        }
    }
}

impl AdapterTimeouts {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn compile_limit(&self) -> Duration {
        Duration::from_millis(self.compile_limit_ms)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Path to the GDB binary
    #[serde(default = "default_gdb_path")]
    pub gdb_path: String,
    /// Adapter timeouts and channel sizing
    #[serde(default)]
    pub timeouts: AdapterTimeouts,
}

fn default_gdb_path() -> String {
    DEFAULT_GDB_PATH.to_string()
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            gdb_path: default_gdb_path(),
            timeouts: AdapterTimeouts::default(),
        }
    }
}

impl DebugConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}
