//! Domain error types

use thiserror::Error;

/// Result type alias using the domain error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to clients of the debugging backend
#[derive(Error, Debug)]
pub enum Error {
    /// Operation is not legal in the current lifecycle state
    /// (e.g. stepping while the debuggee is running, or inspecting
    /// the stack before the first stop)
    #[error("Invalid state: {0}")]
    State(String),

    /// Removal was requested for a location no breakpoint is registered at
    #[error("No breakpoint at {file}:{line}")]
    BreakpointNotFound { file: String, line: u32 },

    /// A variable reference token could not be decoded
    #[error("Invalid variable reference: {0}")]
    InvalidReference(String),

    /// No debug session exists for the given key
    #[error("No debug session for key: {0}")]
    SessionNotFound(String),

    /// Requested language has no debugger wired up
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// The underlying debugger failed or replied with an error
    #[error("Debugger error: {0}")]
    Adapter(String),

    /// A debugger command did not complete within the configured window
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// I/O error talking to the debugger process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for state errors
    pub fn state(msg: impl Into<String>) -> Self {
        Error::State(msg.into())
    }

    /// Shorthand for adapter errors
    pub fn adapter(msg: impl Into<String>) -> Self {
        Error::Adapter(msg.into())
    }
}
