//! Error types for MI operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// MI state violations and unexpected record shapes
    ///
    /// Use for: result classes other than the expected one, missing
    /// fields in a result payload.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A raw MI line could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Process I/O, channel operations, and reader lifecycle failures
    #[error("GDB communication error: {0}")]
    Communication(String),

    /// Spawning or killing the GDB process failed
    #[error("Process error: {0}")]
    Process(String),

    /// Request timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Communication(err.to_string())
    }
}

// Convert MI errors to core errors (enables ? operator in Debugger trait impls)
impl From<Error> for remotedbg_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Timeout(ms) => remotedbg_core::Error::Timeout(ms),
            other => remotedbg_core::Error::Adapter(other.to_string()),
        }
    }
}
