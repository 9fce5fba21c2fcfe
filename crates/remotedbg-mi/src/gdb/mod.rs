//! The GDB-backed debugger
//!
//! [`GdbAdapter`] implements the session layer's `Debugger` contract on
//! top of [`MiBroker`](crate::broker::MiBroker). Construction is split:
//! [`GdbAdapter::new`] wires an adapter over arbitrary async streams
//! (tests drive it with in-memory duplex pipes), while
//! [`GdbAdapter::spawn`] starts a real GDB process and a pseudo-terminal
//! for the debuggee.

mod adapter;
mod events;
mod spawn;

pub use adapter::{DebugState, GdbAdapter};
pub use spawn::GdbDebuggerFactory;

use tokio::io::{AsyncRead, AsyncWrite};

/// Streams carrying the debuggee's terminal
///
/// In production these are the two halves of the pty master; tests
/// substitute in-memory pipes.
pub struct InferiorIo {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl InferiorIo {
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}
