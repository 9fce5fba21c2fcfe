//! GDB/MI debugger adapter
//!
//! Drives a GDB process over the MI text protocol and exposes it through
//! the session layer's `Debugger` trait. The crate splits into:
//!
//! - [`mi`]: the wire codec (records, values, commands)
//! - [`broker`]: request/reply correlation over GDB's stdio
//! - [`gdb`]: the adapter proper (lifecycle, breakpoints, variables)
//!
//! plus the supporting registries ([`breakpoints`], [`step_guard`],
//! [`path_mask`]) the adapter keeps per session.

pub mod breakpoints;
pub mod broker;
pub mod constants;
pub mod error;
pub mod gdb;
pub mod mi;
pub mod null_compiler;
pub mod path_mask;
pub mod step_guard;

pub use broker::{MiBroker, MiResult};
pub use error::{Error, Result};
pub use gdb::{DebugState, GdbAdapter, GdbDebuggerFactory, InferiorIo};
pub use null_compiler::NullCompiler;
