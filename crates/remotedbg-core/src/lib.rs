//! Core domain types for the remote debugging backend
//!
//! This crate holds the entities shared by every layer: breakpoints, stack
//! frames, variables, the client-facing event stream, variable reference
//! tokens, and the domain error type. It has no knowledge of GDB or the MI
//! protocol; the `remotedbg-mi` crate maps wire-level records onto these
//! types.

pub mod entities;
pub mod error;
pub mod event;
pub mod varref;

pub use entities::{Breakpoint, Language, StackFrame, Variable};
pub use error::{Error, Result};
pub use event::{BreakpointReason, DebugEvent, StopReason};
pub use varref::VariableRef;
