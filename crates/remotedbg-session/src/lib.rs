//! Session layer: one debugger per user key
//!
//! This crate owns the application-level contracts (the [`Debugger`] trait
//! the MI layer implements, the [`CompileService`] collaborator boundary)
//! and the [`SessionRegistry`] that maps user keys to live debug sessions.

pub mod ports;
pub mod registry;
pub mod session;

pub use ports::{
    CompileOptions, CompileOutcome, CompileService, Debugger, DebuggerFactory, DebuggerRef,
    LaunchParams,
};
pub use registry::SessionRegistry;
pub use session::DebugSession;
