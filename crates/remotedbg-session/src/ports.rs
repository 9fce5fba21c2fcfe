//! Contracts between the session layer and its collaborators
//!
//! The MI layer implements [`Debugger`] and [`DebuggerFactory`]; the
//! sandbox/compile service implements [`CompileService`]. The session layer
//! depends only on these traits.

use async_trait::async_trait;
use remotedbg_core::{Breakpoint, DebugEvent, Language, Result, StackFrame, Variable};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Everything a debugger needs to prepare a session
#[derive(Debug, Clone)]
pub struct LaunchParams {
    pub language: Language,
    /// Source files to compile, inside the workspace
    pub sources: Vec<PathBuf>,
    /// Sandbox directory the sources live in; masked to `/` for clients
    pub work_path: PathBuf,
    /// Where the debug binary is written
    pub binary_path: PathBuf,
}

/// An interactive debugger bound to one session
///
/// Asynchronous outcomes (compile finished, stopped, output, ...) arrive on
/// the event channel handed to the factory; the methods here only cover the
/// request/response half of the protocol.
#[async_trait]
pub trait Debugger: Send + Sync {
    /// Compile the sources and load debug symbols. Returns immediately;
    /// progress is reported through Compile and Launch events.
    async fn launch(&self, params: LaunchParams) -> Result<()>;

    /// Start the debuggee running
    async fn start(&self) -> Result<()>;

    /// Forward a line of input to the debuggee's terminal
    async fn send_to_console(&self, input: &str) -> Result<()>;

    async fn step_over(&self) -> Result<()>;
    async fn step_in(&self) -> Result<()>;
    async fn step_out(&self) -> Result<()>;
    async fn continue_exec(&self) -> Result<()>;

    /// Insert breakpoints at the given (masked) locations
    async fn add_breakpoints(&self, breakpoints: Vec<Breakpoint>) -> Result<()>;

    /// Remove previously inserted breakpoints
    async fn remove_breakpoints(&self, breakpoints: Vec<Breakpoint>) -> Result<()>;

    /// Stack trace of the stopped debuggee, innermost frame first
    async fn get_stack_trace(&self) -> Result<Vec<StackFrame>>;

    /// Local variables of one frame
    async fn get_frame_variables(&self, frame_id: u32) -> Result<Vec<Variable>>;

    /// Children of an expandable variable, addressed by reference token
    async fn get_variables(&self, reference: &str) -> Result<Vec<Variable>>;

    /// Tear the session down. Idempotent.
    async fn terminate(&self) -> Result<()>;
}

pub type DebuggerRef = Arc<dyn Debugger>;

/// Creates debuggers for the session registry
#[async_trait]
pub trait DebuggerFactory: Send + Sync {
    /// Create a debugger for `language` that reports events on `events`
    async fn create(
        &self,
        language: Language,
        events: mpsc::Sender<DebugEvent>,
    ) -> Result<DebuggerRef>;
}

/// Options for one compile run
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub language: Language,
    /// Wall-clock limit for the whole compile
    pub time_limit: Duration,
    /// Path prefixes stripped from diagnostics before they reach clients
    pub excluded_paths: Vec<PathBuf>,
    /// What the stripped prefixes are replaced with
    pub replacement_path: String,
}

/// Result of a compile run; a failed compile is a normal outcome,
/// not an error
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub compiled: bool,
    pub error_message: String,
}

impl CompileOutcome {
    pub fn success() -> Self {
        Self {
            compiled: true,
            error_message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            compiled: false,
            error_message: message.into(),
        }
    }
}

/// Compiles submitted sources into a debuggable binary
///
/// Implemented outside this workspace by the sandbox service; the debugger
/// treats it as opaque.
#[async_trait]
pub trait CompileService: Send + Sync {
    async fn compile(
        &self,
        sources: &[PathBuf],
        output: &Path,
        options: &CompileOptions,
    ) -> Result<CompileOutcome>;
}
