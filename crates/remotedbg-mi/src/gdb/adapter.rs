//! GDB adapter state and the `Debugger` implementation

use super::{events, InferiorIo};
use crate::breakpoints::BreakpointRegistry;
use crate::broker::{MiBroker, MiResult};
use crate::constants::{
    BREAK_DELETE, BREAK_INSERT, EXEC_CONTINUE, EXEC_FINISH, EXEC_INTERRUPT, EXEC_NEXT, EXEC_RUN,
    EXEC_STEP, FILE_EXEC_AND_SYMBOLS, GDB_SET, GDB_STARTUP_OPTIONS, INFERIOR_TTY_SET,
    SCRATCH_VAROBJ, STACK_LIST_FRAMES, STACK_LIST_VARIABLES, STACK_SELECT_FRAME, THREAD_INFO,
    VAR_CREATE, VAR_DELETE, VAR_LIST_CHILDREN,
};
use crate::mi::MiCommand;
use crate::path_mask::PathMasker;
use crate::step_guard::StepGuard;
use async_trait::async_trait;
use remotedbg_config::AdapterTimeouts;
use remotedbg_core::{
    Breakpoint, BreakpointReason, DebugEvent, Error, Result, StackFrame, Variable, VariableRef,
};
use remotedbg_session::{CompileOptions, CompileService, Debugger, LaunchParams};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Coarse session lifecycle. Fine-grained run/stop transitions are
/// tracked by the running flag, driven by `*running`/`*stopped` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugState {
    /// No launch attempted yet
    Unlaunched,
    /// Compile and symbol load in progress
    Launching,
    /// Symbols loaded, debuggee not started
    Loaded,
    /// Debuggee started
    Started,
    /// Debuggee exited
    Exited,
    /// Session torn down
    Terminated,
}

/// State shared between the adapter methods and the notification loop
pub(super) struct AdapterShared {
    pub(super) broker: Arc<MiBroker>,
    pub(super) events: mpsc::Sender<DebugEvent>,
    /// True between an unsuppressed `*running` and the next `*stopped`
    pub(super) running: RwLock<bool>,
    pub(super) registry: std::sync::Mutex<BreakpointRegistry>,
    pub(super) guard: StepGuard,
    pub(super) state: Mutex<DebugState>,
    pub(super) masker: RwLock<Option<PathMasker>>,
    pub(super) timeouts: AdapterTimeouts,
}

impl AdapterShared {
    pub(super) async fn emit(&self, event: DebugEvent) {
        debug!(event = %event, "Emitting debug event");
        if self.events.send(event).await.is_err() {
            debug!("Event channel closed, event dropped");
        }
    }

    pub(super) async fn set_state(&self, state: DebugState) {
        *self.state.lock().await = state;
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, BreakpointRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The GDB-backed debugger for one session
pub struct GdbAdapter {
    shared: Arc<AdapterShared>,
    compiler: Arc<dyn CompileService>,
    /// Debuggee output; taken by the forwarder task on `start`
    inferior_reader: Mutex<Option<Box<dyn AsyncRead + Send + Unpin>>>,
    /// Debuggee input (console forwarding)
    inferior_writer: Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    /// Slave side of the debuggee pty, when one was allocated
    inferior_tty: Option<String>,
    process: Mutex<Option<Child>>,
    notify_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    output_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl GdbAdapter {
    /// Wire an adapter over existing MI and debuggee streams
    pub fn new<R, W>(
        mi_reader: R,
        mi_writer: W,
        inferior: InferiorIo,
        compiler: Arc<dyn CompileService>,
        events: mpsc::Sender<DebugEvent>,
        timeouts: AdapterTimeouts,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (notify_tx, notify_rx) = mpsc::channel(timeouts.event_channel_capacity);
        let broker = Arc::new(MiBroker::new(mi_reader, mi_writer, notify_tx, timeouts.clone()));

        let shared = Arc::new(AdapterShared {
            broker,
            events,
            running: RwLock::new(false),
            registry: std::sync::Mutex::new(BreakpointRegistry::new()),
            guard: StepGuard::new(),
            state: Mutex::new(DebugState::Unlaunched),
            masker: RwLock::new(None),
            timeouts,
        });

        let notify_task = tokio::spawn(events::notification_loop(Arc::clone(&shared), notify_rx));

        Self {
            shared,
            compiler,
            inferior_reader: Mutex::new(Some(inferior.reader)),
            inferior_writer: Mutex::new(inferior.writer),
            inferior_tty: None,
            process: Mutex::new(None),
            notify_task: Mutex::new(Some(notify_task)),
            output_task: Mutex::new(None),
        }
    }

    pub(super) fn attach_process(&mut self, process: Child, tty: String) {
        self.process = Mutex::new(Some(process));
        self.inferior_tty = Some(tty);
    }

    pub async fn state(&self) -> DebugState {
        *self.shared.state.lock().await
    }

    /// Current breakpoint count (diagnostics)
    pub fn breakpoint_count(&self) -> usize {
        self.shared.registry().len()
    }

    async fn fail_if_running(&self) -> Result<()> {
        if *self.shared.running.read().await {
            return Err(Error::state("debuggee is running"));
        }
        Ok(())
    }

    /// Apply startup options and bind the debuggee tty. Failures are
    /// logged; a partially configured GDB is still usable.
    async fn configure_gdb(shared: &AdapterShared, tty: Option<&str>) {
        for (option, value) in GDB_STARTUP_OPTIONS {
            // Multi-word options ("print elements") go as separate words
            let mut command = MiCommand::new(GDB_SET);
            for word in option.split_whitespace() {
                command = command.arg(word);
            }
            let command = command.arg(*value);
            if let Err(e) = shared.broker.send_request(command).await {
                warn!(option, error = %e, "GDB option rejected");
            }
        }
        if let Some(tty) = tty {
            let command = MiCommand::new(INFERIOR_TTY_SET).arg(tty);
            if let Err(e) = shared.broker.send_request(command).await {
                warn!(error = %e, "Failed to bind inferior tty");
            }
        }
    }

    async fn masker(&self) -> Result<PathMasker> {
        self.shared
            .masker
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::state("session not launched"))
    }

    /// Thread id GDB considers current; variables are always fetched
    /// against an explicit thread/frame pair
    async fn current_thread(&self) -> Result<String> {
        let reply = self
            .shared
            .broker
            .send_request(MiCommand::new(THREAD_INFO))
            .await?;
        Ok(reply.payload.expect_str("current-thread-id")?.to_string())
    }

    /// Create the scratch variable object for `expression`
    async fn create_scratch(&self, expression: &str) -> Result<MiResult> {
        self.shared
            .broker
            .send_request(
                MiCommand::new(VAR_CREATE)
                    .arg(SCRATCH_VAROBJ)
                    .arg("*")
                    .arg(expression),
            )
            .await
            .map_err(Error::from)
    }

    /// Delete the scratch variable object. Always called once a create
    /// succeeded, even when the listing in between failed.
    async fn delete_scratch(&self) {
        if let Err(e) = self
            .shared
            .broker
            .send_request(MiCommand::new(VAR_DELETE).arg(SCRATCH_VAROBJ))
            .await
        {
            warn!(error = %e, "Failed to delete scratch variable object");
        }
    }

    /// Children of the scratch variable object, converted to variables
    /// with `scope`-appropriate references
    async fn list_scratch_children(&self, scope: &ChildScope) -> Result<Vec<Variable>> {
        let reply = self
            .shared
            .broker
            .send_request(MiCommand::new(VAR_LIST_CHILDREN).arg("2").arg(SCRATCH_VAROBJ))
            .await?;

        let mut variables = Vec::new();
        for child in reply.payload.get_list("children").unwrap_or(&[]) {
            let exp = match child.get_str("exp") {
                Some(exp) => exp,
                None => continue,
            };
            let var_type = child.get_str("type").unwrap_or("").to_string();
            let value = child.get_str("value").unwrap_or("").to_string();
            let numchild = child.get_u32("numchild").unwrap_or(0);
            variables.push(make_variable(scope, exp, var_type, value, numchild));
        }
        Ok(variables)
    }
}

/// How children of an expanded variable are addressed
///
/// `parent` is the frame-relative expression for frame scopes, and the
/// path suffix behind the dereferenced base for pointer scopes. In the
/// pointer case it is empty or starts with `.`/`[`, so appending a
/// segment always yields another valid suffix.
enum ChildScope {
    Frame { frame_id: u32, parent: String },
    Pointer {
        pointer_type: String,
        address: u64,
        parent: String,
    },
}

impl ChildScope {
    /// Expression for a child named `exp`; numeric names are array indices
    fn child_path(parent: &str, exp: &str) -> String {
        if !exp.is_empty() && exp.bytes().all(|b| b.is_ascii_digit()) {
            format!("{}[{}]", parent, exp)
        } else {
            format!("{}.{}", parent, exp)
        }
    }

    fn reference_for(&self, exp: &str) -> String {
        match self {
            Self::Frame { frame_id, parent } => {
                VariableRef::frame(*frame_id, Self::child_path(parent, exp)).encode()
            }
            Self::Pointer {
                pointer_type,
                address,
                parent,
            } => VariableRef::pointer(
                pointer_type.clone(),
                *address,
                Self::child_path(parent, exp),
            )
            .encode(),
        }
    }
}

/// Build a child variable, preferring a pointer reference when the child
/// is itself an inspectable pointer
fn make_variable(
    scope: &ChildScope,
    exp: &str,
    var_type: String,
    value: String,
    numchild: u32,
) -> Variable {
    let reference = if let Some(address) = pointer_target(&var_type, &value) {
        Some(VariableRef::pointer(var_type.clone(), address, "").encode())
    } else if numchild > 0 {
        Some(scope.reference_for(exp))
    } else {
        None
    };
    Variable {
        name: exp.to_string(),
        var_type,
        value,
        reference,
    }
}

/// Address behind a non-string pointer value, if the value holds one.
/// `char *` and friends print as strings and are displayed inline.
fn pointer_target(var_type: &str, value: &str) -> Option<u64> {
    let trimmed = var_type.trim_end();
    if !trimmed.ends_with('*') {
        return None;
    }
    // The pointee type is whatever precedes the `*`s; only a bare `char`
    // base ("char", "unsigned char", ...) prints as a string. Types that
    // merely contain "char" (charset_t) are ordinary pointers.
    let base = trimmed.trim_end_matches(['*', ' ']);
    if base.split_whitespace().last() == Some("char") {
        return None;
    }
    let raw = value.split_whitespace().next()?.strip_prefix("0x")?;
    match u64::from_str_radix(raw, 16) {
        Ok(0) | Err(_) => None,
        Ok(address) => Some(address),
    }
}

#[async_trait]
impl Debugger for GdbAdapter {
    async fn launch(&self, params: LaunchParams) -> Result<()> {
        {
            let mut state = self.shared.state.lock().await;
            if *state != DebugState::Unlaunched {
                return Err(Error::state(format!("launch not legal in {:?}", *state)));
            }
            *state = DebugState::Launching;
        }
        *self.shared.masker.write().await = Some(PathMasker::new(&params.work_path));
        info!(work_path = %params.work_path.display(), "Launching debug session");

        let shared = Arc::clone(&self.shared);
        let compiler = Arc::clone(&self.compiler);
        let tty = self.inferior_tty.clone();
        tokio::spawn(async move {
            let options = CompileOptions {
                language: params.language,
                time_limit: shared.timeouts.compile_limit(),
                excluded_paths: vec![params.work_path.clone()],
                replacement_path: "/".to_string(),
            };
            let outcome = match compiler
                .compile(&params.sources, &params.binary_path, &options)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "Compile service failed");
                    shared
                        .emit(DebugEvent::Compile {
                            success: false,
                            message: e.to_string(),
                        })
                        .await;
                    shared.set_state(DebugState::Unlaunched).await;
                    return;
                }
            };

            shared
                .emit(DebugEvent::Compile {
                    success: outcome.compiled,
                    message: outcome.error_message.clone(),
                })
                .await;
            if !outcome.compiled {
                shared.set_state(DebugState::Unlaunched).await;
                return;
            }

            Self::configure_gdb(&shared, tty.as_deref()).await;

            let load = shared
                .broker
                .send_request(
                    MiCommand::new(FILE_EXEC_AND_SYMBOLS)
                        .arg(params.binary_path.display().to_string()),
                )
                .await;
            match load {
                Ok(_) => {
                    shared.set_state(DebugState::Loaded).await;
                    shared
                        .emit(DebugEvent::Launch {
                            success: true,
                            message: String::new(),
                        })
                        .await;
                }
                Err(e) => {
                    warn!(error = %e, "Symbol load failed");
                    shared.set_state(DebugState::Unlaunched).await;
                    shared
                        .emit(DebugEvent::Launch {
                            success: false,
                            message: e.to_string(),
                        })
                        .await;
                }
            }
        });
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        {
            let state = self.shared.state.lock().await;
            if *state != DebugState::Loaded {
                return Err(Error::state(format!("start not legal in {:?}", *state)));
            }
        }
        self.shared
            .broker
            .send_request(MiCommand::new(EXEC_RUN))
            .await?;
        self.shared.set_state(DebugState::Started).await;

        // Forward debuggee output for the rest of the session
        if let Some(mut reader) = self.inferior_reader.lock().await.take() {
            let shared = Arc::clone(&self.shared);
            let task = tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match reader.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let output = String::from_utf8_lossy(&buf[..n]).into_owned();
                            shared.emit(DebugEvent::Output { output }).await;
                        }
                    }
                }
                debug!("Debuggee output stream closed");
            });
            *self.output_task.lock().await = Some(task);
        }
        Ok(())
    }

    async fn send_to_console(&self, input: &str) -> Result<()> {
        let mut writer = self.inferior_writer.lock().await;
        writer.write_all(input.as_bytes()).await?;
        if !input.ends_with('\n') {
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
        Ok(())
    }

    async fn step_over(&self) -> Result<()> {
        let running = self.shared.running.read().await;
        if *running {
            return Err(Error::state("debuggee is running"));
        }
        self.shared.broker.send_background(MiCommand::new(EXEC_NEXT));
        Ok(())
    }

    async fn step_in(&self) -> Result<()> {
        let running = self.shared.running.read().await;
        if *running {
            return Err(Error::state("debuggee is running"));
        }
        self.shared.broker.send_background(MiCommand::new(EXEC_STEP));
        Ok(())
    }

    async fn step_out(&self) -> Result<()> {
        let running = self.shared.running.read().await;
        if *running {
            return Err(Error::state("debuggee is running"));
        }
        self.shared
            .broker
            .send_background(MiCommand::new(EXEC_FINISH));
        Ok(())
    }

    async fn continue_exec(&self) -> Result<()> {
        let running = self.shared.running.read().await;
        if *running {
            return Err(Error::state("debuggee is running"));
        }
        self.shared
            .broker
            .send_background(MiCommand::new(EXEC_CONTINUE));
        Ok(())
    }

    async fn add_breakpoints(&self, breakpoints: Vec<Breakpoint>) -> Result<()> {
        let masker = self.masker().await?;
        // One event per acknowledged insert: a failure mid-list leaves
        // clients and the registry agreeing on what was placed
        for breakpoint in breakpoints {
            let location = format!(
                "{}:{}",
                masker.unmask(&breakpoint.file).display(),
                breakpoint.line
            );
            let reply = self
                .shared
                .broker
                .send_request(MiCommand::new(BREAK_INSERT).arg(location))
                .await?;
            let bkpt = reply
                .payload
                .get("bkpt")
                .ok_or_else(|| crate::error::Error::Protocol("break-insert without bkpt".into()))?;
            let number = bkpt
                .get_str("number")
                .ok_or_else(|| {
                    crate::error::Error::Protocol("break-insert without number".into())
                })?
                .to_string();

            // GDB may move a breakpoint to the next executable line;
            // report where it actually landed
            let file = bkpt
                .get_str("fullname")
                .map(|f| masker.mask(f))
                .unwrap_or_else(|| breakpoint.file.clone());
            let line = bkpt.get_u32("line").unwrap_or(breakpoint.line);
            let placed = Breakpoint::new(file, line);

            self.shared.registry().record(number, placed.clone());
            self.shared
                .emit(DebugEvent::Breakpoint {
                    reason: BreakpointReason::New,
                    breakpoints: vec![placed],
                })
                .await;
        }
        Ok(())
    }

    async fn remove_breakpoints(&self, breakpoints: Vec<Breakpoint>) -> Result<()> {
        for breakpoint in breakpoints {
            let number = self
                .shared
                .registry()
                .number_for(&breakpoint)
                .map(str::to_string)
                .ok_or_else(|| Error::BreakpointNotFound {
                    file: breakpoint.file.clone(),
                    line: breakpoint.line,
                })?;

            self.shared
                .broker
                .send_request(MiCommand::new(BREAK_DELETE).arg(&number))
                .await?;
            self.shared.registry().remove(&number);
            self.shared
                .emit(DebugEvent::Breakpoint {
                    reason: BreakpointReason::Removed,
                    breakpoints: vec![breakpoint],
                })
                .await;
        }
        Ok(())
    }

    async fn get_stack_trace(&self) -> Result<Vec<StackFrame>> {
        self.fail_if_running().await?;
        let masker = self.masker().await?;

        let reply = self
            .shared
            .broker
            .send_request(MiCommand::new(STACK_LIST_FRAMES))
            .await?;

        let mut frames = Vec::new();
        for frame in reply.payload.get_list("stack").unwrap_or(&[]) {
            let fullname = match frame.get_str("fullname") {
                Some(f) => f,
                None => continue,
            };
            // Runtime frames below main are not part of the user's program
            if !masker.is_inside(fullname) {
                continue;
            }
            frames.push(StackFrame {
                id: frame.get_u32("level").unwrap_or(0),
                name: frame.get_str("func").unwrap_or("??").to_string(),
                path: masker.mask(fullname),
                line: frame.get_u32("line").unwrap_or(0),
            });
        }
        Ok(frames)
    }

    async fn get_frame_variables(&self, frame_id: u32) -> Result<Vec<Variable>> {
        self.fail_if_running().await?;
        let thread = self.current_thread().await?;

        let reply = self
            .shared
            .broker
            .send_request(
                MiCommand::new(STACK_LIST_VARIABLES)
                    .arg("--thread")
                    .arg(thread)
                    .arg("--frame")
                    .arg(frame_id.to_string())
                    .arg("2"),
            )
            .await?;

        let mut variables = Vec::new();
        for local in reply.payload.get_list("variables").unwrap_or(&[]) {
            let name = match local.get_str("name") {
                Some(name) => name.to_string(),
                None => continue,
            };
            let var_type = local.get_str("type").unwrap_or("").to_string();
            match local.get_str("value") {
                None => {
                    // No simple value means a compound local
                    variables.push(Variable {
                        reference: Some(VariableRef::frame(frame_id, name.clone()).encode()),
                        name,
                        var_type,
                        value: String::new(),
                    });
                }
                Some(value) => {
                    let reference = pointer_target(&var_type, value)
                        .map(|address| VariableRef::pointer(var_type.clone(), address, "").encode());
                    variables.push(Variable {
                        name,
                        var_type,
                        value: value.to_string(),
                        reference,
                    });
                }
            }
        }
        Ok(variables)
    }

    async fn get_variables(&self, reference: &str) -> Result<Vec<Variable>> {
        self.fail_if_running().await?;

        match VariableRef::decode(reference)? {
            VariableRef::FrameScoped {
                frame_id,
                expression,
            } => {
                self.shared
                    .broker
                    .send_request(MiCommand::new(STACK_SELECT_FRAME).arg(frame_id.to_string()))
                    .await?;

                self.create_scratch(&expression).await?;
                let children = self
                    .list_scratch_children(&ChildScope::Frame {
                        frame_id,
                        parent: expression.clone(),
                    })
                    .await;
                self.delete_scratch().await;
                Ok(children?)
            }
            VariableRef::PointerScoped {
                pointer_type,
                address,
                expression,
            } => {
                // Pointees are addressed by value, not by frame: the cast
                // stays valid after the originating frame is gone
                let base = format!("(*({}){:#x})", pointer_type, address);
                let full = format!("{}{}", base, expression);

                let create = self.create_scratch(&full).await?;
                let numchild = create.payload.get_u32("numchild").unwrap_or(0);
                if numchild == 0 {
                    // Scalar pointee: present it as the single value behind
                    // the pointer
                    let variable = Variable {
                        name: "*".to_string(),
                        var_type: create.payload.get_str("type").unwrap_or("").to_string(),
                        value: create.payload.get_str("value").unwrap_or("").to_string(),
                        reference: None,
                    };
                    self.delete_scratch().await;
                    return Ok(vec![variable]);
                }

                let children = self
                    .list_scratch_children(&ChildScope::Pointer {
                        pointer_type,
                        address,
                        parent: expression,
                    })
                    .await;
                self.delete_scratch().await;
                Ok(children?)
            }
        }
    }

    async fn terminate(&self) -> Result<()> {
        {
            let mut state = self.shared.state.lock().await;
            if *state == DebugState::Terminated {
                return Ok(());
            }
            *state = DebugState::Terminated;
        }
        info!("Terminating debug session");

        if let Some(task) = self.output_task.lock().await.take() {
            task.abort();
        }

        // Best effort: the process may already be gone
        let _ = self
            .shared
            .broker
            .send_request(MiCommand::new(EXEC_INTERRUPT))
            .await;
        self.shared.broker.send_exit().await;

        if let Some(mut child) = self.process.lock().await.take() {
            match child.kill().await {
                Ok(()) => debug!("GDB process killed"),
                Err(e) => warn!(error = %e, "Failed to kill GDB process"),
            }
        }

        self.shared.registry().clear();
        self.shared.guard.reset();
        *self.shared.running.write().await = false;

        self.shared.emit(DebugEvent::Terminated).await;
        Ok(())
    }
}

impl Drop for GdbAdapter {
    fn drop(&mut self) {
        if let Some(task) = self.notify_task.try_lock().ok().and_then(|mut t| t.take()) {
            task.abort();
        }
        if let Some(task) = self.output_task.try_lock().ok().and_then(|mut t| t.take()) {
            task.abort();
        }
        // Best-effort since we cannot await in Drop
        if let Some(mut child) = self.process.try_lock().ok().and_then(|mut p| p.take()) {
            let _ = child.start_kill();
        }
    }
}
