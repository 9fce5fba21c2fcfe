//! Process and terminal setup for real GDB sessions

use super::{GdbAdapter, InferiorIo};
use crate::error::{Error, Result};
use async_trait::async_trait;
use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt};
use remotedbg_config::DebugConfig;
use remotedbg_core::{DebugEvent, Language};
use remotedbg_session::{CompileService, DebuggerFactory, DebuggerRef};
use std::os::unix::io::{FromRawFd, IntoRawFd};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Allocate a pseudo-terminal for the debuggee
///
/// GDB gets the slave path via `-inferior-tty-set`; the adapter keeps both
/// halves of the master for output forwarding and console input.
fn open_inferior_tty() -> Result<(InferiorIo, String)> {
    let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY)
        .map_err(|e| Error::Process(format!("failed to open pty master: {}", e)))?;
    grantpt(&master).map_err(|e| Error::Process(format!("grantpt failed: {}", e)))?;
    unlockpt(&master).map_err(|e| Error::Process(format!("unlockpt failed: {}", e)))?;
    let slave = ptsname_r(&master)
        .map_err(|e| Error::Process(format!("failed to resolve pty slave: {}", e)))?;

    // PtyMaster owns the fd; hand it to a File for duplication
    let master = unsafe { std::fs::File::from_raw_fd(master.into_raw_fd()) };
    let writer = master
        .try_clone()
        .map_err(|e| Error::Process(format!("failed to clone pty master: {}", e)))?;

    let io = InferiorIo::new(
        tokio::fs::File::from_std(master),
        tokio::fs::File::from_std(writer),
    );
    Ok((io, slave))
}

impl GdbAdapter {
    /// Start a GDB process in MI mode and wire an adapter to it
    pub async fn spawn(
        gdb_path: &str,
        compiler: Arc<dyn CompileService>,
        events: mpsc::Sender<DebugEvent>,
        timeouts: remotedbg_config::AdapterTimeouts,
    ) -> Result<Self> {
        let (inferior, tty) = open_inferior_tty()?;

        let mut child = Command::new(gdb_path)
            .arg("--interpreter=mi")
            .arg("-quiet")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Process(format!("failed to spawn {}: {}", gdb_path, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Process("GDB stdout not captured".into()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Process("GDB stdin not captured".into()))?;
        info!(gdb_path, tty, "GDB process started");

        let mut adapter = Self::new(stdout, stdin, inferior, compiler, events, timeouts);
        adapter.attach_process(child, tty);
        Ok(adapter)
    }
}

/// Creates GDB-backed debuggers for the session registry
pub struct GdbDebuggerFactory {
    config: DebugConfig,
    compiler: Arc<dyn CompileService>,
}

impl GdbDebuggerFactory {
    pub fn new(config: DebugConfig, compiler: Arc<dyn CompileService>) -> Self {
        Self { config, compiler }
    }
}

#[async_trait]
impl DebuggerFactory for GdbDebuggerFactory {
    // C and C++ binaries are both driven by GDB; the language only
    // matters to the compile service
    async fn create(
        &self,
        language: Language,
        events: mpsc::Sender<DebugEvent>,
    ) -> remotedbg_core::Result<DebuggerRef> {
        debug!(%language, "Creating GDB debugger");
        let adapter = GdbAdapter::spawn(
            &self.config.gdb_path,
            Arc::clone(&self.compiler),
            events,
            self.config.timeouts.clone(),
        )
        .await?;
        Ok(Arc::new(adapter))
    }
}
