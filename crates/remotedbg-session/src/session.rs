//! A single debug session

use crate::ports::DebuggerRef;
use remotedbg_core::{DebugEvent, Language};
use tokio::sync::{mpsc, Mutex};

/// One live debug session: a debugger plus the receiving end of its
/// event channel
///
/// The receiver sits behind a mutex so the transport layer can poll events
/// from wherever it is convenient; events are strictly ordered regardless.
pub struct DebugSession {
    key: String,
    language: Language,
    debugger: DebuggerRef,
    events: Mutex<mpsc::Receiver<DebugEvent>>,
}

impl DebugSession {
    pub fn new(
        key: impl Into<String>,
        language: Language,
        debugger: DebuggerRef,
        events: mpsc::Receiver<DebugEvent>,
    ) -> Self {
        Self {
            key: key.into(),
            language,
            debugger,
            events: Mutex::new(events),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn debugger(&self) -> &DebuggerRef {
        &self.debugger
    }

    /// Next event from this session, or `None` once the debugger is gone
    /// and the channel has drained
    pub async fn next_event(&self) -> Option<DebugEvent> {
        self.events.lock().await.recv().await
    }
}

impl std::fmt::Debug for DebugSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("key", &self.key)
            .field("language", &self.language)
            .finish()
    }
}
