//! Session registry
//!
//! Maps user keys to live debug sessions. An explicit service object owned
//! by the composition root; nothing here is process-global.

use crate::ports::DebuggerFactory;
use crate::session::DebugSession;
use remotedbg_config::AdapterTimeouts;
use remotedbg_core::{DebugEvent, Error, Language, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Registry of live debug sessions, one per user key
pub struct SessionRegistry {
    factory: Arc<dyn DebuggerFactory>,
    timeouts: AdapterTimeouts,
    sessions: RwLock<HashMap<String, Arc<DebugSession>>>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn DebuggerFactory>, timeouts: AdapterTimeouts) -> Self {
        Self {
            factory,
            timeouts,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session for `key`, replacing (and tearing down) any
    /// existing session with the same key
    pub async fn create(&self, key: &str, language: Language) -> Result<Arc<DebugSession>> {
        if self.sessions.read().await.contains_key(key) {
            info!(key, "Replacing existing debug session");
            self.destroy(key).await?;
        }

        let (events_tx, events_rx) = mpsc::channel::<DebugEvent>(self.timeouts.event_channel_capacity);
        let debugger = self.factory.create(language, events_tx).await?;
        let session = Arc::new(DebugSession::new(key, language, debugger, events_rx));

        self.sessions
            .write()
            .await
            .insert(key.to_string(), Arc::clone(&session));
        info!(key, language = %language, "Debug session created");
        Ok(session)
    }

    /// Look up the session for `key`
    pub async fn get(&self, key: &str) -> Result<Arc<DebugSession>> {
        self.sessions
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))
    }

    /// Tear down and remove the session for `key`
    ///
    /// The session is removed from the map before termination so no new
    /// operation can reach a half-dead debugger. Termination is retried
    /// a configured number of times; the last error is returned if every
    /// attempt fails.
    pub async fn destroy(&self, key: &str) -> Result<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(key)
            .ok_or_else(|| Error::SessionNotFound(key.to_string()))?;

        let attempts = self.timeouts.terminate_retries.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match session.debugger().terminate().await {
                Ok(()) => {
                    debug!(key, attempt, "Debug session terminated");
                    return Ok(());
                }
                Err(e) => {
                    warn!(key, attempt, error = %e, "Terminate failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::adapter("terminate failed")))
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Tear down every session. Used on service shutdown; failures are
    /// logged and the sweep continues.
    pub async fn shutdown(&self) {
        let keys: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        for key in keys {
            if let Err(e) = self.destroy(&key).await {
                warn!(key, error = %e, "Failed to destroy session during shutdown");
            }
        }
    }
}
