//! Canned compile service
//!
//! Stands in for the real sandbox compiler in tests and demos: replies
//! with a fixed outcome without touching the filesystem.

use async_trait::async_trait;
use remotedbg_core::Result;
use remotedbg_session::{CompileOptions, CompileOutcome, CompileService};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

pub struct NullCompiler {
    outcome: CompileOutcome,
    calls: AtomicU32,
}

impl NullCompiler {
    /// A compiler that always reports success
    pub fn succeeding() -> Self {
        Self {
            outcome: CompileOutcome::success(),
            calls: AtomicU32::new(0),
        }
    }

    /// A compiler that always reports the given diagnostic
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: CompileOutcome::failure(message),
            calls: AtomicU32::new(0),
        }
    }

    /// How many compiles were requested
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompileService for NullCompiler {
    async fn compile(
        &self,
        _sources: &[PathBuf],
        _output: &Path,
        _options: &CompileOptions,
    ) -> Result<CompileOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome.clone())
    }
}
