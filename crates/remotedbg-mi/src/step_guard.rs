//! Step-out correction guard
//!
//! When a step lands in code outside the workspace (libc, compiler
//! runtime), the adapter silently issues a step-out to bring execution
//! back into user code. Each such correction must swallow exactly one
//! `*running` notification (and its ContinuedEvent) so clients never
//! observe the detour.
//!
//! Corrections are explicit records in a queue rather than a bare counter:
//! consuming from an empty queue is a no-op, so a late or duplicate
//! `*running` can never drive the state negative, and pipelined step
//! requests each suppress exactly one notification.

use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CorrectionState {
    /// Step-out issued; the matching `*running` has not been seen yet
    AwaitingRunning,
}

#[derive(Debug, Default)]
pub struct StepGuard {
    corrections: Mutex<VecDeque<CorrectionState>>,
}

impl StepGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm one correction; called right after issuing the silent step-out
    pub fn arm(&self) {
        let mut corrections = self.corrections.lock().unwrap_or_else(|e| e.into_inner());
        corrections.push_back(CorrectionState::AwaitingRunning);
    }

    /// Called for every `*running` notification. Returns true when the
    /// notification belongs to a pending correction and must be suppressed.
    pub fn consume(&self) -> bool {
        let mut corrections = self.corrections.lock().unwrap_or_else(|e| e.into_inner());
        corrections.pop_front().is_some()
    }

    /// Withdraw the most recently armed correction. Called when the
    /// step-out it matched was rejected, so no `*running` will ever
    /// arrive for it.
    pub fn disarm(&self) {
        let mut corrections = self.corrections.lock().unwrap_or_else(|e| e.into_inner());
        corrections.pop_back();
    }

    /// Number of corrections not yet matched by a `*running`
    pub fn pending(&self) -> usize {
        self.corrections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Forget all pending corrections (session teardown)
    pub fn reset(&self) {
        self.corrections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
