//! Translation of GDB's out-of-band records into debug events
//!
//! The broker serializes every async record onto one channel; this loop
//! consumes it in order, keeps the running flag and step guard in sync,
//! and emits client-facing events.

use super::adapter::{AdapterShared, DebugState};
use crate::constants::{
    EXEC_FINISH, REASON_BREAKPOINT_HIT, REASON_END_STEPPING_RANGE, REASON_EXITED,
    REASON_EXITED_NORMALLY, REASON_FUNCTION_FINISHED,
};
use crate::mi::{MiCommand, MiRecord, MiValue};
use remotedbg_core::{DebugEvent, StopReason};
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub(super) async fn notification_loop(
    shared: Arc<AdapterShared>,
    mut records: tokio::sync::mpsc::Receiver<MiRecord>,
) {
    while let Some(record) = records.recv().await {
        match record {
            MiRecord::ExecAsync { class, payload, .. } => match class.as_str() {
                "stopped" => handle_stopped(&shared, &payload).await,
                "running" => handle_running(&shared).await,
                other => trace!(class = other, "Ignoring exec-async record"),
            },
            MiRecord::Target(output) => {
                shared.emit(DebugEvent::Output { output }).await;
            }
            MiRecord::Notify { class, .. } => trace!(class, "Ignoring notify record"),
            MiRecord::Status { class, .. } => trace!(class, "Ignoring status record"),
            other => trace!(?other, "Unexpected record on notification channel"),
        }
    }
    debug!("Notification loop finished");
}

/// Source location of the stop, from the `frame` result
fn stop_frame(payload: &MiValue) -> Option<(&str, u32)> {
    let frame = payload.get("frame")?;
    Some((frame.get_str("fullname")?, frame.get_u32("line")?))
}

async fn handle_stopped(shared: &Arc<AdapterShared>, payload: &MiValue) {
    // The flag clears before any event goes out, so a client reacting to
    // the stop can immediately inspect state
    *shared.running.write().await = false;

    let reason = payload.get_str("reason").unwrap_or("");
    match reason {
        REASON_BREAKPOINT_HIT => {
            let masker = shared.masker.read().await.clone();
            match (stop_frame(payload), masker) {
                (Some((fullname, line)), Some(masker)) => {
                    shared
                        .emit(DebugEvent::Stopped {
                            reason: StopReason::Breakpoint,
                            file: masker.mask(fullname),
                            line,
                        })
                        .await;
                }
                _ => warn!("Breakpoint stop without a usable frame"),
            }
        }
        REASON_END_STEPPING_RANGE | REASON_FUNCTION_FINISHED => {
            handle_step_stop(shared, payload).await;
        }
        REASON_EXITED_NORMALLY => {
            shared.set_state(DebugState::Exited).await;
            shared.emit(DebugEvent::Exited { exit_code: 0 }).await;
        }
        REASON_EXITED => {
            // GDB reports the code in octal
            let exit_code = payload
                .get_str("exit-code")
                .and_then(|s| i32::from_str_radix(s, 8).ok())
                .unwrap_or(0);
            shared.set_state(DebugState::Exited).await;
            shared.emit(DebugEvent::Exited { exit_code }).await;
        }
        other => debug!(reason = other, "Unhandled stop reason"),
    }
}

/// A step landed somewhere. Inside the workspace it is a regular stop;
/// outside (libc, compiler runtime) the adapter silently steps back out
/// and arms the guard so the resulting `*running` stays invisible.
async fn handle_step_stop(shared: &Arc<AdapterShared>, payload: &MiValue) {
    let masker = shared.masker.read().await.clone();
    let (fullname, line) = match stop_frame(payload) {
        Some(frame) => frame,
        None => {
            warn!("Step stop without a usable frame");
            return;
        }
    };
    let masker = match masker {
        Some(masker) => masker,
        None => {
            warn!("Step stop before launch completed");
            return;
        }
    };

    if masker.is_inside(fullname) {
        shared
            .emit(DebugEvent::Stopped {
                reason: StopReason::Step,
                file: masker.mask(fullname),
                line,
            })
            .await;
    } else {
        debug!(location = fullname, "Step left the workspace, stepping out");
        shared.guard.arm();
        // A rejected step-out (outermost frame) produces no `*running`;
        // the correction must be withdrawn or it would swallow the next
        // genuine one
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            if let Err(e) = shared.broker.send_request(MiCommand::new(EXEC_FINISH)).await {
                warn!(error = %e, "Step-out correction rejected");
                shared.guard.disarm();
            }
        });
    }
}

async fn handle_running(shared: &Arc<AdapterShared>) {
    if shared.guard.consume() {
        debug!("Suppressing running notification for step-out correction");
        return;
    }
    *shared.running.write().await = true;
    shared.emit(DebugEvent::Continued).await;
}
