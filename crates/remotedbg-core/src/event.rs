//! Debug events streamed to clients
//!
//! Every asynchronous occurrence in a session (compile finished, debuggee
//! stopped, output produced, ...) is delivered as one of these, in the order
//! it happened. The presentation layer forwards them as tagged JSON.

use crate::entities::Breakpoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the debuggee stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    Breakpoint,
    Step,
}

/// What changed about the breakpoint set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointReason {
    New,
    Removed,
    Changed,
}

/// An event emitted by a debug session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DebugEvent {
    /// Compilation of the submitted sources finished
    #[serde(rename_all = "camelCase")]
    Compile { success: bool, message: String },

    /// Debug symbols were loaded and the session is ready to run
    #[serde(rename_all = "camelCase")]
    Launch { success: bool, message: String },

    /// The breakpoint set changed
    #[serde(rename_all = "camelCase")]
    Breakpoint {
        reason: BreakpointReason,
        breakpoints: Vec<Breakpoint>,
    },

    /// The debuggee wrote to its terminal
    #[serde(rename_all = "camelCase")]
    Output { output: String },

    /// The debuggee stopped at a source location (masked path)
    #[serde(rename_all = "camelCase")]
    Stopped {
        reason: StopReason,
        file: String,
        line: u32,
    },

    /// The debuggee resumed execution
    Continued,

    /// The debuggee exited
    #[serde(rename_all = "camelCase")]
    Exited { exit_code: i32 },

    /// The session was torn down
    Terminated,
}

impl DebugEvent {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Compile { .. } => "compile",
            Self::Launch { .. } => "launch",
            Self::Breakpoint { .. } => "breakpoint",
            Self::Output { .. } => "output",
            Self::Stopped { .. } => "stopped",
            Self::Continued => "continued",
            Self::Exited { .. } => "exited",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for DebugEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped { reason, file, line } => {
                write!(f, "stopped ({:?}) at {}:{}", reason, file, line)
            }
            Self::Exited { exit_code } => write!(f, "exited with code {}", exit_code),
            other => write!(f, "{}", other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_event_tagged_json() {
        let event = DebugEvent::Stopped {
            reason: StopReason::Breakpoint,
            file: "/main.c".to_string(),
            line: 10,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "stopped");
        assert_eq!(json["reason"], "breakpoint");
        assert_eq!(json["file"], "/main.c");
        assert_eq!(json["line"], 10);
    }

    #[test]
    fn unit_variants_round_trip() {
        for event in [DebugEvent::Continued, DebugEvent::Terminated] {
            let json = serde_json::to_string(&event).unwrap();
            let back: DebugEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }

    #[test]
    fn breakpoint_event_carries_locations() {
        let event = DebugEvent::Breakpoint {
            reason: BreakpointReason::New,
            breakpoints: vec![Breakpoint::new("/main.c", 3)],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["reason"], "new");
        assert_eq!(json["breakpoints"][0]["line"], 3);
    }
}
