//! MI output records
//!
//! One record per line. The leading sigil decides the kind:
//!
//! ```text
//! [token] ^class[,results]   result record (reply to a command)
//! [token] *class,results     exec-async (stopped / running)
//!         =class[,results]   notify-async
//!         +class[,results]   status-async
//!         ~"text"            console stream
//!         @"text"            target stream
//!         &"text"            log stream
//!         (gdb)              ready prompt
//! ```

use super::value::{MiValue, Parser};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Class of a result record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

impl ResultClass {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "done" => Ok(Self::Done),
            // ^running is equivalent to ^done per the MI docs
            "running" => Ok(Self::Running),
            "connected" => Ok(Self::Connected),
            "error" => Ok(Self::Error),
            "exit" => Ok(Self::Exit),
            other => Err(Error::Parse(format!("unknown result class '{}'", other))),
        }
    }
}

/// A decoded MI output record
#[derive(Debug, Clone, PartialEq)]
pub enum MiRecord {
    /// Reply to a command, correlated by token
    Result {
        token: Option<u64>,
        class: ResultClass,
        payload: MiValue,
    },
    /// Execution state change (`*stopped`, `*running`)
    ExecAsync {
        token: Option<u64>,
        class: String,
        payload: MiValue,
    },
    /// Out-of-band notification (`=thread-created`, ...)
    Notify { class: String, payload: MiValue },
    /// Progress information (`+download`, ...)
    Status { class: String, payload: MiValue },
    /// GDB console output
    Console(String),
    /// Debuggee output routed through GDB
    Target(String),
    /// GDB internal log output
    Log(String),
    /// The `(gdb)` ready prompt
    Prompt,
}

impl MiRecord {
    /// Decode one MI output line (without the trailing newline)
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim_end() == "(gdb)" {
            return Ok(Self::Prompt);
        }

        let (token, rest) = split_token(line);
        let mut chars = rest.chars();
        match chars.next() {
            Some('^') => {
                let (class, payload) = class_and_payload(chars.as_str())?;
                Ok(Self::Result {
                    token,
                    class: ResultClass::parse(&class)?,
                    payload,
                })
            }
            Some('*') => {
                let (class, payload) = class_and_payload(chars.as_str())?;
                Ok(Self::ExecAsync {
                    token,
                    class,
                    payload,
                })
            }
            Some('=') => {
                let (class, payload) = class_and_payload(chars.as_str())?;
                Ok(Self::Notify { class, payload })
            }
            Some('+') => {
                let (class, payload) = class_and_payload(chars.as_str())?;
                Ok(Self::Status { class, payload })
            }
            Some('~') => Ok(Self::Console(stream_text(chars.as_str())?)),
            Some('@') => Ok(Self::Target(stream_text(chars.as_str())?)),
            Some('&') => Ok(Self::Log(stream_text(chars.as_str())?)),
            _ => Err(Error::Parse(format!("unrecognized record: {}", line))),
        }
    }
}

/// Strip an optional numeric token prefix
fn split_token(line: &str) -> (Option<u64>, &str) {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (None, line);
    }
    match line[..digits].parse() {
        Ok(token) => (Some(token), &line[digits..]),
        Err(_) => (None, line),
    }
}

/// `class[,results]` after the sigil
fn class_and_payload(rest: &str) -> Result<(String, MiValue)> {
    match rest.split_once(',') {
        Some((class, results)) => {
            let mut parser = Parser::new(results);
            Ok((class.to_string(), MiValue::Tuple(parser.results()?)))
        }
        None => Ok((rest.to_string(), MiValue::Tuple(HashMap::new()))),
    }
}

/// The c-string body of a stream record
fn stream_text(rest: &str) -> Result<String> {
    Parser::new(rest).c_string()
}
