//! Variable reference tokens
//!
//! Expandable variables carry an opaque token that clients return verbatim
//! to fetch children. The token is versioned and escape-safe so expressions
//! containing the separator (C++ template names, scoped types) survive a
//! round trip losslessly.
//!
//! Wire forms:
//!   `v1:f:<frame_id>:<expression>` for frame-scoped references
//!   `v1:p:<pointer_type>:<address>:<expression>` for pointer-scoped ones

use crate::error::{Error, Result};
use std::fmt;

const VERSION: &str = "v1";
const SEP: char = ':';
const ESC: char = '\\';

/// A decoded variable reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableRef {
    /// A variable reachable from a stack frame by expression
    FrameScoped { frame_id: u32, expression: String },
    /// A value reached by dereferencing a raw pointer, independent of any
    /// frame; `expression` is the member path below the dereferenced value
    /// (empty for the pointee itself)
    PointerScoped {
        pointer_type: String,
        address: u64,
        expression: String,
    },
}

impl VariableRef {
    pub fn frame(frame_id: u32, expression: impl Into<String>) -> Self {
        Self::FrameScoped {
            frame_id,
            expression: expression.into(),
        }
    }

    pub fn pointer(pointer_type: impl Into<String>, address: u64, expression: impl Into<String>) -> Self {
        Self::PointerScoped {
            pointer_type: pointer_type.into(),
            address,
            expression: expression.into(),
        }
    }

    /// Encode into the wire token
    pub fn encode(&self) -> String {
        match self {
            Self::FrameScoped {
                frame_id,
                expression,
            } => format!("{VERSION}:f:{}:{}", frame_id, escape(expression)),
            Self::PointerScoped {
                pointer_type,
                address,
                expression,
            } => format!(
                "{VERSION}:p:{}:{:#x}:{}",
                escape(pointer_type),
                address,
                escape(expression)
            ),
        }
    }

    /// Decode a wire token produced by [`encode`](Self::encode)
    pub fn decode(token: &str) -> Result<Self> {
        let bad = || Error::InvalidReference(token.to_string());

        let fields = split_escaped(token);
        match fields.as_slice() {
            [version, kind, frame_id, expression] if version == VERSION && kind == "f" => {
                let frame_id = frame_id.parse::<u32>().map_err(|_| bad())?;
                Ok(Self::FrameScoped {
                    frame_id,
                    expression: expression.clone(),
                })
            }
            [version, kind, pointer_type, address, expression]
                if version == VERSION && kind == "p" =>
            {
                let raw = address.strip_prefix("0x").ok_or_else(bad)?;
                let address = u64::from_str_radix(raw, 16).map_err(|_| bad())?;
                Ok(Self::PointerScoped {
                    pointer_type: pointer_type.clone(),
                    address,
                    expression: expression.clone(),
                })
            }
            _ => Err(bad()),
        }
    }
}

impl fmt::Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == SEP || c == ESC {
            out.push(ESC);
        }
        out.push(c);
    }
    out
}

/// Split on unescaped separators, unescaping each field
fn split_escaped(s: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            c if c == ESC => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c == SEP => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}
