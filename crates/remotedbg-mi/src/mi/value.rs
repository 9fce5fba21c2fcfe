//! MI result values
//!
//! Grammar (from the GDB/MI output syntax):
//!
//! ```text
//! value  -> const | tuple | list
//! const  -> c-string
//! tuple  -> "{}" | "{" result ("," result)* "}"
//! list   -> "[]" | "[" value ("," value)* "]"
//!         |  "[" result ("," result)* "]"
//! result -> variable "=" value
//! ```

use crate::error::{Error, Result};
use std::collections::HashMap;

/// A parsed MI value
#[derive(Debug, Clone, PartialEq)]
pub enum MiValue {
    /// A c-string constant, unescaped
    Const(String),
    /// A `{name=value,...}` tuple
    Tuple(HashMap<String, MiValue>),
    /// A `[...]` list. Named elements (`frame={...}`) keep only the value;
    /// the repeated element name carries no information.
    List(Vec<MiValue>),
}

impl MiValue {
    /// The string payload, if this is a constant
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Const(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&HashMap<String, MiValue>> {
        match self {
            Self::Tuple(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MiValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a field of a tuple
    pub fn get(&self, name: &str) -> Option<&MiValue> {
        self.as_tuple().and_then(|map| map.get(name))
    }

    /// String field of a tuple
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(MiValue::as_str)
    }

    /// Numeric field of a tuple (MI sends all numbers as strings)
    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.get_str(name).and_then(|s| s.parse().ok())
    }

    pub fn get_list(&self, name: &str) -> Option<&[MiValue]> {
        self.get(name).and_then(MiValue::as_list)
    }

    /// String field that must be present
    pub fn expect_str(&self, name: &str) -> Result<&str> {
        self.get_str(name)
            .ok_or_else(|| Error::Protocol(format!("missing field '{}'", name)))
    }

    /// Numeric field that must be present
    pub fn expect_u32(&self, name: &str) -> Result<u32> {
        self.get_u32(name)
            .ok_or_else(|| Error::Protocol(format!("missing numeric field '{}'", name)))
    }
}

/// Cursor over one MI line
pub(crate) struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    pub(crate) fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub(crate) fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self, msg: &str) -> Error {
        Error::Parse(format!("{} at offset {}", msg, self.pos))
    }

    /// An MI variable name: letters, digits, `-`, `_`
    pub(crate) fn ident(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        // Structure bytes are ASCII; the slice is valid UTF-8
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    /// A `"..."` constant with backslash escapes
    pub(crate) fn c_string(&mut self) -> Result<String> {
        if !self.eat(b'"') {
            return Err(self.error("expected '\"'"));
        }
        let mut out = Vec::new();
        loop {
            match self.bump() {
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b'"') => out.push(b'"'),
                    Some(b'\\') => out.push(b'\\'),
                    Some(other) => {
                        // Unrecognized escape, keep it verbatim
                        out.push(b'\\');
                        out.push(other);
                    }
                    None => return Err(self.error("unterminated escape")),
                },
                Some(b) => out.push(b),
                None => return Err(self.error("unterminated c-string")),
            }
        }
        String::from_utf8(out).map_err(|e| Error::Parse(format!("invalid UTF-8: {}", e)))
    }

    /// value -> const | tuple | list
    pub(crate) fn value(&mut self) -> Result<MiValue> {
        match self.peek() {
            Some(b'"') => Ok(MiValue::Const(self.c_string()?)),
            Some(b'{') => self.tuple(),
            Some(b'[') => self.list(),
            _ => Err(self.error("expected value")),
        }
    }

    fn tuple(&mut self) -> Result<MiValue> {
        self.eat(b'{');
        let mut map = HashMap::new();
        if self.eat(b'}') {
            return Ok(MiValue::Tuple(map));
        }
        loop {
            let name = self.ident()?;
            if !self.eat(b'=') {
                return Err(self.error("expected '=' in tuple"));
            }
            map.insert(name, self.value()?);
            if self.eat(b'}') {
                return Ok(MiValue::Tuple(map));
            }
            if !self.eat(b',') {
                return Err(self.error("expected ',' or '}' in tuple"));
            }
        }
    }

    fn list(&mut self) -> Result<MiValue> {
        self.eat(b'[');
        let mut items = Vec::new();
        if self.eat(b']') {
            return Ok(MiValue::List(items));
        }
        loop {
            // A list element is either a bare value or `name=value`
            items.push(match self.peek() {
                Some(b'"') | Some(b'{') | Some(b'[') => self.value()?,
                _ => {
                    self.ident()?;
                    if !self.eat(b'=') {
                        return Err(self.error("expected '=' in list element"));
                    }
                    self.value()?
                }
            });
            if self.eat(b']') {
                return Ok(MiValue::List(items));
            }
            if !self.eat(b',') {
                return Err(self.error("expected ',' or ']' in list"));
            }
        }
    }

    /// results -> result ("," result)*, consumed to end of input
    pub(crate) fn results(&mut self) -> Result<HashMap<String, MiValue>> {
        let mut map = HashMap::new();
        loop {
            let name = self.ident()?;
            if !self.eat(b'=') {
                return Err(self.error("expected '=' in result"));
            }
            map.insert(name, self.value()?);
            if self.at_end() {
                return Ok(map);
            }
            if !self.eat(b',') {
                return Err(self.error("expected ',' between results"));
            }
        }
    }
}
