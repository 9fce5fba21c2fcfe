//! Entities shared between the session layer and the MI adapter
//!
//! Paths inside these types are always masked: the session workspace is the
//! virtual root `/` and clients never see the real sandbox location.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Language of the debugged program
///
/// Only languages GDB can debug natively are listed. The compile
/// collaborator dispatches on this when building the debug binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    /// Lowercase string representation for API/config usage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "c" => Ok(Self::C),
            "cpp" | "c++" => Ok(Self::Cpp),
            other => Err(crate::Error::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// A source breakpoint as clients see it: masked file path plus line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub file: String,
    pub line: u32,
}

impl Breakpoint {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One frame of a stack trace
///
/// `id` is the frame level as reported by the debugger (0 = innermost);
/// it stays valid until the debuggee resumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub id: u32,
    pub name: String,
    pub path: String,
    pub line: u32,
}

/// A named value visible in some scope
///
/// `reference` is set only when the variable can be expanded further
/// (a compound value or an inspectable pointer); clients pass it back
/// verbatim to fetch children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_parses_aliases() {
        assert_eq!("c".parse::<Language>().unwrap(), Language::C);
        assert_eq!("C++".parse::<Language>().unwrap(), Language::Cpp);
        assert_eq!("cpp".parse::<Language>().unwrap(), Language::Cpp);
        assert!("go".parse::<Language>().is_err());
    }

    #[test]
    fn breakpoint_serializes_camel_case() {
        let bp = Breakpoint::new("/main.c", 42);
        let json = serde_json::to_string(&bp).unwrap();
        assert_eq!(json, r#"{"file":"/main.c","line":42}"#);
    }

    #[test]
    fn variable_reference_omitted_when_absent() {
        let var = Variable {
            name: "x".to_string(),
            var_type: "int".to_string(),
            value: "7".to_string(),
            reference: None,
        };
        let json = serde_json::to_string(&var).unwrap();
        assert!(!json.contains("reference"));
        assert!(json.contains(r#""type":"int""#));
    }
}
