//! Content Documents
//!
//! A [`ValueTree`] is the JSON-like value being validated or transformed,
//! together with the file it came from and a JSON Pointer -> source
//! location map used for diagnostics.

pub mod parse;

pub use parse::{parse_json, parse_yaml};

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::diagnostics::SourceLocation;

/// Kind of a JSON value, as named by the schema `type` keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    /// Kind of a value. Integral numbers (including `1.0`) report `Integer`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    Self::Integer
                } else if n.as_f64().map(|f| f.fract() == 0.0 && f.is_finite()).unwrap_or(false) {
                    Self::Integer
                } else {
                    Self::Number
                }
            }
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "string" => Self::String,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escape one JSON Pointer reference token (`~` -> `~0`, `/` -> `~1`)
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Append a reference token to a JSON Pointer
pub fn pointer_push(pointer: &str, token: &str) -> String {
    let mut out = String::with_capacity(pointer.len() + token.len() + 1);
    out.push_str(pointer);
    out.push('/');
    out.push_str(&escape_token(token));
    out
}

/// A content document: value, owning file, and per-pointer locations
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTree {
    pub root: Value,
    pub file: String,
    locations: HashMap<String, SourceLocation>,
}

impl ValueTree {
    /// Wrap a value without position information
    pub fn new(file: impl Into<String>, root: Value) -> Self {
        Self {
            root,
            file: file.into(),
            locations: HashMap::new(),
        }
    }

    pub(crate) fn with_locations(
        file: impl Into<String>,
        root: Value,
        locations: HashMap<String, SourceLocation>,
    ) -> Self {
        Self {
            root,
            file: file.into(),
            locations,
        }
    }

    /// Location of the value at `pointer`, falling back to the nearest
    /// ancestor with a known position and finally to the file itself
    pub fn location(&self, pointer: &str) -> SourceLocation {
        let mut current = pointer;
        loop {
            if let Some(location) = self.locations.get(current) {
                return location.clone();
            }
            match current.rfind('/') {
                Some(index) => current = &current[..index],
                None => return SourceLocation::file(&self.file),
            }
        }
    }

    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.root.pointer(pointer)
    }

    pub fn get_mut(&mut self, pointer: &str) -> Option<&mut Value> {
        self.root.pointer_mut(pointer)
    }
}
