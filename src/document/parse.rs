//! Position-aware content parsing
//!
//! `serde_json` does not report where a value sits in its source text, so
//! JSON content is read by a small recursive-descent reader that records a
//! [`SourceLocation`] for every value. Scalar tokens are still decoded by
//! `serde_json` so escape and number handling match it exactly.

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::{pointer_push, ValueTree};
use crate::diagnostics::SourceLocation;
use crate::error::{Result, SchemaError};

/// Nesting limit, matching serde_json's default recursion limit
const MAX_DEPTH: usize = 128;

/// Parse JSON content, recording line/column information for every value
pub fn parse_json(file: &str, text: &str) -> Result<ValueTree> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = Reader {
        file,
        text,
        bytes: text.as_bytes(),
        pos: 0,
        line: 1,
        column: 1,
        depth: 0,
        locations: HashMap::new(),
    };

    reader.skip_whitespace();
    let root = reader.value(String::new())?;
    reader.skip_whitespace();
    if reader.pos < reader.bytes.len() {
        return Err(reader.error("trailing characters after JSON value"));
    }

    Ok(ValueTree::with_locations(file, root, reader.locations))
}

/// Parse YAML content. Positions are not tracked; every value reports the
/// file-level location.
pub fn parse_yaml(file: &str, text: &str) -> Result<ValueTree> {
    let root: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(text).map_err(|e| SchemaError::ContentParse {
            file: file.to_string(),
            reason: e.to_string(),
        })?
    };
    Ok(ValueTree::new(file, root))
}

struct Reader<'a> {
    file: &'a str,
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    depth: usize,
    locations: HashMap<String, SourceLocation>,
}

impl<'a> Reader<'a> {
    fn error(&self, reason: &str) -> SchemaError {
        SchemaError::ContentParse {
            file: self.file.to_string(),
            reason: format!("line {} column {}: {}", self.line, self.column, reason),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) {
        let Some(byte) = self.peek() else { return };
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if byte & 0xC0 != 0x80 {
            // count codepoints, not continuation bytes
            self.column += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.bump();
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn value(&mut self, pointer: String) -> Result<Value> {
        let (line, column) = (self.line, self.column);

        let value = match self.peek() {
            Some(b'{') => self.object(&pointer)?,
            Some(b'[') => self.array(&pointer)?,
            Some(b'"') => Value::String(self.string()?),
            Some(b't') => self.literal("true", Value::Bool(true))?,
            Some(b'f') => self.literal("false", Value::Bool(false))?,
            Some(b'n') => self.literal("null", Value::Null)?,
            Some(b'-' | b'0'..=b'9') => self.number()?,
            Some(_) => return Err(self.error("unexpected character")),
            None => return Err(self.error("unexpected end of input")),
        };

        self.locations.insert(
            pointer,
            SourceLocation::new(self.file, line, column, self.line, self.column),
        );
        Ok(value)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("recursion limit exceeded"));
        }
        Ok(())
    }

    fn object(&mut self, pointer: &str) -> Result<Value> {
        self.enter()?;
        self.expect(b'{')?;
        let mut map = Map::new();

        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.bump();
            self.depth -= 1;
            return Ok(Value::Object(map));
        }

        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                return Err(self.error("expected object key"));
            }
            let key = self.string()?;
            self.skip_whitespace();
            self.expect(b':')?;
            self.skip_whitespace();
            let child = self.value(pointer_push(pointer, &key))?;
            map.insert(key, child);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.bump(),
                Some(b'}') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }

        self.depth -= 1;
        Ok(Value::Object(map))
    }

    fn array(&mut self, pointer: &str) -> Result<Value> {
        self.enter()?;
        self.expect(b'[')?;
        let mut items = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.bump();
            self.depth -= 1;
            return Ok(Value::Array(items));
        }

        loop {
            self.skip_whitespace();
            let child = self.value(pointer_push(pointer, &items.len().to_string()))?;
            items.push(child);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.bump(),
                Some(b']') => {
                    self.bump();
                    break;
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }

        self.depth -= 1;
        Ok(Value::Array(items))
    }

    fn string(&mut self) -> Result<String> {
        let start = self.pos;
        self.expect(b'"')?;
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(b'\n') | None => return Err(self.error("unterminated string")),
                Some(_) => self.bump(),
            }
        }
        serde_json::from_str(&self.text[start..self.pos]).map_err(|e| self.error(&e.to_string()))
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        while let Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9') = self.peek() {
            self.bump();
        }
        match serde_json::from_str::<Value>(&self.text[start..self.pos]) {
            Ok(value @ Value::Number(_)) => Ok(value),
            _ => Err(self.error("invalid number")),
        }
    }

    fn literal(&mut self, word: &str, value: Value) -> Result<Value> {
        if self.text[self.pos..].starts_with(word) {
            for _ in 0..word.len() {
                self.bump();
            }
            Ok(value)
        } else {
            Err(self.error("invalid literal"))
        }
    }
}
