//! Diagnostics
//!
//! Content errors produced while validating or transforming a document.
//! They are always collected and returned as data: one bad field never
//! aborts the rest of the walk.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Error Codes
// =============================================================================

/// Stable error codes emitted by the validator and transformer.
///
/// The string form is what `overwriteErrors` tables target, so it must never
/// change once published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Type ===
    /// Value kind is not one of the declared kinds
    UnexpectedType,
    /// Value was matched against a `false` schema
    BooleanSchemaFailed,

    // === Scalars ===
    /// Value is not in `enum` / does not equal `const`
    InvalidValue,
    /// String codepoint length outside `minLength`/`maxLength`
    StringLengthInvalid,
    /// String does not match `pattern`
    PatternMismatch,
    /// String does not satisfy the named `format`
    FormatInvalid,
    /// String does not parse against `dateFormat`
    DateFormatInvalid,
    /// Parsed date falls outside the relative date window
    DateOutOfRange,
    /// Number outside `minimum`/`maximum` bounds
    NumberInvalid,

    // === Arrays ===
    /// Item count outside `minItems`/`maxItems`
    ArrayLengthInvalid,
    /// `uniqueItems` violated
    ArrayNotUnique,

    // === Objects ===
    /// Required property is missing
    MissingAttribute,
    /// A dependency or enum dependency partner is missing
    MissingPairedAttribute,
    /// None of an `either` group is present
    MissingEitherAttribute,
    /// More than one of a `precludes` group is present
    PrecludedAttributes,
    /// Value not allowed by an `enumDependencies` entry
    InvalidPairedAttribute,
    /// Key not allowed by `additionalProperties: false`
    UnknownField,
    /// Property count outside `minProperties`/`maxProperties`
    PropertyCountInvalid,

    // === Annotations ===
    /// Property is deprecated via `replacedBy`
    AttributeDeprecated,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnexpectedType => "UnexpectedType",
            Self::BooleanSchemaFailed => "BooleanSchemaFailed",
            Self::InvalidValue => "InvalidValue",
            Self::StringLengthInvalid => "StringLengthInvalid",
            Self::PatternMismatch => "PatternMismatch",
            Self::FormatInvalid => "FormatInvalid",
            Self::DateFormatInvalid => "DateFormatInvalid",
            Self::DateOutOfRange => "DateOutOfRange",
            Self::NumberInvalid => "NumberInvalid",
            Self::ArrayLengthInvalid => "ArrayLengthInvalid",
            Self::ArrayNotUnique => "ArrayNotUnique",
            Self::MissingAttribute => "MissingAttribute",
            Self::MissingPairedAttribute => "MissingPairedAttribute",
            Self::MissingEitherAttribute => "MissingEitherAttribute",
            Self::PrecludedAttributes => "PrecludedAttributes",
            Self::InvalidPairedAttribute => "InvalidPairedAttribute",
            Self::UnknownField => "UnknownField",
            Self::PropertyCountInvalid => "PropertyCountInvalid",
            Self::AttributeDeprecated => "AttributeDeprecated",
        }
    }

    /// Default severity before any override applies
    pub fn severity(&self) -> Severity {
        match self {
            Self::AttributeDeprecated | Self::DateOutOfRange | Self::UnknownField => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Suggestion,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Suggestion => write!(f, "suggestion"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Source Location
// =============================================================================

/// Where a value came from. Line and column are 1-based; `0` means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SourceLocation {
    /// Location covering a whole file, used when positions are unavailable
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn new(file: impl Into<String>, line: u32, column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            end_line,
            end_column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}({},{})", self.file, self.line, self.column)
        }
    }
}

// =============================================================================
// Content Error
// =============================================================================

/// A single content error, as surfaced to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentError {
    pub severity: Severity,
    /// Stable code; usually an [`ErrorCode`] string, but collaborators and
    /// overrides may supply their own
    pub code: String,
    pub message: String,
    #[serde(flatten)]
    pub location: SourceLocation,
    /// Property name used for `overwriteErrors` lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

impl ContentError {
    pub fn new(code: ErrorCode, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            severity: code.severity(),
            code: code.as_str().to_string(),
            message: message.into(),
            location,
            property: None,
        }
    }

    /// Error with a free-form code, as reported by collaborators
    pub fn custom(
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            location,
            property: None,
        }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code, self.severity, self.message, self.location
        )
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of content errors for one or more documents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<ContentError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ContentError) {
        self.items.push(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = ContentError>) {
        self.items.extend(items);
    }

    /// Check if there are any error-severity items
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(ContentError::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ContentError> {
        self.items.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ContentError> {
        self.items.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Info and suggestion items
    pub fn notes(&self) -> impl Iterator<Item = &ContentError> {
        self.items
            .iter()
            .filter(|i| matches!(i.severity, Severity::Info | Severity::Suggestion))
    }

    pub fn all(&self) -> &[ContentError] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn note_count(&self) -> usize {
        self.notes().count()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Keep at most `max` items, most severe first, stable otherwise
    pub fn truncate(&mut self, max: usize) {
        self.items.sort_by(|a, b| b.severity.cmp(&a.severity));
        self.items.truncate(max);
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s), {} note(s)\n",
                self.error_count(),
                self.warning_count(),
                self.note_count()
            ));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl From<Vec<ContentError>> for Diagnostics {
    fn from(items: Vec<ContentError>) -> Self {
        Self { items }
    }
}

impl IntoIterator for Diagnostics {
    type Item = ContentError;
    type IntoIter = std::vec::IntoIter<ContentError>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a ContentError;
    type IntoIter = std::slice::Iter<'a, ContentError>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
