//! Error types for schema loading and resolution
//!
//! These are configuration errors: a schema that cannot be loaded or a
//! `$ref` that cannot be resolved aborts work against that schema.
//! Problems found in content documents are never reported through this
//! type; see [`crate::diagnostics::ContentError`].

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema configuration errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to parse schema {address}: {reason}")]
    Parse { address: String, reason: String },

    #[error("Invalid schema at {address}{pointer}: {reason}")]
    InvalidSchema {
        address: String,
        pointer: String,
        reason: String,
    },

    #[error("Invalid schema address '{0}'")]
    InvalidAddress(String),

    #[error("$ref target '{target}' not found (referenced from {from})")]
    UnresolvedRef { target: String, from: String },

    #[error("Schema document not found: {0}")]
    DocumentNotFound(String),

    #[error("Failed to parse content {file}: {reason}")]
    ContentParse { file: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn invalid(
        address: impl Into<String>,
        pointer: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSchema {
            address: address.into(),
            pointer: pointer.into(),
            reason: reason.into(),
        }
    }
}
