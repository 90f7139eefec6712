//! Content Schema Engine
//!
//! Schema-driven validation and content transformation for documentation
//! builds. A JSON schema describes the shape of a content document and
//! annotates which string fields are links, markdown, HTML or
//! cross-references.
//!
//! ## Features
//!
//! - **Reference Graph**: `$id`/`$ref` resolution within and across schema
//!   documents, memoized and cycle-safe
//! - **Validation**: structural and semantic rules with stable error codes
//! - **Error Overrides**: per-property `overwriteErrors` tables restyle errors
//! - **Transformation**: `contentType` leaves rewritten through host
//!   collaborators, eagerly or as deferred values
//!
//! ## Architecture
//!
//! ```text
//! schema::loader ──► schema::resolver ──┬──► validate
//!                                       └──► transform
//! ```

pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod schema;
pub mod transform;
pub mod validate;

pub use config::EngineConfig;
pub use diagnostics::{ContentError, Diagnostics, ErrorCode, Severity, SourceLocation};
pub use document::{parse_json, parse_yaml, ValueKind, ValueTree};
pub use error::{Result, SchemaError};
pub use schema::{
    DocumentLoader, NoDocuments, NodeId, Resolver, SchemaDocument, SchemaHandle, SchemaNode, SchemaSet,
};
pub use transform::{DeferredValue, ExtractedContent, Resolvers, TransformOutput, Transformer};
pub use validate::Validator;
