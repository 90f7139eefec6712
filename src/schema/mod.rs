//! Schema Model
//!
//! A loaded schema is a [`SchemaDocument`]: an arena of [`SchemaNode`]s plus
//! two read-only indices (JSON Pointer path -> node, absolute address ->
//! node). Children are arena ids; `$ref`s are absolute address strings
//! resolved through the [`Resolver`], so cyclic schemas never form cyclic
//! ownership.
//!
//! Every document reserves two terminal nodes: [`NodeId::ANYTHING`] (the
//! `true` schema) and [`NodeId::NOTHING`] (the `false` schema, also used as
//! the result of a cyclic `$ref` chain).

pub mod analysis;
pub mod loader;
pub mod resolver;

pub use loader::DEFAULT_BASE_ADDRESS;
pub use resolver::{DocumentLoader, NoDocuments, Resolver, SchemaSet};

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::diagnostics::{ContentError, Severity};
use crate::document::ValueKind;
use crate::error::Result;
use resolver::ResolutionCache;

// =============================================================================
// Node Identity
// =============================================================================

/// Index of a node within its document's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The `true` schema: accepts every value
    pub const ANYTHING: NodeId = NodeId(0);
    /// The `false` schema: accepts nothing
    pub const NOTHING: NodeId = NodeId(1);

    pub fn index(&self) -> usize {
        self.0
    }
}

// =============================================================================
// Keyword Types
// =============================================================================

/// Accepted value kinds from the `type` keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSet(Vec<ValueKind>);

impl TypeSet {
    pub fn new(kinds: Vec<ValueKind>) -> Self {
        Self(kinds)
    }

    /// `number` admits integers; `integer` only admits integral values
    pub fn accepts(&self, kind: ValueKind) -> bool {
        self.0.iter().any(|declared| {
            *declared == kind || (*declared == ValueKind::Number && kind == ValueKind::Integer)
        })
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(ValueKind::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Which transform applies to a string leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentType {
    #[default]
    None,
    Href,
    Markdown,
    InlineMarkdown,
    Html,
    Xref,
    Uid,
}

impl ContentType {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "href" => Self::Href,
            "markdown" => Self::Markdown,
            "inlineMarkdown" => Self::InlineMarkdown,
            "html" => Self::Html,
            "xref" => Self::Xref,
            "uid" => Self::Uid,
            _ => return None,
        })
    }
}

/// Policy for object keys not matched by `properties` or `patternProperties`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdditionalProperties {
    #[default]
    Allowed,
    Denied,
    Typed(NodeId),
}

/// One `enumDependencies` rule: when `controlling` has the value
/// `controlling_value`, `dependent` must be present and one of `allowed`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDependency {
    pub controlling: String,
    pub controlling_value: String,
    pub dependent: String,
    pub allowed: Vec<Value>,
}

impl EnumDependency {
    /// Controlling values are object keys, so non-string values compare by
    /// their JSON text (`true`, `1`)
    pub fn is_triggered_by(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => *s == self.controlling_value,
            other => other.to_string() == self.controlling_value,
        }
    }
}

// =============================================================================
// Error Overrides
// =============================================================================

/// Severity named in an override. `Off` keeps the error's default severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideSeverity {
    Off,
    Info,
    Suggestion,
    Warning,
    Error,
}

impl OverrideSeverity {
    pub fn level(&self) -> Option<Severity> {
        match self {
            Self::Off => None,
            Self::Info => Some(Severity::Info),
            Self::Suggestion => Some(Severity::Suggestion),
            Self::Warning => Some(Severity::Warning),
            Self::Error => Some(Severity::Error),
        }
    }
}

/// Replacement presentation for one error code on one property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorOverride {
    #[serde(default)]
    pub severity: Option<OverrideSeverity>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `overwriteErrors`: property name -> error code -> override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorOverrides(HashMap<String, HashMap<String, ErrorOverride>>);

impl ErrorOverrides {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, property: &str, code: &str) -> Option<&ErrorOverride> {
        self.0.get(property)?.get(code)
    }

    /// Rewrite an error's presentation if an entry matches its property
    /// tag and original code. Only non-empty fields replace.
    pub fn apply(&self, error: &mut ContentError) {
        let Some(property) = error.property.as_deref() else {
            return;
        };
        let Some(entry) = self.get(property, &error.code) else {
            return;
        };

        if let Some(severity) = entry.severity.and_then(|s| s.level()) {
            error.severity = severity;
        }
        if let Some(code) = entry.code.as_deref().filter(|c| !c.is_empty()) {
            error.code = code.to_string();
        }
        if let Some(message) = entry.message.as_deref().filter(|m| !m.is_empty()) {
            error.message = message.to_string();
        }
    }
}

// =============================================================================
// Schema Node
// =============================================================================

/// One constraint-bearing unit of a schema
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    /// JSON Pointer from the document root
    pub pointer: String,
    /// Absolute address (`base#pointer-within-resource`)
    pub address: String,
    /// `Some` for boolean shorthand schemas
    pub boolean: Option<bool>,
    /// `$ref`, pre-resolved to an absolute address
    pub reference: Option<String>,

    pub types: Option<TypeSet>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,

    // objects
    pub properties: BTreeMap<String, NodeId>,
    pub pattern_properties: Vec<(Regex, NodeId)>,
    pub additional_properties: AdditionalProperties,
    pub property_names: Option<NodeId>,
    pub required: Vec<String>,
    pub dependencies: Vec<(String, Vec<String>)>,
    pub either: Vec<Vec<String>>,
    pub precludes: Vec<Vec<String>>,
    pub enum_dependencies: Vec<EnumDependency>,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,

    // arrays
    pub items: Option<NodeId>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,

    // numbers
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,

    // strings
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub format: Option<String>,
    /// `dateFormat`, translated to a chrono format string
    pub date_format: Option<String>,
    pub relative_min_date: Option<Duration>,
    pub relative_max_date: Option<Duration>,

    // annotations
    pub content_type: ContentType,
    pub replaced_by: Option<String>,
    pub overwrite_errors: ErrorOverrides,
}

impl SchemaNode {
    pub(crate) fn terminal(accepts: bool) -> Self {
        Self {
            boolean: Some(accepts),
            ..Self::default()
        }
    }

    /// Schemas that apply to an object key through `properties` and every
    /// matching `patternProperties` regex
    pub fn matched_schemas(&self, key: &str) -> Vec<NodeId> {
        let mut matched = Vec::new();
        if let Some(id) = self.properties.get(key) {
            matched.push(*id);
        }
        for (regex, id) in &self.pattern_properties {
            if regex.is_match(key) {
                matched.push(*id);
            }
        }
        matched
    }
}

// =============================================================================
// Schema Document
// =============================================================================

/// A loaded schema file. Immutable after construction apart from the
/// internally synchronized `$ref` resolution cache.
#[derive(Debug)]
pub struct SchemaDocument {
    pub(crate) address: String,
    pub(crate) nodes: Vec<SchemaNode>,
    pub(crate) root: NodeId,
    pub(crate) path_index: HashMap<String, NodeId>,
    pub(crate) id_index: HashMap<String, NodeId>,
    /// Fragment-less addresses of every `$id` resource defined here
    pub(crate) resources: HashSet<String>,
    pub(crate) checksum: String,
    pub(crate) ref_cycles: Vec<Vec<String>>,
    pub(crate) cache: ResolutionCache,
}

impl SchemaDocument {
    /// Load a schema under the default synthetic base address
    pub fn load(text: &str) -> Result<Arc<Self>> {
        Self::load_with_base(text, DEFAULT_BASE_ADDRESS)
    }

    /// Load a schema whose root resource lives at `base_address`
    pub fn load_with_base(text: &str, base_address: &str) -> Result<Arc<Self>> {
        loader::load(text, base_address).map(Arc::new)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// SHA-256 of the schema text
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    /// Node at a JSON Pointer path from the document root
    pub fn lookup_path(&self, pointer: &str) -> Option<NodeId> {
        self.path_index.get(pointer).copied()
    }

    /// Node at an absolute address
    pub fn lookup_address(&self, address: &str) -> Option<NodeId> {
        self.id_index.get(address).copied()
    }

    /// Whether an address (without fragment) names a resource defined in
    /// this document
    pub fn defines_resource(&self, resource: &str) -> bool {
        self.resources.contains(resource)
    }

    /// All absolute addresses, sorted
    pub fn addresses(&self) -> Vec<&str> {
        let mut addresses: Vec<&str> = self.id_index.keys().map(String::as_str).collect();
        addresses.sort_unstable();
        addresses
    }

    /// Groups of node pointers whose `$ref`s only reach each other
    pub fn ref_cycles(&self) -> &[Vec<String>] {
        &self.ref_cycles
    }

    /// Number of `$ref` strings with a memoized resolution
    pub fn cached_refs(&self) -> usize {
        self.cache.len()
    }

    /// Forget every memoized `$ref` target. Cached targets hold their
    /// documents alive, so mutually referencing documents are only freed
    /// once one side is cleared.
    pub fn clear_resolutions(&self) {
        self.cache.clear();
    }
}

/// A node together with the document that owns it
#[derive(Clone)]
pub struct SchemaHandle {
    document: Arc<SchemaDocument>,
    id: NodeId,
}

impl SchemaHandle {
    pub fn new(document: Arc<SchemaDocument>, id: NodeId) -> Self {
        Self { document, id }
    }

    /// Handle to a document's root node
    pub fn root(document: &Arc<SchemaDocument>) -> Self {
        Self::new(document.clone(), document.root)
    }

    pub fn document(&self) -> &Arc<SchemaDocument> {
        &self.document
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &SchemaNode {
        self.document.node(self.id)
    }

    /// Another node of the same document
    pub fn sibling(&self, id: NodeId) -> Self {
        Self::new(self.document.clone(), id)
    }
}

impl PartialEq for SchemaHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.document, &other.document) && self.id == other.id
    }
}

impl Eq for SchemaHandle {}

impl fmt::Debug for SchemaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaHandle")
            .field("document", &self.document.address)
            .field("id", &self.id)
            .field("pointer", &self.node().pointer)
            .finish()
    }
}
