//! Schema Loading
//!
//! Parses raw schema text into the node arena, assigns each node its JSON
//! Pointer path and absolute address, and pre-resolves every `$ref` to an
//! absolute address so later lookups are plain map reads.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};
use url::Url;

use super::analysis::find_ref_cycles;
use super::resolver::ResolutionCache;
use super::{
    AdditionalProperties, ContentType, EnumDependency, ErrorOverrides, NodeId, SchemaDocument,
    SchemaNode, TypeSet,
};
use crate::document::{pointer_push, ValueKind};
use crate::error::{Result, SchemaError};
use crate::validate::format::{parse_relative_date, translate_date_format};

/// Base address for schemas loaded without one
pub const DEFAULT_BASE_ADDRESS: &str = "schema://local/root.json";

/// Keywords whose object values map names to subschemas that are indexed
/// but not otherwise attached to the parent node
const DEFINITION_KEYWORDS: [&str; 2] = ["definitions", "$defs"];

/// Normalize an address: drop an empty fragment so `a.json#` == `a.json`
pub(crate) fn normalize(url: &Url) -> String {
    let mut url = url.clone();
    if url.fragment() == Some("") {
        url.set_fragment(None);
    }
    url.to_string()
}

fn current_base(scopes: &[(Url, String)]) -> &Url {
    // the document scope is always present
    &scopes[scopes.len() - 1].0
}

/// Split an absolute address into its resource and fragment parts
pub(crate) fn split_address(address: &str) -> (&str, Option<&str>) {
    match address.split_once('#') {
        Some((resource, fragment)) => (resource, Some(fragment)),
        None => (address, None),
    }
}

pub(crate) fn load(text: &str, base_address: &str) -> Result<SchemaDocument> {
    let raw: Value = serde_json::from_str(text).map_err(|e| SchemaError::Parse {
        address: base_address.to_string(),
        reason: e.to_string(),
    })?;

    let mut base = Url::parse(base_address)
        .map_err(|_| SchemaError::InvalidAddress(base_address.to_string()))?;
    base.set_fragment(None);

    let mut builder = Builder {
        document: base.to_string(),
        nodes: vec![SchemaNode::terminal(true), SchemaNode::terminal(false)],
        path_index: HashMap::new(),
        id_index: HashMap::new(),
        resources: HashSet::new(),
    };
    builder.resources.insert(base.to_string());

    let root = builder.add(&raw, String::new(), &[(base, String::new())])?;
    builder.check_local_refs()?;

    let ref_cycles = find_ref_cycles(&builder.nodes, &builder.id_index);
    for cycle in &ref_cycles {
        warn!(document = %builder.document, cycle = ?cycle, "$ref cycle resolves to the false schema");
    }

    debug!(
        document = %builder.document,
        nodes = builder.nodes.len(),
        addresses = builder.id_index.len(),
        "Loaded schema document"
    );

    Ok(SchemaDocument {
        address: builder.document,
        nodes: builder.nodes,
        root,
        path_index: builder.path_index,
        id_index: builder.id_index,
        resources: builder.resources,
        checksum: format!("{:x}", Sha256::digest(text.as_bytes())),
        ref_cycles,
        cache: ResolutionCache::default(),
    })
}

struct Builder {
    document: String,
    nodes: Vec<SchemaNode>,
    path_index: HashMap<String, NodeId>,
    id_index: HashMap<String, NodeId>,
    resources: HashSet<String>,
}

impl Builder {
    fn invalid(&self, pointer: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::invalid(&self.document, pointer, reason)
    }

    /// Pre-order walk: reserve the node's slot, index it, then build its
    /// children. `scopes` holds every enclosing `$id` resource with the
    /// pointer of its root, innermost last.
    fn add(&mut self, raw: &Value, pointer: String, scopes: &[(Url, String)]) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SchemaNode::default());

        let object = match raw {
            Value::Bool(accepts) => {
                let address = self.register(id, &pointer, scopes);
                self.nodes[id.index()] = SchemaNode {
                    pointer,
                    address,
                    ..SchemaNode::terminal(*accepts)
                };
                return Ok(id);
            }
            Value::Object(object) => object,
            _ => return Err(self.invalid(&pointer, "schema must be an object or a boolean")),
        };

        // $id: either a new resource base or a plain-name anchor
        let nested_scopes: Vec<(Url, String)>;
        let mut scopes = scopes;
        let mut anchor = None;
        if let Some(raw_id) = object.get("$id") {
            let raw_id = raw_id
                .as_str()
                .ok_or_else(|| self.invalid(&pointer, "$id must be a string"))?;
            if raw_id.starts_with('#') {
                anchor = Some(raw_id.to_string());
            } else {
                let mut resolved = current_base(scopes)
                    .join(raw_id)
                    .map_err(|e| self.invalid(&pointer, format!("invalid $id '{}': {}", raw_id, e)))?;
                resolved.set_fragment(None);
                self.resources.insert(resolved.to_string());
                nested_scopes = scopes
                    .iter()
                    .cloned()
                    .chain(std::iter::once((resolved, pointer.clone())))
                    .collect();
                scopes = &nested_scopes;
            }
        }
        let base = current_base(scopes).clone();

        let address = self.register(id, &pointer, scopes);
        if let Some(anchor) = anchor {
            let anchored = base
                .join(&anchor)
                .map_err(|e| self.invalid(&pointer, format!("invalid anchor '{}': {}", anchor, e)))?;
            self.id_index.insert(normalize(&anchored), id);
        }

        let mut node = self.parse_keywords(object, &pointer, &base)?;
        node.pointer = pointer.clone();
        node.address = address;

        // subschemas
        if let Some(properties) = object.get("properties") {
            let properties = self.object_of(properties, &pointer, "properties")?;
            let mut children = BTreeMap::new();
            for (name, child) in properties {
                let child_pointer = pointer_push(&pointer_push(&pointer, "properties"), name);
                children.insert(name.clone(), self.add(child, child_pointer, scopes)?);
            }
            node.properties = children;
        }

        if let Some(patterns) = object.get("patternProperties") {
            let patterns = self.object_of(patterns, &pointer, "patternProperties")?;
            for (pattern, child) in patterns {
                let regex = regex::Regex::new(pattern).map_err(|e| {
                    self.invalid(&pointer, format!("invalid patternProperties regex '{}': {}", pattern, e))
                })?;
                let child_pointer = pointer_push(&pointer_push(&pointer, "patternProperties"), pattern);
                let child_id = self.add(child, child_pointer, scopes)?;
                node.pattern_properties.push((regex, child_id));
            }
        }

        node.additional_properties = match object.get("additionalProperties") {
            None | Some(Value::Bool(true)) => AdditionalProperties::Allowed,
            Some(Value::Bool(false)) => AdditionalProperties::Denied,
            Some(child @ Value::Object(_)) => {
                let child_pointer = pointer_push(&pointer, "additionalProperties");
                AdditionalProperties::Typed(self.add(child, child_pointer, scopes)?)
            }
            Some(_) => {
                return Err(self.invalid(&pointer, "additionalProperties must be a boolean or a schema"))
            }
        };

        if let Some(items) = object.get("items") {
            if items.is_array() {
                return Err(self.invalid(&pointer, "tuple-form items are not supported"));
            }
            let child_pointer = pointer_push(&pointer, "items");
            node.items = Some(self.add(items, child_pointer, scopes)?);
        }

        if let Some(names) = object.get("propertyNames") {
            let child_pointer = pointer_push(&pointer, "propertyNames");
            node.property_names = Some(self.add(names, child_pointer, scopes)?);
        }

        for keyword in DEFINITION_KEYWORDS {
            if let Some(definitions) = object.get(keyword) {
                let definitions = self.object_of(definitions, &pointer, keyword)?;
                for (name, child) in definitions {
                    let child_pointer = pointer_push(&pointer_push(&pointer, keyword), name);
                    self.add(child, child_pointer, scopes)?;
                }
            }
        }

        self.nodes[id.index()] = node;
        Ok(id)
    }

    /// Index a node by path and by its address within every enclosing
    /// resource, returning the innermost address
    fn register(&mut self, id: NodeId, pointer: &str, scopes: &[(Url, String)]) -> String {
        self.path_index.insert(pointer.to_string(), id);

        let mut innermost = String::new();
        for (base, resource_root) in scopes {
            let mut address = base.clone();
            address.set_fragment(Some(&pointer[resource_root.len()..]));
            innermost = normalize(&address);
            self.id_index.insert(innermost.clone(), id);
        }
        innermost
    }

    fn object_of<'v>(&self, value: &'v Value, pointer: &str, keyword: &str) -> Result<&'v Map<String, Value>> {
        value
            .as_object()
            .ok_or_else(|| self.invalid(pointer, format!("{} must be an object", keyword)))
    }

    /// Parse every non-subschema keyword into a node
    fn parse_keywords(&self, object: &Map<String, Value>, pointer: &str, base: &Url) -> Result<SchemaNode> {
        let mut node = SchemaNode::default();
        let keywords = Keywords { builder: self, object, pointer };

        if let Some(reference) = keywords.string("$ref")? {
            let resolved = base
                .join(&reference)
                .map_err(|e| self.invalid(pointer, format!("invalid $ref '{}': {}", reference, e)))?;
            node.reference = Some(normalize(&resolved));
        }

        node.types = match object.get("type") {
            None => None,
            Some(Value::String(name)) => Some(TypeSet::new(vec![keywords.kind(name)?])),
            Some(Value::Array(names)) => {
                let mut kinds = Vec::with_capacity(names.len());
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| self.invalid(pointer, "type entries must be strings"))?;
                    kinds.push(keywords.kind(name)?);
                }
                Some(TypeSet::new(kinds))
            }
            Some(_) => return Err(self.invalid(pointer, "type must be a string or an array")),
        };

        node.enum_values = match object.get("enum") {
            None => None,
            Some(Value::Array(values)) => Some(values.clone()),
            Some(_) => return Err(self.invalid(pointer, "enum must be an array")),
        };
        node.const_value = object.get("const").cloned();

        node.required = keywords.string_list("required")?.unwrap_or_default();
        node.either = keywords.string_groups("either")?;
        node.precludes = keywords.string_groups("precludes")?;
        node.dependencies = keywords.dependencies()?;
        node.enum_dependencies = keywords.enum_dependencies()?;
        node.min_properties = keywords.count("minProperties")?;
        node.max_properties = keywords.count("maxProperties")?;

        node.min_items = keywords.count("minItems")?;
        node.max_items = keywords.count("maxItems")?;
        node.unique_items = keywords.boolean("uniqueItems")?.unwrap_or(false);

        node.minimum = keywords.number("minimum")?;
        node.maximum = keywords.number("maximum")?;
        // draft-04 boolean form turns the inclusive bound exclusive
        match object.get("exclusiveMinimum") {
            Some(Value::Bool(true)) => node.exclusive_minimum = node.minimum.take(),
            Some(Value::Bool(false)) | None => {}
            Some(_) => node.exclusive_minimum = keywords.number("exclusiveMinimum")?,
        }
        match object.get("exclusiveMaximum") {
            Some(Value::Bool(true)) => node.exclusive_maximum = node.maximum.take(),
            Some(Value::Bool(false)) | None => {}
            Some(_) => node.exclusive_maximum = keywords.number("exclusiveMaximum")?,
        }

        node.min_length = keywords.count("minLength")?;
        node.max_length = keywords.count("maxLength")?;
        if let Some(pattern) = keywords.string("pattern")? {
            node.pattern = Some(
                regex::Regex::new(&pattern)
                    .map_err(|e| self.invalid(pointer, format!("invalid pattern '{}': {}", pattern, e)))?,
            );
        }
        node.format = keywords.string("format")?;
        node.date_format = keywords.string("dateFormat")?.map(|f| translate_date_format(&f));
        node.relative_min_date = keywords.relative_date("relativeMinDate")?;
        node.relative_max_date = keywords.relative_date("relativeMaxDate")?;

        if let Some(content_type) = keywords.string("contentType")? {
            node.content_type = ContentType::parse(&content_type)
                .ok_or_else(|| self.invalid(pointer, format!("unknown contentType '{}'", content_type)))?;
        }
        node.replaced_by = keywords.string("replacedBy")?;

        if let Some(overrides) = object.get("overwriteErrors") {
            node.overwrite_errors = serde_json::from_value::<ErrorOverrides>(overrides.clone())
                .map_err(|e| self.invalid(pointer, format!("invalid overwriteErrors: {}", e)))?;
        }

        Ok(node)
    }

    /// Every same-document `$ref` must name an indexed node
    fn check_local_refs(&self) -> Result<()> {
        for node in &self.nodes {
            let Some(reference) = &node.reference else { continue };
            let (resource, _) = split_address(reference);
            if self.resources.contains(resource) && !self.id_index.contains_key(reference) {
                return Err(SchemaError::UnresolvedRef {
                    target: reference.clone(),
                    from: format!("{}#{}", self.document, node.pointer),
                });
            }
        }
        Ok(())
    }
}

/// Typed accessors over one schema object's keywords
struct Keywords<'a> {
    builder: &'a Builder,
    object: &'a Map<String, Value>,
    pointer: &'a str,
}

impl<'a> Keywords<'a> {
    fn invalid(&self, keyword: &str, expected: &str) -> SchemaError {
        self.builder
            .invalid(self.pointer, format!("{} must be {}", keyword, expected))
    }

    fn kind(&self, name: &str) -> Result<ValueKind> {
        ValueKind::parse(name)
            .ok_or_else(|| self.builder.invalid(self.pointer, format!("unknown type '{}'", name)))
    }

    fn string(&self, keyword: &str) -> Result<Option<String>> {
        match self.object.get(keyword) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.invalid(keyword, "a string")),
        }
    }

    fn boolean(&self, keyword: &str) -> Result<Option<bool>> {
        match self.object.get(keyword) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.invalid(keyword, "a boolean")),
        }
    }

    fn number(&self, keyword: &str) -> Result<Option<f64>> {
        match self.object.get(keyword) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(keyword, "a number")),
        }
    }

    fn count(&self, keyword: &str) -> Result<Option<usize>> {
        match self.object.get(keyword) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(|n| Some(n as usize))
                .ok_or_else(|| self.invalid(keyword, "a non-negative integer")),
        }
    }

    fn strings(&self, keyword: &str, value: &Value) -> Result<Vec<String>> {
        let items = value
            .as_array()
            .ok_or_else(|| self.invalid(keyword, "an array of strings"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .ok_or_else(|| self.invalid(keyword, "an array of strings"))
            })
            .collect()
    }

    fn string_list(&self, keyword: &str) -> Result<Option<Vec<String>>> {
        match self.object.get(keyword) {
            None => Ok(None),
            Some(value) => self.strings(keyword, value).map(Some),
        }
    }

    fn string_groups(&self, keyword: &str) -> Result<Vec<Vec<String>>> {
        let Some(value) = self.object.get(keyword) else {
            return Ok(Vec::new());
        };
        let groups = value
            .as_array()
            .ok_or_else(|| self.invalid(keyword, "an array of name groups"))?;
        groups
            .iter()
            .map(|group| {
                let group = self.strings(keyword, group)?;
                if group.is_empty() {
                    Err(self.invalid(keyword, "a list of non-empty name groups"))
                } else {
                    Ok(group)
                }
            })
            .collect()
    }

    /// `dependencies`: name -> required co-names (a single string is
    /// accepted as a one-name list)
    fn dependencies(&self) -> Result<Vec<(String, Vec<String>)>> {
        let Some(value) = self.object.get("dependencies") else {
            return Ok(Vec::new());
        };
        let rules = value
            .as_object()
            .ok_or_else(|| self.invalid("dependencies", "an object"))?;

        let mut dependencies = Vec::with_capacity(rules.len());
        for (name, names) in rules {
            let names = match names {
                Value::String(single) => vec![single.clone()],
                Value::Array(_) => self.strings("dependencies", names)?,
                _ => return Err(self.invalid("dependencies", "a map of name lists")),
            };
            dependencies.push((name.clone(), names));
        }
        Ok(dependencies)
    }

    /// `enumDependencies`: controlling field -> controlling value ->
    /// dependent field -> allow-list
    fn enum_dependencies(&self) -> Result<Vec<EnumDependency>> {
        let Some(value) = self.object.get("enumDependencies") else {
            return Ok(Vec::new());
        };
        let expected = "controlling field -> value -> dependent field -> allowed values";
        let invalid = || self.invalid("enumDependencies", expected);

        let mut rules = Vec::new();
        for (controlling, by_value) in value.as_object().ok_or_else(invalid)? {
            for (controlling_value, by_field) in by_value.as_object().ok_or_else(invalid)? {
                for (dependent, allowed) in by_field.as_object().ok_or_else(invalid)? {
                    rules.push(EnumDependency {
                        controlling: controlling.clone(),
                        controlling_value: controlling_value.clone(),
                        dependent: dependent.clone(),
                        allowed: allowed.as_array().ok_or_else(invalid)?.clone(),
                    });
                }
            }
        }
        Ok(rules)
    }

    fn relative_date(&self, keyword: &str) -> Result<Option<chrono::Duration>> {
        match self.string(keyword)? {
            None => Ok(None),
            Some(text) => parse_relative_date(&text)
                .map(Some)
                .ok_or_else(|| self.invalid(keyword, "a duration like '-30.00:00:00'")),
        }
    }
}
