//! Content Transformation
//!
//! Rewrites string leaves whose schema carries a `contentType` through the
//! host's collaborators. Two entry points share one traversal:
//!
//! - [`Transformer::transform`] computes every leaf and writes the results
//!   back into the tree.
//! - [`Transformer::extract`] records one [`DeferredValue`] per leaf and
//!   calls no collaborator until a value is forced.
//!
//! Collaborator errors are collected; they never stop the walk.

pub mod deferred;
pub mod resolvers;

pub use deferred::{DeferredValue, TransformedValue};
pub use resolvers::{HtmlProcessor, LinkResolver, MarkdownRenderer, Passthrough, Resolvers, XrefResolver};

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::diagnostics::{ContentError, SourceLocation};
use crate::document::{pointer_push, ValueTree};
use crate::error::Result;
use crate::schema::{AdditionalProperties, ContentType, DocumentLoader, Resolver, SchemaHandle};

/// Result of an eager transformation
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub tree: ValueTree,
    pub errors: Vec<ContentError>,
}

/// Lazily transformed leaves, keyed by JSON Pointer
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    values: BTreeMap<String, DeferredValue>,
}

impl ExtractedContent {
    pub fn get(&self, pointer: &str) -> Option<&DeferredValue> {
        self.values.get(pointer)
    }

    /// Force the value at `pointer`, computing it on first use
    pub fn force(&self, pointer: &str) -> Option<&TransformedValue> {
        self.values.get(pointer).map(DeferredValue::force)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn pointers(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeferredValue)> {
        self.values.iter().map(|(pointer, value)| (pointer.as_str(), value))
    }

    /// Force every value, returning pointer -> value and all errors
    pub fn force_all(&self) -> (BTreeMap<String, Value>, Vec<ContentError>) {
        let mut values = BTreeMap::new();
        let mut errors = Vec::new();
        for (pointer, deferred) in &self.values {
            let transformed = deferred.force();
            values.insert(pointer.clone(), transformed.value.clone());
            errors.extend(transformed.errors.iter().cloned());
        }
        (values, errors)
    }
}

/// One string leaf due for transformation
#[derive(Debug, Clone)]
struct LeafJob {
    pointer: String,
    property: Option<String>,
    content_type: ContentType,
    raw: String,
    file: String,
    location: SourceLocation,
}

impl LeafJob {
    fn run(&self, resolvers: &Resolvers) -> TransformedValue {
        let (errors, value): (Vec<ContentError>, String) = match self.content_type {
            ContentType::Href => {
                let (error, link) = resolvers.link.resolve_link(&self.raw, &self.file, &self.location);
                (error.into_iter().collect(), link)
            }
            ContentType::Markdown | ContentType::InlineMarkdown => {
                let inline = self.content_type == ContentType::InlineMarkdown;
                resolvers.markdown.render_markdown(&self.raw, &self.file, inline)
            }
            ContentType::Html => {
                let mut errors = Vec::new();
                let rewritten = resolvers.html.rewrite_links(&self.raw, &mut |href: &str| {
                    let (error, link) = resolvers.link.resolve_link(href, &self.file, &self.location);
                    errors.extend(error);
                    link
                });
                (errors, resolvers.html.sanitize(&rewritten))
            }
            ContentType::Xref => {
                let (error, link) = resolvers.xref.resolve_xref(&self.raw, &self.file);
                (error.into_iter().collect(), link)
            }
            ContentType::Uid | ContentType::None => (Vec::new(), self.raw.clone()),
        };

        TransformedValue {
            value: Value::String(value),
            errors: errors.into_iter().map(|error| self.tag(error)).collect(),
        }
    }

    fn tag(&self, error: ContentError) -> ContentError {
        match &self.property {
            Some(property) if error.property.is_none() => error.with_property(property.clone()),
            _ => error,
        }
    }
}

/// Applies `contentType` transforms to content documents
#[derive(Clone)]
pub struct Transformer<'a> {
    resolver: Resolver<'a>,
    resolvers: Resolvers,
}

impl<'a> Transformer<'a> {
    pub fn new(loader: &'a dyn DocumentLoader, resolvers: Resolvers) -> Self {
        Self {
            resolver: Resolver::new(loader),
            resolvers,
        }
    }

    /// Transform every content-typed leaf in place
    pub fn transform(&self, schema: &SchemaHandle, mut tree: ValueTree) -> Result<TransformOutput> {
        let jobs = self.collect(schema, &tree)?;
        let mut errors = Vec::new();

        for job in &jobs {
            let transformed = job.run(&self.resolvers);
            if let Some(slot) = tree.get_mut(&job.pointer) {
                *slot = transformed.value;
            }
            errors.extend(transformed.errors);
        }

        debug!(file = %tree.file, leaves = jobs.len(), errors = errors.len(), "Transformed document");
        Ok(TransformOutput { tree, errors })
    }

    /// Record a deferred transformation for every content-typed leaf
    pub fn extract(&self, schema: &SchemaHandle, tree: &ValueTree) -> Result<ExtractedContent> {
        let jobs = self.collect(schema, tree)?;
        debug!(file = %tree.file, leaves = jobs.len(), "Extracted deferred content");

        let values = jobs
            .into_iter()
            .map(|job| {
                let resolvers = self.resolvers.clone();
                let pointer = job.pointer.clone();
                (pointer, DeferredValue::new(move || job.run(&resolvers)))
            })
            .collect();
        Ok(ExtractedContent { values })
    }

    fn collect(&self, schema: &SchemaHandle, tree: &ValueTree) -> Result<Vec<LeafJob>> {
        let mut jobs = Vec::new();
        self.walk(schema, tree, &tree.root, "", None, &mut jobs)?;
        Ok(jobs)
    }

    fn walk(
        &self,
        schema: &SchemaHandle,
        tree: &ValueTree,
        value: &Value,
        pointer: &str,
        property: Option<&str>,
        jobs: &mut Vec<LeafJob>,
    ) -> Result<()> {
        let resolved = self.resolver.resolve(schema)?;
        let node = resolved.node();
        if node.boolean.is_some() {
            return Ok(());
        }

        match value {
            Value::String(raw) if node.content_type != ContentType::None => jobs.push(LeafJob {
                pointer: pointer.to_string(),
                property: property.map(String::from),
                content_type: node.content_type,
                raw: raw.clone(),
                file: tree.file.clone(),
                location: tree.location(pointer),
            }),
            Value::Array(items) => {
                if let Some(item_schema) = node.items {
                    let item_schema = resolved.sibling(item_schema);
                    for (index, item) in items.iter().enumerate() {
                        let item_pointer = pointer_push(pointer, &index.to_string());
                        self.walk(&item_schema, tree, item, &item_pointer, property, jobs)?;
                    }
                }
            }
            Value::Object(map) => {
                for (key, child) in map {
                    // the first matching schema decides a leaf's transform
                    let child_schema = match node.matched_schemas(key).first() {
                        Some(id) => Some(*id),
                        None => match node.additional_properties {
                            AdditionalProperties::Typed(id) => Some(id),
                            _ => None,
                        },
                    };
                    if let Some(id) = child_schema {
                        let child_pointer = pointer_push(pointer, key);
                        self.walk(&resolved.sibling(id), tree, child, &child_pointer, Some(key), jobs)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}
