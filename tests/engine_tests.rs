//! End-to-end tests for validation and transformation
//!
//! Schemas and content live under `tests/fixtures`; cross-document `$ref`s
//! are served by a [`SchemaSet`] reading `file://` addresses on demand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};

use content_schema::diagnostics::{ContentError, Severity, SourceLocation};
use content_schema::transform::{LinkResolver, MarkdownRenderer, Resolvers, XrefResolver};
use content_schema::{
    parse_json, parse_yaml, NoDocuments, NodeId, Resolver, SchemaDocument, SchemaHandle, SchemaSet,
    Transformer, Validator, ValueTree,
};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixtures_path().join(name)).unwrap()
}

fn codes(errors: &[ContentError]) -> Vec<&str> {
    errors.iter().map(|e| e.code.as_str()).collect()
}

// =============================================================================
// Collaborators
// =============================================================================

#[derive(Default)]
struct Recorder {
    links: Mutex<Vec<String>>,
    markdown: Mutex<Vec<(String, bool)>>,
}

impl LinkResolver for Recorder {
    fn resolve_link(&self, href: &str, _file: &str, _location: &SourceLocation) -> (Option<ContentError>, String) {
        self.links.lock().push(href.to_string());
        (None, format!("/docs/{}", href.trim_end_matches(".md")))
    }
}

impl MarkdownRenderer for Recorder {
    fn render_markdown(&self, markdown: &str, _file: &str, inline: bool) -> (Vec<ContentError>, String) {
        self.markdown.lock().push((markdown.to_string(), inline));
        let html = markdown
            .replace("**Hi**", "<strong>Hi</strong>")
            .replace("**basics**", "<strong>basics</strong>")
            .replace("*started*", "<em>started</em>");
        if inline {
            (Vec::new(), html)
        } else {
            (Vec::new(), format!("<p>{}</p>", html))
        }
    }
}

impl XrefResolver for Recorder {
    fn resolve_xref(&self, uid: &str, _file: &str) -> (Option<ContentError>, String) {
        (None, format!("/api/{}", uid.to_lowercase()))
    }
}

fn recording_resolvers(recorder: &Arc<Recorder>) -> Resolvers {
    Resolvers::passthrough()
        .with_link(recorder.clone())
        .with_markdown(recorder.clone())
        .with_xref(recorder.clone())
}

// =============================================================================
// Single-Document Schema
// =============================================================================

#[test]
fn test_conceptual_end_to_end() {
    let document = SchemaDocument::load(&read_fixture("conceptual.schema.json")).unwrap();
    let schema = SchemaHandle::root(&document);
    let tree = ValueTree::new("conceptual.json", json!({"summary": "**Hi**"}));

    let errors = Validator::new(&NoDocuments).validate(&schema, &tree).unwrap();
    assert_eq!(codes(&errors), ["MissingAttribute"]);
    assert_eq!(errors[0].property.as_deref(), Some("uid"));
    assert_eq!(errors[0].severity, Severity::Error);

    let recorder = Arc::new(Recorder::default());
    let output = Transformer::new(&NoDocuments, recording_resolvers(&recorder))
        .transform(&schema, tree)
        .unwrap();
    assert_eq!(output.tree.root, json!({"summary": "<p><strong>Hi</strong></p>"}));
    assert!(output.errors.is_empty());
    assert_eq!(*recorder.markdown.lock(), vec![("**Hi**".to_string(), false)]);
}

#[test]
fn test_conceptual_yaml_content() {
    let document = SchemaDocument::load(&read_fixture("conceptual.schema.json")).unwrap();
    let tree = parse_yaml("conceptual.yml", &read_fixture("content/conceptual.yml")).unwrap();

    let errors = Validator::new(&NoDocuments)
        .validate(&SchemaHandle::root(&document), &tree)
        .unwrap();
    assert!(errors.is_empty(), "{:?}", errors);
}

// =============================================================================
// Cross-Document Schemas
// =============================================================================

fn landing(set: &SchemaSet) -> SchemaHandle {
    let document = set
        .load_file(&fixtures_path().join("schemas/landing.schema.json"))
        .unwrap();
    SchemaHandle::root(&document)
}

#[test]
fn test_valid_landing_page() {
    let set = SchemaSet::new();
    let schema = landing(&set);
    let tree = parse_json("landing.json", &read_fixture("content/landing.json")).unwrap();

    let errors = Validator::new(&set).validate(&schema, &tree).unwrap();
    assert!(errors.is_empty(), "{:?}", errors);
    // common.json was fetched on demand
    assert_eq!(set.len(), 2);
}

#[test]
fn test_invalid_landing_page() {
    let set = SchemaSet::new();
    let schema = landing(&set);
    let tree = parse_json("landing-invalid.json", &read_fixture("content/landing-invalid.json")).unwrap();

    let errors = Validator::new(&set).validate(&schema, &tree).unwrap();
    assert_eq!(
        codes(&errors),
        [
            "MissingAttribute",
            "PrecludedAttributes",
            "AttributeDeprecated",
            "UnknownField",
            "DateFormatInvalid",
            "MissingAttribute",
            "UnexpectedType",
            "ArrayNotUnique",
            "PatternMismatch",
        ]
    );

    // the page-level title override applies only to the page's own table
    assert_eq!(errors[0].severity, Severity::Warning);
    assert_eq!(errors[0].message, "Landing pages should have a title.");
    assert_eq!(errors[5].severity, Severity::Error);
    assert_eq!(errors[5].property.as_deref(), Some("title"));

    assert_eq!(errors[1].property.as_deref(), Some("summary"));
    assert_eq!(errors[3].property.as_deref(), Some("extra"));
    assert_eq!(errors[6].property.as_deref(), Some("href"));
    assert_eq!(errors[8].property.as_deref(), Some("uid"));

    // positions come from the JSON reader
    assert_eq!(errors[3].location.line, 7);
    assert_eq!(errors[3].location.file, "landing-invalid.json");
}

#[test]
fn test_transform_landing_page() {
    let set = SchemaSet::new();
    let schema = landing(&set);
    let tree = parse_json("landing.json", &read_fixture("content/landing.json")).unwrap();
    let recorder = Arc::new(Recorder::default());

    let output = Transformer::new(&set, recording_resolvers(&recorder))
        .transform(&schema, tree)
        .unwrap();
    assert!(output.errors.is_empty());

    let root = &output.tree.root;
    assert_eq!(root["uid"], json!("docs.landing"));
    assert_eq!(root["title"], json!("Get <em>started</em>"));
    assert_eq!(root["summary"], json!("<p>Learn the <strong>basics</strong>.</p>"));
    assert_eq!(root["sections"][0]["href"], json!("/docs/install"));
    assert_eq!(root["sections"][0]["see"], json!(["/api/system.string"]));
    assert_eq!(root["sections"][1]["title"], json!("Configure"));
    assert_eq!(output.tree.get("/sections/1/href"), Some(&json!("/docs/configure")));
    assert_eq!(output.tree.get("/sections/2"), None);
    assert_eq!(root["ms.date"], json!("06/01/2024"));

    assert_eq!(
        *recorder.links.lock(),
        vec!["install.md".to_string(), "configure.md".to_string()]
    );
}

#[test]
fn test_extract_landing_page_lazily() {
    let set = SchemaSet::new();
    let schema = landing(&set);
    let tree = parse_json("landing.json", &read_fixture("content/landing.json")).unwrap();
    let recorder = Arc::new(Recorder::default());

    let extracted = Transformer::new(&set, recording_resolvers(&recorder))
        .extract(&schema, &tree)
        .unwrap();
    assert_eq!(
        extracted.pointers().collect::<Vec<_>>(),
        [
            "/sections/0/href",
            "/sections/0/see/0",
            "/sections/1/href",
            "/summary",
            "/title",
            "/uid",
        ]
    );
    assert!(recorder.links.lock().is_empty());
    assert!(recorder.markdown.lock().is_empty());

    let href = extracted.force("/sections/1/href").unwrap().value.clone();
    assert_eq!(href, json!("/docs/configure"));
    extracted.force("/sections/1/href").unwrap();
    assert_eq!(*recorder.links.lock(), vec!["configure.md".to_string()]);
    assert!(recorder.markdown.lock().is_empty());
}

#[test]
fn test_missing_external_schema_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.json");
    std::fs::write(&path, r##"{ "properties": { "a": { "$ref": "nowhere.json#/definitions/a" } } }"##).unwrap();

    let set = SchemaSet::new();
    let document = set.load_file(&path).unwrap();
    let result = Validator::new(&set).validate(
        &SchemaHandle::root(&document),
        &ValueTree::new("doc.json", json!({"a": 1})),
    );
    assert!(result.is_err());
}

// =============================================================================
// Resolution Properties
// =============================================================================

/// Each definition is either concrete or a `$ref` to another definition
fn chain_schema(targets: &[Option<usize>]) -> Value {
    let definitions: serde_json::Map<String, Value> = targets
        .iter()
        .enumerate()
        .map(|(i, target)| {
            let definition = match target {
                Some(j) => json!({ "$ref": format!("#/definitions/d{}", j % targets.len()) }),
                None => json!({ "type": "string" }),
            };
            (format!("d{}", i), definition)
        })
        .collect();
    json!({ "definitions": definitions })
}

/// Follow the chain the way resolution does, by hand
fn expected_target(targets: &[Option<usize>], start: usize) -> Option<usize> {
    let mut visited = std::collections::HashSet::new();
    let mut current = start;
    while let Some(next) = targets[current] {
        let next = next % targets.len();
        if !visited.insert(next) {
            return None;
        }
        current = next;
    }
    Some(current)
}

proptest! {
    #[test]
    fn prop_resolution_is_idempotent_and_cycle_safe(
        targets in proptest::collection::vec(proptest::option::of(0usize..8), 1..8)
    ) {
        let document = SchemaDocument::load(&chain_schema(&targets).to_string()).unwrap();
        let resolver = Resolver::new(&NoDocuments);

        for start in 0..targets.len() {
            let id = document.lookup_path(&format!("/definitions/d{}", start)).unwrap();
            let once = resolver.resolve(&SchemaHandle::new(document.clone(), id)).unwrap();
            let twice = resolver.resolve(&once).unwrap();
            prop_assert_eq!(&once, &twice);

            match expected_target(&targets, start) {
                Some(end) => prop_assert_eq!(&once.node().pointer, &format!("/definitions/d{}", end)),
                None => prop_assert_eq!(once.id(), NodeId::NOTHING),
            }
        }
    }
}
