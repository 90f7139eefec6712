//! Reference Resolution
//!
//! Follows `$ref` chains, within one document or across documents, until a
//! ref-free node is reached. Results are memoized per ref string in the
//! owning document; concurrent first use of the same ref computes it once.
//!
//! A ref string seen twice within one chain resolves to the `false` schema
//! instead of recursing.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use url::Url;
use walkdir::WalkDir;

use super::loader::split_address;
use super::{NodeId, SchemaDocument, SchemaHandle};
use crate::error::{Result, SchemaError};

// =============================================================================
// Document Loading
// =============================================================================

/// Supplies schema documents for cross-document `$ref`s
pub trait DocumentLoader: Send + Sync {
    /// Load the document whose root resource is `address` (no fragment)
    fn load(&self, address: &str) -> Result<Arc<SchemaDocument>>;
}

/// Loader for self-contained schemas: every external address is missing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDocuments;

impl DocumentLoader for NoDocuments {
    fn load(&self, address: &str) -> Result<Arc<SchemaDocument>> {
        Err(SchemaError::DocumentNotFound(address.to_string()))
    }
}

/// Registry of loaded schema documents keyed by resource address.
///
/// Documents registered up front are served from memory; `file://`
/// addresses that are not registered are read from disk on first use.
#[derive(Default)]
pub struct SchemaSet {
    documents: RwLock<HashMap<String, Arc<SchemaDocument>>>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under its own address and every resource it
    /// defines
    pub fn insert(&self, document: Arc<SchemaDocument>) {
        let mut documents = self.documents.write();
        for resource in &document.resources {
            documents.insert(resource.clone(), document.clone());
        }
        documents.insert(document.address.clone(), document);
    }

    pub fn get(&self, address: &str) -> Option<Arc<SchemaDocument>> {
        self.documents.read().get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Load a schema file, registering it under its `file://` address
    pub fn load_file(&self, path: &Path) -> Result<Arc<SchemaDocument>> {
        let address = file_address(path)?;
        if let Some(document) = self.get(&address) {
            return Ok(document);
        }
        let text = fs::read_to_string(path)?;
        let document = SchemaDocument::load_with_base(&text, &address)?;
        self.insert(document.clone());
        Ok(document)
    }

    /// Register every `*.json` schema below a directory
    pub fn load_directory(&self, dir: &Path) -> Result<usize> {
        let mut count = 0;
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            self.load_file(path)?;
            count += 1;
        }
        debug!(dir = %dir.display(), count, "Registered schema directory");
        Ok(count)
    }
}

impl DocumentLoader for SchemaSet {
    fn load(&self, address: &str) -> Result<Arc<SchemaDocument>> {
        if let Some(document) = self.get(address) {
            return Ok(document);
        }

        let url = Url::parse(address).map_err(|_| SchemaError::InvalidAddress(address.to_string()))?;
        if url.scheme() != "file" {
            return Err(SchemaError::DocumentNotFound(address.to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|_| SchemaError::InvalidAddress(address.to_string()))?;
        if !path.is_file() {
            return Err(SchemaError::DocumentNotFound(address.to_string()));
        }
        self.load_file(&path)
    }
}

impl Drop for SchemaSet {
    // documents resolved through this set may reference each other
    fn drop(&mut self) {
        for document in self.documents.get_mut().values() {
            document.clear_resolutions();
        }
    }
}

impl fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let documents = self.documents.read();
        let mut addresses: Vec<&String> = documents.keys().collect();
        addresses.sort();
        f.debug_struct("SchemaSet").field("documents", &addresses).finish()
    }
}

/// `file://` address of a schema file
pub fn file_address(path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .map_err(|_| SchemaError::InvalidAddress(absolute.display().to_string()))
}

// =============================================================================
// Resolution Cache
// =============================================================================

/// Memoized target of a ref string. Targets in other documents are held
/// strongly; documents referencing each other stay alive until one of
/// their caches is cleared (see [`SchemaDocument::clear_resolutions`]).
#[derive(Clone)]
struct CachedTarget {
    external: Option<Arc<SchemaDocument>>,
    id: NodeId,
}

#[derive(Default)]
struct CacheEntry {
    target: OnceLock<CachedTarget>,
    init: Mutex<()>,
}

/// Per-document `$ref` memo: ref string -> resolved target
#[derive(Default)]
pub(crate) struct ResolutionCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
}

impl ResolutionCache {
    fn entry(&self, reference: &str) -> Arc<CacheEntry> {
        if let Some(entry) = self.entries.read().get(reference) {
            return entry.clone();
        }
        self.entries
            .write()
            .entry(reference.to_string())
            .or_default()
            .clone()
    }

    /// Drop every memoized target, releasing held external documents
    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.target.get().is_some())
            .count()
    }
}

impl fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionCache").field("resolved", &self.len()).finish()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves `$ref`s, loading other documents through a [`DocumentLoader`]
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    loader: &'a dyn DocumentLoader,
}

impl<'a> Resolver<'a> {
    pub fn new(loader: &'a dyn DocumentLoader) -> Self {
        Self { loader }
    }

    /// Follow `$ref` until a ref-free node is reached. Idempotent: the
    /// result of a resolution resolves to itself.
    pub fn resolve(&self, schema: &SchemaHandle) -> Result<SchemaHandle> {
        let Some(reference) = schema.node().reference.as_deref() else {
            return Ok(schema.clone());
        };
        let document = schema.document();
        let entry = document.cache.entry(reference);

        if let Some(resolved) = Self::cached(document, &entry) {
            return Ok(resolved);
        }

        // one thread computes; late arrivals find the value after the lock
        let _guard = entry.init.lock();
        if let Some(resolved) = Self::cached(document, &entry) {
            return Ok(resolved);
        }

        let resolved = self.follow(document, reference)?;
        let external = (!Arc::ptr_eq(resolved.document(), document)).then(|| resolved.document().clone());
        // the init lock is held and the entry was empty, so this set wins
        let _ = entry.target.set(CachedTarget {
            external,
            id: resolved.id(),
        });
        Ok(resolved)
    }

    fn cached(document: &Arc<SchemaDocument>, entry: &CacheEntry) -> Option<SchemaHandle> {
        let target = entry.target.get()?;
        let owner = target.external.clone().unwrap_or_else(|| document.clone());
        Some(SchemaHandle::new(owner, target.id))
    }

    /// Walk a ref chain starting at `reference`. The walk never consults a
    /// cache, so it cannot re-enter a cache entry being initialized.
    fn follow(&self, document: &Arc<SchemaDocument>, reference: &str) -> Result<SchemaHandle> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut reference = reference.to_string();
        let mut current_document = document.clone();

        loop {
            if !visited.insert(reference.clone()) {
                warn!(reference = %reference, "Cyclic $ref chain resolves to the false schema");
                return Ok(SchemaHandle::new(document.clone(), NodeId::NOTHING));
            }

            let target = self.lookup(&current_document, &reference)?;
            match target.node().reference.clone() {
                Some(next) => {
                    current_document = target.document().clone();
                    reference = next;
                }
                None => return Ok(target),
            }
        }
    }

    /// Find the node at an absolute address, loading another document when
    /// the address belongs to a resource this document does not define
    fn lookup(&self, document: &Arc<SchemaDocument>, address: &str) -> Result<SchemaHandle> {
        if let Some(id) = document.lookup_address(address) {
            return Ok(SchemaHandle::new(document.clone(), id));
        }

        let (resource, _) = split_address(address);
        if document.defines_resource(resource) {
            return Err(SchemaError::UnresolvedRef {
                target: address.to_string(),
                from: document.address.clone(),
            });
        }

        debug!(resource = %resource, "Loading referenced schema document");
        let external = self.loader.load(resource)?;
        let id = external
            .lookup_address(address)
            .ok_or_else(|| SchemaError::UnresolvedRef {
                target: address.to_string(),
                from: document.address.clone(),
            })?;
        Ok(SchemaHandle::new(external, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn resolve_path(document: &Arc<SchemaDocument>, pointer: &str) -> SchemaHandle {
        let id = document.lookup_path(pointer).unwrap();
        Resolver::new(&NoDocuments)
            .resolve(&SchemaHandle::new(document.clone(), id))
            .unwrap()
    }

    #[test]
    fn test_follows_chain_to_concrete_node() {
        let document = SchemaDocument::load(
            r##"{
                "definitions": {
                    "a": { "$ref": "#/definitions/b" },
                    "b": { "$ref": "#/definitions/c" },
                    "c": { "type": "string" }
                }
            }"##,
        )
        .unwrap();

        let resolved = resolve_path(&document, "/definitions/a");
        assert_eq!(resolved.node().pointer, "/definitions/c");
        assert_eq!(document.cached_refs(), 1);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let document = SchemaDocument::load(
            r##"{ "properties": { "x": { "$ref": "#/definitions/y" } }, "definitions": { "y": {} } }"##,
        )
        .unwrap();
        let resolver = Resolver::new(&NoDocuments);
        let x = SchemaHandle::new(document.clone(), document.lookup_path("/properties/x").unwrap());

        let once = resolver.resolve(&x).unwrap();
        let twice = resolver.resolve(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_cycle_resolves_to_nothing() {
        let document = SchemaDocument::load(
            r##"{
                "definitions": {
                    "a": { "$ref": "#/definitions/b" },
                    "b": { "$ref": "#/definitions/a" }
                }
            }"##,
        )
        .unwrap();

        assert_eq!(resolve_path(&document, "/definitions/a").id(), NodeId::NOTHING);
        assert_eq!(resolve_path(&document, "/definitions/b").id(), NodeId::NOTHING);
    }

    struct CountingLoader {
        document: Arc<SchemaDocument>,
        loads: AtomicUsize,
    }

    impl DocumentLoader for CountingLoader {
        fn load(&self, address: &str) -> Result<Arc<SchemaDocument>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if address == self.document.address() {
                Ok(self.document.clone())
            } else {
                Err(SchemaError::DocumentNotFound(address.to_string()))
            }
        }
    }

    #[test]
    fn test_cross_document_resolution() {
        let common = SchemaDocument::load_with_base(
            r##"{ "definitions": { "uid": { "$ref": "#/definitions/str" }, "str": { "type": "string" } } }"##,
            "schema://local/common.json",
        )
        .unwrap();
        let main = SchemaDocument::load(
            r##"{ "properties": { "uid": { "$ref": "common.json#/definitions/uid" } } }"##,
        )
        .unwrap();
        let loader = CountingLoader {
            document: common.clone(),
            loads: AtomicUsize::new(0),
        };
        let resolver = Resolver::new(&loader);
        let uid = SchemaHandle::new(main.clone(), main.lookup_path("/properties/uid").unwrap());

        let resolved = resolver.resolve(&uid).unwrap();
        assert!(Arc::ptr_eq(resolved.document(), &common));
        assert_eq!(resolved.node().pointer, "/definitions/str");

        // memoized: the loader is not consulted again
        resolver.resolve(&uid).unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    /// Parses a fresh document on every call and keeps nothing
    struct ParsingLoader {
        loads: AtomicUsize,
    }

    impl DocumentLoader for ParsingLoader {
        fn load(&self, address: &str) -> Result<Arc<SchemaDocument>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            SchemaDocument::load_with_base(r#"{ "definitions": { "n": { "type": "number" } } }"#, address)
        }
    }

    #[test]
    fn test_memo_holds_documents_the_loader_drops() {
        let main = SchemaDocument::load(r##"{ "$ref": "other.json#/definitions/n" }"##).unwrap();
        let loader = ParsingLoader {
            loads: AtomicUsize::new(0),
        };
        let resolver = Resolver::new(&loader);

        for _ in 0..5 {
            let resolved = resolver.resolve(&SchemaHandle::root(&main)).unwrap();
            assert_eq!(resolved.node().pointer, "/definitions/n");
        }
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(main.cached_refs(), 1);
    }

    #[test]
    fn test_clear_resolutions_releases_external_documents() {
        let common = SchemaDocument::load_with_base(
            r##"{ "definitions": { "x": { "type": "integer" } } }"##,
            "schema://local/common.json",
        )
        .unwrap();
        let main = SchemaDocument::load(r##"{ "$ref": "common.json#/definitions/x" }"##).unwrap();
        let loader = CountingLoader {
            document: common.clone(),
            loads: AtomicUsize::new(0),
        };

        let baseline = Arc::strong_count(&common);
        Resolver::new(&loader).resolve(&SchemaHandle::root(&main)).unwrap();
        assert_eq!(Arc::strong_count(&common), baseline + 1);

        main.clear_resolutions();
        assert_eq!(Arc::strong_count(&common), baseline);
        assert_eq!(main.cached_refs(), 0);
    }

    #[test]
    fn test_dropping_schema_set_breaks_reference_cycles() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r##"{ "definitions": { "x": { "$ref": "b.json#/definitions/y" }, "z": { "type": "string" } } }"##,
        )
        .unwrap();
        fs::write(
            dir.path().join("b.json"),
            r##"{ "definitions": { "y": { "type": "number" }, "w": { "$ref": "a.json#/definitions/z" } } }"##,
        )
        .unwrap();

        let set = SchemaSet::new();
        set.load_directory(dir.path()).unwrap();
        let a = set.load_file(&dir.path().join("a.json")).unwrap();
        let b = set.load_file(&dir.path().join("b.json")).unwrap();
        let resolver = Resolver::new(&set);
        resolver
            .resolve(&SchemaHandle::new(a.clone(), a.lookup_path("/definitions/x").unwrap()))
            .unwrap();
        resolver
            .resolve(&SchemaHandle::new(b.clone(), b.lookup_path("/definitions/w").unwrap()))
            .unwrap();
        assert_eq!(a.cached_refs(), 1);
        assert_eq!(b.cached_refs(), 1);

        drop(set);
        assert_eq!(a.cached_refs(), 0);
        assert_eq!(b.cached_refs(), 0);
        assert_eq!(Arc::strong_count(&a), 1);
        assert_eq!(Arc::strong_count(&b), 1);
    }

    #[test]
    fn test_missing_external_document_is_fatal() {
        let main = SchemaDocument::load(r##"{ "$ref": "missing.json" }"##).unwrap();
        let err = Resolver::new(&NoDocuments)
            .resolve(&SchemaHandle::root(&main))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DocumentNotFound(_)));
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let common = SchemaDocument::load_with_base(
            r##"{ "definitions": { "x": { "type": "integer" } } }"##,
            "schema://local/common.json",
        )
        .unwrap();
        let main = SchemaDocument::load(r##"{ "$ref": "common.json#/definitions/x" }"##).unwrap();
        let loader = CountingLoader {
            document: common,
            loads: AtomicUsize::new(0),
        };

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let resolved = Resolver::new(&loader).resolve(&SchemaHandle::root(&main)).unwrap();
                    assert_eq!(resolved.node().pointer, "/definitions/x");
                });
            }
        });
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_schema_set_loads_files_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("common.json"),
            r#"{ "definitions": { "name": { "type": "string" } } }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("main.json"),
            r##"{ "properties": { "name": { "$ref": "common.json#/definitions/name" } } }"##,
        )
        .unwrap();

        let set = SchemaSet::new();
        let main = set.load_file(&dir.path().join("main.json")).unwrap();
        assert_eq!(set.len(), 1);

        let name = SchemaHandle::new(main.clone(), main.lookup_path("/properties/name").unwrap());
        let resolved = Resolver::new(&set).resolve(&name).unwrap();
        assert_eq!(resolved.node().pointer, "/definitions/name");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_schema_set_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let set = SchemaSet::new();
        assert_eq!(set.load_directory(dir.path()).unwrap(), 2);
    }
}
