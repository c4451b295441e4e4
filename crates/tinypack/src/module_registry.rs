//! Module table for one bundling run
//!
//! The table is the single source of truth for module identity: one record
//! per canonical file path, with ids handed out densely in registration order
//! so the entry module is always `0`. Records are written by the graph
//! builder, gain their transformed source in the transform stage, and are
//! only read from serialization onwards.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHasher};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Type alias for FxHasher-based IndexMap
pub type FxIndexMap<K, V> = IndexMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

/// Unique identifier for a module, embedded in the bundle in place of specifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(u32);

impl ModuleId {
    /// The entry module
    pub const ENTRY: Self = Self(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value of the ModuleId
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything known about one module during bundling
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    /// Canonical file path, the module's identity
    pub path: PathBuf,
    /// Source as read from the file index
    pub raw_source: Arc<str>,
    /// SHA-256 of the raw source (hex-encoded)
    pub content_hash: String,
    /// Specifier as written -> resolved path, in first-occurrence order
    pub dependencies: FxIndexMap<String, PathBuf>,
    /// Set once by the transform stage
    pub transformed_source: Option<String>,
}

impl Module {
    pub fn is_entry(&self) -> bool {
        self.id == ModuleId::ENTRY
    }
}

/// Deduplicated module records indexed by id
#[derive(Debug, Default, Clone)]
pub struct ModuleTable {
    /// Position in this vector is the module id
    modules: Vec<Module>,
    path_to_id: FxHashMap<PathBuf, ModuleId>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under the next id.
    ///
    /// Registering a path twice returns the existing id and leaves the
    /// record untouched.
    pub fn add_module(
        &mut self,
        path: PathBuf,
        raw_source: Arc<str>,
        dependencies: FxIndexMap<String, PathBuf>,
    ) -> ModuleId {
        if let Some(&existing) = self.path_to_id.get(&path) {
            log::debug!(
                "Module {} already registered as {existing}",
                path.display()
            );
            return existing;
        }

        let id = ModuleId::new(self.modules.len() as u32);
        let content_hash = format!("{:x}", Sha256::digest(raw_source.as_bytes()));
        self.path_to_id.insert(path.clone(), id);
        self.modules.push(Module {
            id,
            path,
            raw_source,
            content_hash,
            dependencies,
            transformed_source: None,
        });
        id
    }

    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id.index())
    }

    pub fn get_id_by_path(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    pub fn get_by_path(&self, path: &Path) -> Option<&Module> {
        self.get_id_by_path(path).and_then(|id| self.get(id))
    }

    pub fn entry(&self) -> Option<&Module> {
        self.get(ModuleId::ENTRY)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in id order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Module> + ExactSizeIterator {
        self.modules.iter()
    }

    pub(crate) fn modules_mut(&mut self) -> &mut [Module] {
        &mut self.modules
    }

    /// `(specifier, dependency id)` pairs of a module, in first-occurrence order.
    /// A dependency whose path is not registered yields `None`.
    pub fn dependency_ids<'a>(
        &'a self,
        module: &'a Module,
    ) -> impl Iterator<Item = (&'a str, Option<ModuleId>)> + 'a {
        module
            .dependencies
            .iter()
            .map(|(specifier, path)| (specifier.as_str(), self.get_id_by_path(path)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn deps(pairs: &[(&str, &str)]) -> FxIndexMap<String, PathBuf> {
        pairs
            .iter()
            .map(|(specifier, path)| ((*specifier).to_owned(), PathBuf::from(path)))
            .collect()
    }

    #[test]
    fn test_ids_are_dense_and_paths_unique() {
        let mut table = ModuleTable::new();
        let a = table.add_module(
            PathBuf::from("/app/a.js"),
            Arc::from("require('./b')"),
            deps(&[("./b", "/app/b.js")]),
        );
        let b = table.add_module(
            PathBuf::from("/app/b.js"),
            Arc::from("module.exports = 1"),
            deps(&[]),
        );
        let again = table.add_module(
            PathBuf::from("/app/a.js"),
            Arc::from("different"),
            deps(&[]),
        );

        assert_eq!(a, ModuleId::ENTRY);
        assert_eq!(b, ModuleId::new(1));
        assert_eq!(again, a);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(a).map(|m| m.raw_source.as_ref()),
            Some("require('./b')")
        );
        assert!(table.entry().is_some_and(Module::is_entry));
        assert_eq!(table.get_id_by_path(Path::new("/app/b.js")), Some(b));
        assert_eq!(table.get(ModuleId::new(2)).map(|m| m.id), None);
    }

    #[test]
    fn test_dependency_ids_follow_paths() {
        let mut table = ModuleTable::new();
        table.add_module(
            PathBuf::from("/app/a.js"),
            Arc::from(""),
            deps(&[("./b", "/app/b.js"), ("./missing", "/app/missing.js")]),
        );
        table.add_module(PathBuf::from("/app/b.js"), Arc::from(""), deps(&[]));

        let entry = table.entry().expect("entry module");
        let ids: Vec<_> = table.dependency_ids(entry).collect();
        assert_eq!(
            ids,
            vec![("./b", Some(ModuleId::new(1))), ("./missing", None)]
        );
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let mut table = ModuleTable::new();
        let id = table.add_module(PathBuf::from("/app/a.js"), Arc::from(""), deps(&[]));
        assert_eq!(
            table.get(id).map(|m| m.content_hash.as_str()),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn test_module_id_display() {
        assert_eq!(ModuleId::new(42).to_string(), "42");
        assert_eq!(ModuleId::ENTRY.as_u32(), 0);
    }
}
