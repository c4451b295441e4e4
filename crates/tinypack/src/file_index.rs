//! File index collaborator
//!
//! The bundler never walks the file system itself. It asks a [`FileIndex`]
//! whether a candidate path exists, for the canonical form of that path, and
//! for file contents. [`FsFileIndex`] crawls real directories once up front;
//! [`MemoryFileIndex`] serves an in-memory project.

use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use log::{debug, warn};
use rustc_hash::{FxHashSet, FxHasher};
use walkdir::WalkDir;

use crate::util::{absolutize, normalize_path};

type FxIndexMap<K, V> = IndexMap<K, V, std::hash::BuildHasherDefault<FxHasher>>;

pub trait FileIndex: Send + Sync + std::fmt::Debug {
    /// Canonical path of an indexed file, or `None` if the index has no such file
    fn canonicalize(&self, path: &Path) -> Option<PathBuf>;

    /// Read the full contents of an indexed file
    fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Every indexed file, sorted
    fn all_files(&self) -> Vec<PathBuf>;

    fn exists(&self, path: &Path) -> bool {
        self.canonicalize(path).is_some()
    }
}

/// File index backed by a one-time crawl of real directories
#[derive(Debug, Default)]
pub struct FsFileIndex {
    files: FxHashSet<PathBuf>,
}

impl FsFileIndex {
    /// Crawl `roots`, keeping files whose name ends with one of `extensions`
    /// and skipping directories named in `exclude`
    pub fn crawl(roots: &[PathBuf], extensions: &[String], exclude: &[String]) -> io::Result<Self> {
        let mut files = FxHashSet::default();

        for root in roots {
            let root = root.canonicalize().map_err(|e| {
                io::Error::new(e.kind(), format!("cannot crawl {}: {e}", root.display()))
            })?;
            debug!("Crawling {}", root.display());

            let walker = WalkDir::new(&root).follow_links(true).into_iter();
            for entry in walker.filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !is_excluded(entry.file_name(), exclude)
            }) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping unreadable entry while crawling: {e}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() || !has_extension(entry.path(), extensions) {
                    continue;
                }
                let path = entry
                    .path()
                    .canonicalize()
                    .unwrap_or_else(|_| entry.path().to_path_buf());
                files.insert(path);
            }
        }

        debug!("Indexed {} files", files.len());
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_excluded(name: &OsStr, exclude: &[String]) -> bool {
    name.to_str()
        .is_some_and(|name| exclude.iter().any(|excluded| excluded == name))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(OsStr::to_str) else {
        return false;
    };
    extensions.iter().any(|ext| name.ends_with(ext.as_str()))
}

impl FileIndex for FsFileIndex {
    fn canonicalize(&self, path: &Path) -> Option<PathBuf> {
        let candidate = absolutize(path);
        if self.files.contains(&candidate) {
            return Some(candidate);
        }
        // Symlinked directories: the crawl stored the resolved path
        let resolved = candidate.canonicalize().ok()?;
        self.files.contains(&resolved).then_some(resolved)
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn all_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self.files.iter().cloned().collect();
        files.sort();
        files
    }
}

/// File index holding sources in memory, keyed by normalized absolute path
#[derive(Debug, Default, Clone)]
pub struct MemoryFileIndex {
    files: FxIndexMap<PathBuf, String>,
}

impl MemoryFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
        self.files
            .insert(Self::key(path.as_ref()), source.into());
    }

    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    fn key(path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&Path::new("/").join(path))
        }
    }
}

impl FileIndex for MemoryFileIndex {
    fn canonicalize(&self, path: &Path) -> Option<PathBuf> {
        let key = Self::key(path);
        self.files.contains_key(&key).then_some(key)
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files.get(&Self::key(path)).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not in the file index", path.display()),
            )
        })
    }

    fn all_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self.files.keys().cloned().collect();
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::TempDir;

    use super::*;

    fn js_extensions() -> Vec<String> {
        vec![".js".to_owned(), ".mjs".to_owned()]
    }

    #[test]
    fn test_crawl_filters_extensions_and_excluded_dirs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/nested"))?;
        fs::create_dir_all(root.join("node_modules/pkg"))?;
        fs::write(root.join("src/a.js"), "")?;
        fs::write(root.join("src/nested/b.mjs"), "")?;
        fs::write(root.join("src/readme.md"), "")?;
        fs::write(root.join("node_modules/pkg/index.js"), "")?;

        let index = FsFileIndex::crawl(
            &[root.to_path_buf()],
            &js_extensions(),
            &["node_modules".to_owned()],
        )?;

        let canonical_root = root.canonicalize()?;
        assert_eq!(
            index.all_files(),
            vec![
                canonical_root.join("src/a.js"),
                canonical_root.join("src/nested/b.mjs"),
            ]
        );
        assert!(index.exists(&root.join("src/./nested/../a.js")));
        assert!(!index.exists(&root.join("src/readme.md")));
        assert!(!index.exists(&root.join("node_modules/pkg/index.js")));
        Ok(())
    }

    #[test]
    fn test_crawl_missing_root_fails() {
        let result = FsFileIndex::crawl(
            &[PathBuf::from("/definitely/not/here")],
            &js_extensions(),
            &[],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_index_normalizes_keys() -> Result<()> {
        let index = MemoryFileIndex::new()
            .with_file("/app/a.js", "require('./b')")
            .with_file("app/lib/../b.js", "module.exports = 1");

        assert_eq!(
            index.canonicalize(Path::new("/app/./b.js")),
            Some(PathBuf::from("/app/b.js"))
        );
        assert_eq!(index.read_file(Path::new("/app/a.js"))?, "require('./b')");
        assert!(index.read_file(Path::new("/app/c.js")).is_err());
        assert!(!index.exists(Path::new("/app/c.js")));
        Ok(())
    }
}
