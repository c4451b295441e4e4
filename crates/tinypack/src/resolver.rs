use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::{
    error::{BundleError, Result},
    file_index::FileIndex,
    util::normalize_path,
};

/// How a specifier names its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `./x` or `../x`, resolved against the importing module's directory
    Relative,
    /// `/abs/x`
    Absolute,
    /// `lodash`, `node:fs`, `.` and anything else that is not a file specifier
    Bare,
}

impl SpecifierKind {
    pub fn classify(specifier: &str) -> Self {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            Self::Relative
        } else if specifier.starts_with('/') {
            Self::Absolute
        } else {
            Self::Bare
        }
    }
}

/// Maps `(importing module, specifier)` pairs to indexed files
#[derive(Debug)]
pub struct ModuleResolver<'a> {
    index: &'a dyn FileIndex,
    /// Probed in order when the specifier does not name an indexed file as written
    extensions: Vec<String>,
    /// Resolved paths keyed by (importing directory, specifier)
    cache: FxHashMap<(PathBuf, String), PathBuf>,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(index: &'a dyn FileIndex, extensions: Vec<String>) -> Self {
        Self {
            index,
            extensions,
            cache: FxHashMap::default(),
        }
    }

    /// Resolve `specifier` as written inside `from_module`
    ///
    /// Only relative file specifiers are bundled. The candidate path is tried
    /// as written first, then with each configured extension appended; the
    /// first indexed file wins. Directory index files are not considered.
    pub fn resolve(&mut self, from_module: &Path, specifier: &str) -> Result<PathBuf> {
        match SpecifierKind::classify(specifier) {
            SpecifierKind::Relative => {}
            SpecifierKind::Absolute | SpecifierKind::Bare => {
                return Err(BundleError::UnsupportedSpecifier {
                    module: from_module.to_path_buf(),
                    specifier: specifier.to_owned(),
                });
            }
        }

        let base_dir = from_module.parent().unwrap_or_else(|| Path::new("/"));
        let cache_key = (base_dir.to_path_buf(), specifier.to_owned());
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached.clone());
        }

        let candidate = normalize_path(&base_dir.join(specifier));
        // `./dir/` can only name a directory
        let found = if specifier.ends_with('/') {
            None
        } else {
            self.probe(&candidate)
        };
        let Some(resolved) = found else {
            debug!(
                "No file for '{specifier}' from {} (tried {} with {:?})",
                from_module.display(),
                candidate.display(),
                self.extensions
            );
            return Err(BundleError::UnresolvedSpecifier {
                module: from_module.to_path_buf(),
                specifier: specifier.to_owned(),
            });
        };

        trace!(
            "Resolved '{specifier}' from {} to {}",
            from_module.display(),
            resolved.display()
        );
        self.cache.insert(cache_key, resolved.clone());
        Ok(resolved)
    }

    fn probe(&self, candidate: &Path) -> Option<PathBuf> {
        if let Some(found) = self.index.canonicalize(candidate) {
            return Some(found);
        }
        self.extensions.iter().find_map(|ext| {
            let mut with_extension = OsString::from(candidate.as_os_str());
            with_extension.push(ext);
            self.index.canonicalize(Path::new(&with_extension))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::file_index::{FsFileIndex, MemoryFileIndex};

    fn extensions() -> Vec<String> {
        vec![".js".to_owned(), ".mjs".to_owned()]
    }

    fn project() -> MemoryFileIndex {
        MemoryFileIndex::new()
            .with_file("/app/src/main.js", "")
            .with_file("/app/src/util.js", "")
            .with_file("/app/src/util.mjs", "")
            .with_file("/app/src/only.mjs", "")
            .with_file("/app/src/data.v2.js", "")
            .with_file("/app/lib/shared.js", "")
    }

    #[test]
    fn test_relative_resolution_and_extension_order() -> Result<()> {
        let index = project();
        let mut resolver = ModuleResolver::new(&index, extensions());
        let main = Path::new("/app/src/main.js");

        assert_eq!(
            resolver.resolve(main, "./util")?,
            PathBuf::from("/app/src/util.js")
        );
        assert_eq!(
            resolver.resolve(main, "./only")?,
            PathBuf::from("/app/src/only.mjs")
        );
        assert_eq!(
            resolver.resolve(main, "./util.mjs")?,
            PathBuf::from("/app/src/util.mjs")
        );
        assert_eq!(
            resolver.resolve(main, "../lib/shared")?,
            PathBuf::from("/app/lib/shared.js")
        );
        assert_eq!(
            resolver.resolve(main, "./../src/./data.v2")?,
            PathBuf::from("/app/src/data.v2.js")
        );
        Ok(())
    }

    #[test]
    fn test_resolution_is_deterministic() -> Result<()> {
        let index = project();
        let mut resolver = ModuleResolver::new(&index, extensions());
        let main = Path::new("/app/src/main.js");
        let first = resolver.resolve(main, "./util")?;
        let second = resolver.resolve(main, "./util")?;
        assert_eq!(first, second);

        let mut fresh = ModuleResolver::new(&index, extensions());
        assert_eq!(fresh.resolve(main, "./util")?, first);
        Ok(())
    }

    #[test]
    fn test_unresolved_specifier() {
        let index = project();
        let mut resolver = ModuleResolver::new(&index, extensions());
        let main = Path::new("/app/src/main.js");

        for specifier in ["./missing", "./", "../src/"] {
            let err = resolver
                .resolve(main, specifier)
                .expect_err("specifier should not resolve");
            assert!(
                matches!(
                    &err,
                    BundleError::UnresolvedSpecifier { module, specifier: s }
                        if module == main && s == specifier
                ),
                "unexpected error for {specifier}: {err}"
            );
        }
    }

    #[test]
    fn test_unsupported_specifiers() {
        let index = project();
        let mut resolver = ModuleResolver::new(&index, extensions());
        let main = Path::new("/app/src/main.js");

        for specifier in ["lodash", "node:fs", "@scope/pkg", "/app/src/util.js", ".", ".."] {
            let err = resolver
                .resolve(main, specifier)
                .expect_err("specifier should be unsupported");
            assert!(
                matches!(err, BundleError::UnsupportedSpecifier { .. }),
                "unexpected error for {specifier}: {err}"
            );
        }
    }

    #[test]
    fn test_resolution_against_real_files() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/nested"))?;
        fs::write(root.join("src/main.js"), "")?;
        fs::write(root.join("src/nested/helper.js"), "")?;

        let index = FsFileIndex::crawl(&[root.to_path_buf()], &extensions(), &[])?;
        let mut resolver = ModuleResolver::new(&index, extensions());
        let main = root.join("src/main.js").canonicalize()?;

        assert_eq!(
            resolver.resolve(&main, "./nested/helper")?,
            root.join("src/nested/helper.js").canonicalize()?
        );
        Ok(())
    }
}
