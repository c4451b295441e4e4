//! Output stage: optional minification, atomic writes and the build manifest

use std::{
    ffi::OsString,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result as AnyResult;
use log::debug;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::{
    analysis::Cycle,
    code_generator::{Bundle, ModuleSpan},
    error::{BundleError, Result},
    module_registry::{FxIndexMap, ModuleId, ModuleTable},
    util::run_filter,
};

/// Minifier result. `map` is a source map for `code`, when the minifier makes one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifyOutput {
    pub code: String,
    pub map: Option<String>,
}

pub trait Minifier: Send + Sync + std::fmt::Debug {
    /// Minify a serialized bundle. `modules` gives each module's line range
    /// in `code` for minifiers that map output back to module boundaries.
    fn minify(&self, code: &str, modules: &[ModuleSpan]) -> AnyResult<MinifyOutput>;
}

/// Runs an external minifier over stdin/stdout; produces no source map
#[derive(Debug, Clone)]
pub struct CommandMinifier {
    command: Vec<String>,
}

impl CommandMinifier {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Minifier for CommandMinifier {
    fn minify(&self, code: &str, _modules: &[ModuleSpan]) -> AnyResult<MinifyOutput> {
        Ok(MinifyOutput {
            code: run_filter(&self.command, code)?,
            map: None,
        })
    }
}

/// Minify `bundle`. Failures are attributed to `destination`, or to `<stdout>`.
pub fn minify_bundle(
    bundle: &Bundle,
    minifier: &dyn Minifier,
    destination: Option<&Path>,
) -> Result<MinifyOutput> {
    let output = minifier
        .minify(&bundle.code, &bundle.modules)
        .map_err(|e| BundleError::OutputWrite {
            path: destination.map_or_else(|| PathBuf::from("<stdout>"), Path::to_path_buf),
            message: format!("minifier failed: {e:#}"),
        })?;
    debug!(
        "Minified bundle from {} to {} bytes",
        bundle.code.len(),
        output.code.len()
    );
    Ok(output)
}

/// `<path>.map`
pub fn source_map_path(path: &Path) -> PathBuf {
    let mut map_path = OsString::from(path.as_os_str());
    map_path.push(".map");
    PathBuf::from(map_path)
}

/// Write `contents` to `path` through a temporary file in the same
/// directory, so `path` either keeps its old contents or gets all of the new
/// ones. Missing parent directories are created.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let output_error = |message: String| BundleError::OutputWrite {
        path: path.to_path_buf(),
        message,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| output_error(format!("cannot create {}: {e}", parent.display())))?;

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| output_error(format!("cannot create temporary file: {e}")))?;
    temp.write_all(contents.as_bytes())
        .and_then(|()| temp.flush())
        .map_err(|e| output_error(e.to_string()))?;
    temp.persist(path)
        .map_err(|e| output_error(e.error.to_string()))?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Write the bundle and, when present, its source map next to it
pub fn write_bundle(path: &Path, code: &str, map: Option<&str>) -> Result<()> {
    write_atomic(path, code)?;
    if let Some(map) = map {
        write_atomic(&source_map_path(path), map)?;
    }
    Ok(())
}

/// Machine-readable description of a build
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub entry: PathBuf,
    /// Module ids of each dependency cycle
    pub cycles: Vec<Cycle>,
    /// In id order
    pub modules: Vec<ManifestModule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestModule {
    pub id: ModuleId,
    pub path: PathBuf,
    pub hash: String,
    /// Line range of the registration in the unminified bundle
    pub start_line: usize,
    pub end_line: usize,
    /// Specifier as written -> module id
    pub dependencies: FxIndexMap<String, ModuleId>,
}

impl Manifest {
    pub fn new(table: &ModuleTable, bundle: &Bundle, cycles: &[Cycle]) -> Self {
        let modules = table
            .iter()
            .map(|module| {
                let (start_line, end_line) = bundle
                    .span(module.id)
                    .map_or((0, 0), |span| (span.start_line, span.end_line));
                ManifestModule {
                    id: module.id,
                    path: module.path.clone(),
                    hash: module.content_hash.clone(),
                    start_line,
                    end_line,
                    dependencies: table
                        .dependency_ids(module)
                        .filter_map(|(specifier, id)| Some((specifier.to_owned(), id?)))
                        .collect(),
                }
            })
            .collect();

        Self {
            entry: table
                .entry()
                .map(|entry| entry.path.clone())
                .unwrap_or_default(),
            cycles: cycles.to_vec(),
            modules,
        }
    }

    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml().map_err(|e| BundleError::OutputWrite {
            path: path.to_path_buf(),
            message: format!("cannot serialize manifest: {e}"),
        })?;
        write_atomic(path, &contents)
    }
}
