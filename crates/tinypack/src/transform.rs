//! Per-module source transformation
//!
//! Every module's raw source goes through the configured [`Transformer`]
//! exactly once before serialization. Modules are independent, so the stage
//! fans out across a rayon pool; the first failure aborts the run.

use std::path::Path;

use anyhow::Result as AnyResult;
use cow_utils::CowUtils;
use log::{trace, warn};
use rayon::prelude::*;

use crate::{
    error::{BundleError, Result},
    module_registry::ModuleTable,
    util::run_filter,
};

/// Placeholder in a transform command that is replaced by the module path
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Source-to-source transformation applied to each module.
///
/// Implementations must keep the quoted specifier of every `require` call
/// intact so the serializer can still find it. A transformer that lowers ES
/// module syntax is expected to emit `require("<same specifier>")`.
pub trait Transformer: Send + Sync + std::fmt::Debug {
    fn transform(&self, source: &str, path: &Path) -> AnyResult<String>;
}

/// Identity transformer, used when no transform command is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTransformer;

impl Transformer for PassthroughTransformer {
    fn transform(&self, source: &str, _path: &Path) -> AnyResult<String> {
        Ok(source.to_owned())
    }
}

/// Pipes each module through an external command (source on stdin, result on
/// stdout). Arguments equal to or containing `{path}` get the module path.
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    command: Vec<String>,
}

impl CommandTransformer {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn command_for(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        self.command
            .iter()
            .map(|arg| arg.cow_replace(PATH_PLACEHOLDER, &path).into_owned())
            .collect()
    }
}

impl Transformer for CommandTransformer {
    fn transform(&self, source: &str, path: &Path) -> AnyResult<String> {
        run_filter(&self.command_for(path), source)
    }
}

/// Transform every module in `table`, storing the result in
/// `transformed_source`.
///
/// `jobs` is the worker count; `0` lets rayon pick one per CPU. On failure no
/// module is guaranteed to have been transformed and the table must not be
/// serialized.
pub fn transform_modules(
    table: &mut ModuleTable,
    transformer: &dyn Transformer,
    jobs: usize,
) -> Result<()> {
    let run = |table: &mut ModuleTable| -> Result<()> {
        table.modules_mut().par_iter_mut().try_for_each(|module| -> Result<()> {
            let transformed = transformer
                .transform(&module.raw_source, &module.path)
                .map_err(|e| BundleError::Transform {
                    module: module.path.clone(),
                    message: format!("{e:#}"),
                })?;
            trace!(
                "Transformed {} ({} -> {} bytes)",
                module.path.display(),
                module.raw_source.len(),
                transformed.len()
            );
            module.transformed_source = Some(transformed);
            Ok(())
        })
    };

    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| run(table)),
        Err(e) => {
            warn!("Cannot build a {jobs}-thread transform pool ({e}), using the global pool");
            run(table)
        }
    }
}
