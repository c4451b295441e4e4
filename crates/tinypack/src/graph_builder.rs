//! Graph builder that discovers the module graph breadth-first from the entry
//! file and records it in a ModuleTable

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, trace};
use rustc_hash::FxHashSet;

use crate::{
    error::{BundleError, Result},
    file_index::FileIndex,
    module_registry::{FxIndexMap, ModuleTable},
    resolver::ModuleResolver,
    visitors::{discover_imports, unique_specifiers},
};

/// Traversal state confined to one `build` call
#[derive(Debug, Default)]
struct TraversalState {
    queue: VecDeque<PathBuf>,
    visited: FxHashSet<PathBuf>,
    table: ModuleTable,
}

/// Builds a ModuleTable from an entry file
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    index: &'a dyn FileIndex,
    resolver: ModuleResolver<'a>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(index: &'a dyn FileIndex, extensions: Vec<String>) -> Self {
        Self {
            index,
            resolver: ModuleResolver::new(index, extensions),
        }
    }

    /// Discover every module reachable from `entry`.
    ///
    /// Ids are assigned in dequeue order of a FIFO queue, so the entry is `0`
    /// and the numbering is first-discovery order. Any read or resolution
    /// failure aborts the build and discards the partial table.
    pub fn build(&mut self, entry: &Path) -> Result<ModuleTable> {
        let entry = self
            .index
            .canonicalize(entry)
            .ok_or_else(|| BundleError::EntryNotFound {
                path: entry.to_path_buf(),
            })?;

        let mut state = TraversalState::default();
        state.queue.push_back(entry);

        while let Some(path) = state.queue.pop_front() {
            if !state.visited.insert(path.clone()) {
                continue;
            }
            self.process_module(path, &mut state)?;
        }

        debug!("Discovered {} modules", state.table.len());
        Ok(state.table)
    }

    fn process_module(&mut self, path: PathBuf, state: &mut TraversalState) -> Result<()> {
        let source = self
            .index
            .read_file(&path)
            .map_err(|source| BundleError::Read {
                path: path.clone(),
                source,
            })?;

        let imports = discover_imports(&source);
        let mut dependencies = FxIndexMap::default();
        for specifier in unique_specifiers(&imports) {
            let resolved = self.resolver.resolve(&path, &specifier)?;
            trace!("{} -> '{specifier}' -> {}", path.display(), resolved.display());
            if !state.visited.contains(&resolved) {
                state.queue.push_back(resolved.clone());
            }
            dependencies.insert(specifier, resolved);
        }

        let dependency_count = dependencies.len();
        let id = state
            .table
            .add_module(path.clone(), Arc::from(source), dependencies);
        debug!(
            "Assigned id {id} to {} ({dependency_count} dependencies)",
            path.display()
        );
        Ok(())
    }
}
