//! One bundling run, from entry file to artifact

use std::path::Path;

use log::{debug, info};

use crate::{
    analysis::{Cycle, find_cycles},
    code_generator::{Bundle, serialize},
    config::Config,
    error::{BundleError, Result},
    file_index::{FileIndex, FsFileIndex},
    graph_builder::GraphBuilder,
    module_registry::ModuleTable,
    output::{CommandMinifier, Manifest, Minifier, minify_bundle, write_bundle},
    transform::{CommandTransformer, PassthroughTransformer, Transformer, transform_modules},
    util::absolutize,
};

/// Everything a successful run produced
#[derive(Debug)]
pub struct BundleOutput {
    pub table: ModuleTable,
    /// Unminified bundle and module spans
    pub bundle: Bundle,
    pub cycles: Vec<Cycle>,
    /// Final artifact text, minified when minification is on
    pub code: String,
    pub map: Option<String>,
}

impl BundleOutput {
    pub fn manifest(&self) -> Manifest {
        Manifest::new(&self.table, &self.bundle, &self.cycles)
    }
}

#[derive(Debug)]
pub struct BundleOrchestrator {
    config: Config,
    transformer: Box<dyn Transformer>,
    minifier: Box<dyn Minifier>,
}

impl BundleOrchestrator {
    /// Collaborators come from `config`: the transform command when one is
    /// set (passthrough otherwise) and the minify command
    pub fn new(config: Config) -> Self {
        let transformer: Box<dyn Transformer> = match &config.transform_command {
            Some(command) => Box::new(CommandTransformer::new(command.clone())),
            None => Box::new(PassthroughTransformer),
        };
        let minifier = Box::new(CommandMinifier::new(config.minify_command.clone()));
        Self {
            config,
            transformer,
            minifier,
        }
    }

    #[must_use]
    pub fn with_transformer(mut self, transformer: Box<dyn Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    #[must_use]
    pub fn with_minifier(mut self, minifier: Box<dyn Minifier>) -> Self {
        self.minifier = minifier;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Crawl the configured roots and bundle `entry`
    pub fn bundle(&self, entry: &Path) -> Result<BundleOutput> {
        let entry = absolutize(entry);
        if !entry.is_file() {
            return Err(BundleError::EntryNotFound { path: entry });
        }

        let working_dir = absolutize(Path::new("."));
        let roots = self.config.crawl_roots(&entry, &working_dir);
        debug!("Crawl roots: {roots:?}");
        let index = FsFileIndex::crawl(&roots, &self.config.extensions, &self.config.exclude)
            .map_err(|source| BundleError::Read {
                path: roots.first().cloned().unwrap_or_else(|| working_dir.clone()),
                source,
            })?;
        info!("Indexed {} source files", index.len());

        self.bundle_with_index(&index, &entry)
    }

    /// Build, transform, serialize and optionally minify, reading sources from `index`
    pub fn bundle_with_index(&self, index: &dyn FileIndex, entry: &Path) -> Result<BundleOutput> {
        let mut table = GraphBuilder::new(index, self.config.extensions.clone()).build(entry)?;
        info!("Discovered {} modules", table.len());

        let cycles = find_cycles(&table);
        for cycle in &cycles {
            let paths: Vec<String> = cycle
                .iter()
                .filter_map(|id| table.get(*id))
                .map(|module| module.path.display().to_string())
                .collect();
            info!("Circular dependency: {}", paths.join(" <-> "));
        }

        transform_modules(&mut table, self.transformer.as_ref(), self.config.jobs)?;
        info!("Transformed {} modules", table.len());

        let bundle = serialize(&table)?;
        info!("Serialized bundle ({} bytes)", bundle.code.len());

        let (code, map) = if self.config.minify {
            let minified = minify_bundle(&bundle, self.minifier.as_ref(), None)?;
            (minified.code, minified.map)
        } else {
            (bundle.code.clone(), None)
        };

        Ok(BundleOutput {
            table,
            bundle,
            cycles,
            code,
            map,
        })
    }

    /// Write the artifact (and its source map, if any) to `path`
    pub fn write(&self, output: &BundleOutput, path: &Path) -> Result<()> {
        write_bundle(path, &output.code, output.map.as_deref())?;
        info!("Wrote {}", path.display());
        Ok(())
    }

    pub fn write_manifest(&self, output: &BundleOutput, path: &Path) -> Result<()> {
        output.manifest().write(path)?;
        info!("Wrote manifest {}", path.display());
        Ok(())
    }
}
