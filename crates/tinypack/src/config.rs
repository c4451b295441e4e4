//! Layered configuration
//!
//! Precedence, lowest first: built-in defaults, the user config file
//! (`<config dir>/tinypack/tinypack.toml`), the project `tinypack.toml` (or an
//! explicit `--config` file), `TINYPACK_*` environment variables and finally
//! command line flags, which the binary applies on top of the loaded value.

use std::path::{Path, PathBuf};

use etcetera::BaseStrategy;
use log::debug;
use serde::Deserialize;

use crate::error::{BundleError, Result};

pub const PROJECT_CONFIG_FILE: &str = "tinypack.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Extensions probed, in order, when a specifier has none that matches;
    /// also the file index filter
    pub extensions: Vec<String>,
    /// Crawl roots for the file index; empty means working directory + entry directory
    pub roots: Vec<PathBuf>,
    /// Directory names skipped while crawling
    pub exclude: Vec<String>,
    /// Transform workers, 0 means one per CPU
    pub jobs: usize,
    /// External transformer, source on stdin and result on stdout
    pub transform_command: Option<Vec<String>>,
    /// External minifier, same protocol as the transformer
    pub minify_command: Vec<String>,
    pub minify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: [".js", ".mjs", ".cjs", ".jsx"]
                .into_iter()
                .map(String::from)
                .collect(),
            roots: Vec::new(),
            exclude: vec!["node_modules".to_owned(), ".git".to_owned()],
            jobs: 0,
            transform_command: None,
            minify_command: ["terser", "--compress", "--mangle"]
                .into_iter()
                .map(String::from)
                .collect(),
            minify: false,
        }
    }
}

/// One configuration layer as written in a TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
struct ConfigLayer {
    extensions: Option<Vec<String>>,
    roots: Option<Vec<PathBuf>>,
    exclude: Option<Vec<String>>,
    jobs: Option<usize>,
    transform_command: Option<Vec<String>>,
    minify_command: Option<Vec<String>>,
    minify: Option<bool>,
}

impl Config {
    /// Load defaults, config files and environment overrides
    pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<Self> {
        let user_config = Self::user_config_path();
        let mut config = Self::load_files(user_config.as_deref(), explicit, project_dir)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// `<config dir>/tinypack/tinypack.toml`, if a home directory can be determined
    pub fn user_config_path() -> Option<PathBuf> {
        let strategy = etcetera::choose_base_strategy().ok()?;
        Some(strategy.config_dir().join("tinypack").join(PROJECT_CONFIG_FILE))
    }

    /// Apply file layers over the defaults. The user file and the project file
    /// are optional; an explicit file replaces the project file and must exist.
    pub fn load_files(
        user_config: Option<&Path>,
        explicit: Option<&Path>,
        project_dir: &Path,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_config) = user_config
            && user_config.is_file()
        {
            config.apply_layer(read_layer(user_config)?, user_config);
        }

        match explicit {
            Some(path) => config.apply_layer(read_layer(path)?, path),
            None => {
                let project_config = project_dir.join(PROJECT_CONFIG_FILE);
                if project_config.is_file() {
                    config.apply_layer(read_layer(&project_config)?, &project_config);
                }
            }
        }

        Ok(config)
    }

    fn apply_layer(&mut self, layer: ConfigLayer, origin: &Path) {
        debug!("Applying configuration from {}", origin.display());
        // Relative roots are relative to the file that names them
        let base = origin.parent().unwrap_or_else(|| Path::new(""));

        if let Some(extensions) = layer.extensions {
            self.extensions = normalize_extensions(extensions);
        }
        if let Some(roots) = layer.roots {
            self.roots = roots.into_iter().map(|root| base.join(root)).collect();
        }
        if let Some(exclude) = layer.exclude {
            self.exclude = exclude;
        }
        if let Some(jobs) = layer.jobs {
            self.jobs = jobs;
        }
        if layer.transform_command.is_some() {
            self.transform_command = layer.transform_command;
        }
        if let Some(minify_command) = layer.minify_command {
            self.minify_command = minify_command;
        }
        if let Some(minify) = layer.minify {
            self.minify = minify;
        }
    }

    /// Apply `TINYPACK_EXTENSIONS`, `TINYPACK_JOBS` and `TINYPACK_MINIFY`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(extensions) = lookup("TINYPACK_EXTENSIONS") {
            self.extensions = normalize_extensions(
                extensions
                    .split(',')
                    .map(str::trim)
                    .filter(|ext| !ext.is_empty())
                    .map(String::from)
                    .collect(),
            );
        }
        if let Some(jobs) = lookup("TINYPACK_JOBS") {
            self.jobs = jobs.trim().parse().map_err(|e| BundleError::Config {
                path: PathBuf::from("$TINYPACK_JOBS"),
                message: format!("'{jobs}' is not a worker count: {e}"),
            })?;
        }
        if let Some(minify) = lookup("TINYPACK_MINIFY") {
            self.minify = match minify.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(BundleError::Config {
                        path: PathBuf::from("$TINYPACK_MINIFY"),
                        message: format!("'{other}' is not a boolean"),
                    });
                }
            };
        }
        Ok(())
    }

    /// Crawl roots for a bundling run of `entry`
    pub fn crawl_roots(&self, entry: &Path, working_dir: &Path) -> Vec<PathBuf> {
        if !self.roots.is_empty() {
            return self.roots.clone();
        }
        let mut roots = vec![working_dir.to_path_buf()];
        if let Some(entry_dir) = entry.parent()
            && !entry_dir.starts_with(working_dir)
        {
            roots.push(entry_dir.to_path_buf());
        }
        roots
    }
}

fn read_layer(path: &Path) -> Result<ConfigLayer> {
    let content = std::fs::read_to_string(path).map_err(|e| BundleError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    toml::from_str(&content).map_err(|e| BundleError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// `js` and `.js` both mean `.js`
fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    extensions
        .into_iter()
        .map(|ext| {
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{ext}")
            }
        })
        .collect()
}
