//! Error taxonomy for a bundling run
//!
//! Every failure aborts the whole build. Variants carry the offending module
//! path (and specifier, where one is involved) so the message alone is enough
//! to locate the problem.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for bundling operations
pub type Result<T> = std::result::Result<T, BundleError>;

#[derive(Error, Debug)]
pub enum BundleError {
    /// The entry path is not present in the file index
    #[error("entry file not found: {}", path.display())]
    EntryNotFound { path: PathBuf },

    /// No candidate file exists for a relative specifier
    #[error("cannot resolve '{specifier}' imported from {}", module.display())]
    UnresolvedSpecifier { module: PathBuf, specifier: String },

    /// Bare package names, absolute paths and core modules are not bundled
    #[error(
        "unsupported specifier '{specifier}' in {}: only './' and '../' file specifiers can be \
         bundled",
        module.display()
    )]
    UnsupportedSpecifier { module: PathBuf, specifier: String },

    /// A module's source could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transformer rejected a module
    #[error("failed to transform {}: {message}", module.display())]
    Transform { module: PathBuf, message: String },

    /// A dependency has no rewritable call site in the transformed source
    #[error("failed to serialize {} (specifier '{specifier}'): {message}", module.display())]
    Serialization {
        module: PathBuf,
        specifier: String,
        message: String,
    },

    /// Writing the artifact, or minifying it, failed
    #[error("failed to write {}: {message}", path.display())]
    OutputWrite { path: PathBuf, message: String },

    /// A configuration file or environment override is invalid
    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl BundleError {
    /// The module the error is attributed to, if any
    pub fn module_path(&self) -> Option<&PathBuf> {
        match self {
            Self::UnresolvedSpecifier { module, .. }
            | Self::UnsupportedSpecifier { module, .. }
            | Self::Transform { module, .. }
            | Self::Serialization { module, .. } => Some(module),
            Self::Read { path, .. } => Some(path),
            Self::EntryNotFound { .. } | Self::OutputWrite { .. } | Self::Config { .. } => None,
        }
    }
}
