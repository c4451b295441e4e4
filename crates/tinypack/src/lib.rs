//! tinypack: bundle a graph of CommonJS modules into one self-contained script
//!
//! Pipeline: [`graph_builder`] discovers modules breadth-first from the entry
//! file through [`resolver`], [`transform`] runs every module through the
//! configured transformer in parallel, [`code_generator`] rewrites `require`
//! calls to module ids and wraps them for the embedded runtime, and
//! [`output`] minifies and writes the result. [`orchestrator`] drives a run.

pub mod analysis;
pub mod code_generator;
pub mod config;
pub mod error;
pub mod file_index;
pub mod graph_builder;
pub mod js_lexer;
pub mod module_registry;
pub mod orchestrator;
pub mod output;
pub mod resolver;
pub mod transform;
pub mod util;
pub mod visitors;

pub use error::{BundleError, Result};
pub use orchestrator::{BundleOrchestrator, BundleOutput};
