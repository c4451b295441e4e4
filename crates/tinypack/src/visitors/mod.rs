//! Source visitors for Tinypack
//!
//! Visitors walk a module's token stream to collect the information the
//! graph builder and the serializer need, without building a full syntax tree.

mod import_discovery;

pub use import_discovery::{
    DiscoveredImport, ImportDiscoveryVisitor, ImportKind, discover_imports, unique_specifiers,
};
