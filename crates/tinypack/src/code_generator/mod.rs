//! Bundle serialization
//!
//! Each module body is rewritten so its `require` calls name module ids, then
//! wrapped in a `__tinypack_define(id, factory)` registration. Registrations
//! follow the embedded loader runtime and precede the entry invocation.

pub mod bundler;
pub mod rewriter;
pub mod runtime;

pub use bundler::{Bundle, ModuleSpan, serialize};
pub use rewriter::rewrite_requires;
