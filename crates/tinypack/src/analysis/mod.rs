//! Diagnostics over the discovered module graph

pub mod circular_deps;

pub use circular_deps::{Cycle, find_cycles};
