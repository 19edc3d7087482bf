//! Dependency-aware layered layout.
//!
//! Visible tables are arranged left to right by foreign-key depth: a table
//! always sits in a later layer than the tables it references, cycles and
//! depth-capped chains aside. Within a layer tables are stacked in name order.

mod analysis;
mod engine;
mod placement;
mod types;

pub use analysis::{DependencyGraph, assign_layers, build_dependency_graph, find_broken_edges};
pub use engine::LayoutEngine;
pub use types::{CycleFallback, Layout, TablePosition};
