//! Data structures for layout computation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::topology::Relationship;

/// A table card rectangle in diagram-space pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TablePosition {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl TablePosition {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Interiors intersect; touching edges do not count.
    pub fn overlaps(&self, other: &TablePosition) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

/// How a table is layered once the recursion depth cap is hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleFallback {
    /// Share the layer of the first dependency that already has one.
    #[default]
    FirstResolvedDependency,
    /// Drop to layer 0.
    Ground,
}

/// The complete layout result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    pub positions: BTreeMap<String, TablePosition>,
    pub layers: BTreeMap<String, usize>,
    /// Relationships between visible tables drawn against dependency order
    /// (cycle-broken or depth-capped). Self references are not listed.
    pub broken_edges: Vec<Relationship>,
    pub width: f64,
    pub height: f64,
}
