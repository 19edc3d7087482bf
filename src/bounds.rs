//! Bounding regions for schema namespaces and domain groups.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::layout::TablePosition;
use crate::topology::{SchemaTopology, Table};

pub const DEFAULT_BOUNDS_PADDING: f64 = 24.0;

/// Padded rectangle enclosing every visible member of a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl GroupBounds {
    pub fn contains_rect(&self, other: &GroupBounds) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.x + self.width >= other.x + other.width
            && self.y + self.height >= other.y + other.height
    }
}

/// Running min/max over the cards folded in so far.
#[derive(Debug, Clone, Copy)]
struct Extent {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Extent {
    fn of(position: &TablePosition) -> Self {
        Self {
            min_x: position.x,
            min_y: position.y,
            max_x: position.right(),
            max_y: position.bottom(),
        }
    }

    fn include(&mut self, position: &TablePosition) {
        self.min_x = self.min_x.min(position.x);
        self.min_y = self.min_y.min(position.y);
        self.max_x = self.max_x.max(position.right());
        self.max_y = self.max_y.max(position.bottom());
    }

    fn padded(&self, padding: f64) -> GroupBounds {
        GroupBounds {
            x: self.min_x - padding,
            y: self.min_y - padding,
            width: self.max_x - self.min_x + padding * 2.0,
            height: self.max_y - self.min_y + padding * 2.0,
        }
    }
}

/// Fold every visible, positioned table into the extent of its group.
/// Tables for which `group_of` returns `None` are skipped.
pub fn compute_group_bounds<F>(
    topology: &SchemaTopology,
    positions: &BTreeMap<String, TablePosition>,
    hidden: &BTreeSet<String>,
    padding: f64,
    group_of: F,
) -> BTreeMap<String, GroupBounds>
where
    F: Fn(&Table) -> Option<&str>,
{
    let mut extents: BTreeMap<&str, Extent> = BTreeMap::new();

    for table in topology.tables() {
        if hidden.contains(&table.name) {
            continue;
        }
        let Some(position) = positions.get(&table.name) else {
            continue;
        };
        let Some(group) = group_of(table) else {
            continue;
        };
        extents
            .entry(group)
            .and_modify(|extent| extent.include(position))
            .or_insert_with(|| Extent::of(position));
    }

    extents
        .into_iter()
        .map(|(group, extent)| (group.to_string(), extent.padded(padding)))
        .collect()
}

fn schema_of(table: &Table) -> Option<&str> {
    Some(table.schema.as_str())
}

fn domain_of(table: &Table) -> Option<&str> {
    table.domain.as_deref()
}

pub fn compute_schema_bounds(
    topology: &SchemaTopology,
    positions: &BTreeMap<String, TablePosition>,
    hidden: &BTreeSet<String>,
    padding: f64,
) -> BTreeMap<String, GroupBounds> {
    compute_group_bounds(topology, positions, hidden, padding, schema_of)
}

pub fn compute_domain_bounds(
    topology: &SchemaTopology,
    positions: &BTreeMap<String, TablePosition>,
    hidden: &BTreeSet<String>,
    padding: f64,
) -> BTreeMap<String, GroupBounds> {
    compute_group_bounds(topology, positions, hidden, padding, domain_of)
}
