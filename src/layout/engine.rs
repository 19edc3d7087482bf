//! Layout engine core implementation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use crate::measure::TextMetrics;
use crate::topology::{SchemaTopology, Table};

use super::analysis::{assign_layers, build_dependency_graph, find_broken_edges};
use super::placement::{
    GridSpacing, group_tables_by_layer, layout_extent, place_tables, resolve_overlap,
};
use super::types::{CycleFallback, Layout, TablePosition};

/// Layout engine configuration and computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutEngine {
    pub metrics: TextMetrics,
    pub origin_x: f64,
    pub origin_y: f64,
    /// Fixed width of a layer column; wider cards are clamped to it.
    pub column_width: f64,
    pub gap_x: f64,
    pub vertical_spacing: f64,
    pub gap_y: f64,
    /// Recursion cap for layer assignment.
    pub max_depth: usize,
    pub cycle_fallback: CycleFallback,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            metrics: TextMetrics::default(),
            origin_x: 40.0,
            origin_y: 40.0,
            column_width: 280.0,
            gap_x: 120.0,
            vertical_spacing: 200.0,
            gap_y: 40.0,
            max_depth: 64,
            cycle_fallback: CycleFallback::default(),
        }
    }
}

impl LayoutEngine {
    /// Distance between the left edges of adjacent layers.
    pub fn horizontal_spacing(&self) -> f64 {
        self.column_width + self.gap_x
    }

    pub fn card_size(&self, table: &Table) -> (f64, f64) {
        let (w, h) = self.metrics.card_size(table);
        (w.min(self.column_width), h)
    }

    fn spacing(&self) -> GridSpacing {
        GridSpacing {
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            horizontal: self.horizontal_spacing(),
            vertical: self.vertical_spacing,
            gap_y: self.gap_y,
        }
    }

    /// Compute positions for every table not in `hidden`.
    pub fn layout(&self, topology: &SchemaTopology, hidden: &BTreeSet<String>) -> Layout {
        // Phase 1: Dependency analysis
        let graph = build_dependency_graph(topology, hidden);
        let layers = assign_layers(&graph, self.max_depth, self.cycle_fallback);
        let broken_edges = find_broken_edges(topology, &layers);

        // Phase 2: Card sizing
        let card_sizes: HashMap<&str, (f64, f64)> = graph
            .order
            .iter()
            .filter_map(|&name| topology.table(name).map(|t| (name, self.card_size(t))))
            .collect();

        // Phase 3: Placement
        let grouped = group_tables_by_layer(&layers);
        let positions = place_tables(&grouped, &card_sizes, &self.spacing());
        let (width, height) = layout_extent(positions.values(), self.origin_x, self.origin_y);

        debug!(
            tables = positions.len(),
            layers = grouped.len(),
            broken_edges = broken_edges.len(),
            "computed layout"
        );

        Layout {
            positions,
            layers: layers
                .into_iter()
                .map(|(name, layer)| (name.to_string(), layer))
                .collect(),
            broken_edges,
            width,
            height,
        }
    }

    /// Computed positions with manual positions taking precedence.
    /// Overrides for hidden or unknown tables are ignored.
    pub fn layout_with_overrides(
        &self,
        topology: &SchemaTopology,
        hidden: &BTreeSet<String>,
        overrides: &BTreeMap<String, TablePosition>,
    ) -> BTreeMap<String, TablePosition> {
        let mut positions = self.layout(topology, hidden).positions;
        for (name, position) in positions.iter_mut() {
            if let Some(manual) = overrides.get(name) {
                *position = *manual;
            }
        }
        positions
    }

    /// Positions for the visible tables that have none in `placed`.
    ///
    /// Each new card starts at its computed default and moves down until it
    /// clears every card already placed, so existing cards never move.
    /// Hidden tables keep their slot: a card placed while they are hidden
    /// stays clear of the spot they return to.
    pub fn place_missing(
        &self,
        topology: &SchemaTopology,
        hidden: &BTreeSet<String>,
        placed: &BTreeMap<String, TablePosition>,
    ) -> BTreeMap<String, TablePosition> {
        let defaults = self.layout(topology, hidden).positions;
        let mut occupied: Vec<TablePosition> = placed
            .iter()
            .filter(|(name, _)| topology.contains(name))
            .map(|(_, position)| *position)
            .collect();
        let mut added = BTreeMap::new();

        for table in topology.tables() {
            let Some(default) = defaults.get(&table.name) else {
                continue;
            };
            if placed.contains_key(&table.name) {
                continue;
            }
            let position = resolve_overlap(*default, occupied.iter(), self.gap_y);
            occupied.push(position);
            added.insert(table.name.clone(), position);
        }

        if !added.is_empty() {
            debug!(tables = added.len(), "placed newly visible tables");
        }
        added
    }
}
