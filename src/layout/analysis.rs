//! Dependency analysis and layer assignment.
//!
//! A table depends on every table its foreign keys point at. Layer 0 holds
//! tables without dependencies; any other table sits one layer past its
//! deepest dependency.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::topology::{Relationship, SchemaTopology};

use super::types::CycleFallback;

/// Foreign-key dependencies between the visible tables of a topology.
#[derive(Debug, Default)]
pub struct DependencyGraph<'a> {
    /// Visible tables in declaration order.
    pub order: Vec<&'a str>,
    /// Table -> visible FK targets, deduplicated, in column order.
    pub targets: HashMap<&'a str, Vec<&'a str>>,
    /// Tables with at least one FK pointing at a hidden table.
    pub hidden_targets: HashSet<&'a str>,
}

impl<'a> DependencyGraph<'a> {
    pub fn targets_of(&self, table: &str) -> &[&'a str] {
        self.targets.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Build the dependency graph of all tables not in `hidden`.
/// Self references do not create dependencies.
pub fn build_dependency_graph<'a>(
    topology: &'a SchemaTopology,
    hidden: &BTreeSet<String>,
) -> DependencyGraph<'a> {
    let mut graph = DependencyGraph::default();

    for table in topology.tables() {
        if !hidden.contains(&table.name) {
            graph.order.push(table.name.as_str());
            graph.targets.insert(table.name.as_str(), Vec::new());
        }
    }

    for rel in topology.relationships() {
        if rel.is_self_reference() {
            continue;
        }
        let Some(targets) = graph.targets.get_mut(rel.from.table.as_str()) else {
            continue;
        };
        if hidden.contains(&rel.to.table) {
            graph.hidden_targets.insert(rel.from.table.as_str());
        } else if !targets.contains(&rel.to.table.as_str()) {
            targets.push(rel.to.table.as_str());
        }
    }

    graph
}

enum Mark {
    Visiting,
    Done(usize),
}

struct LayerSolver<'g, 'a> {
    graph: &'g DependencyGraph<'a>,
    marks: HashMap<&'a str, Mark>,
    max_depth: usize,
    fallback: CycleFallback,
}

impl<'g, 'a> LayerSolver<'g, 'a> {
    fn visit(&mut self, table: &'a str, depth: usize) -> Option<usize> {
        match self.marks.get(table) {
            Some(Mark::Done(layer)) => return Some(*layer),
            // Back edge: the dependency is ignored, breaking the cycle
            Some(Mark::Visiting) => return None,
            None => {}
        }

        if depth > self.max_depth {
            let layer = self.fallback_layer(table);
            self.marks.insert(table, Mark::Done(layer));
            return Some(layer);
        }

        self.marks.insert(table, Mark::Visiting);

        // A hidden target counts as a layer-0 dependency
        let mut layer = usize::from(self.graph.hidden_targets.contains(table));
        let graph = self.graph;
        for &target in graph.targets_of(table) {
            if let Some(target_layer) = self.visit(target, depth + 1) {
                layer = layer.max(target_layer + 1);
            }
        }

        self.marks.insert(table, Mark::Done(layer));
        Some(layer)
    }

    fn fallback_layer(&self, table: &str) -> usize {
        match self.fallback {
            CycleFallback::Ground => 0,
            CycleFallback::FirstResolvedDependency => self
                .graph
                .targets_of(table)
                .iter()
                .find_map(|t| match self.marks.get(t) {
                    Some(Mark::Done(layer)) => Some(*layer),
                    _ => None,
                })
                .unwrap_or(0),
        }
    }
}

/// Assign a layer to every table of the graph.
///
/// Tables are processed in declaration order, which decides the edge
/// dropped from each cycle. Recursion deeper than `max_depth` stops and
/// applies `fallback` to the table reached.
pub fn assign_layers<'a>(
    graph: &DependencyGraph<'a>,
    max_depth: usize,
    fallback: CycleFallback,
) -> HashMap<&'a str, usize> {
    let mut solver = LayerSolver {
        graph,
        marks: HashMap::new(),
        max_depth,
        fallback,
    };

    for &table in &graph.order {
        solver.visit(table, 0);
    }

    solver
        .marks
        .into_iter()
        .filter_map(|(table, mark)| match mark {
            Mark::Done(layer) => Some((table, layer)),
            Mark::Visiting => None,
        })
        .collect()
}

/// Relationships between layered tables where the source is not drawn
/// after its target.
pub fn find_broken_edges(
    topology: &SchemaTopology,
    layers: &HashMap<&str, usize>,
) -> Vec<Relationship> {
    topology
        .relationships()
        .iter()
        .filter(|rel| !rel.is_self_reference())
        .filter(|rel| {
            match (
                layers.get(rel.from.table.as_str()),
                layers.get(rel.to.table.as_str()),
            ) {
                (Some(from), Some(to)) => from <= to,
                _ => false,
            }
        })
        .cloned()
        .collect()
}
