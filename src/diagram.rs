//! One diagram session: a topology, its layout engine and the interaction
//! state driving it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::bounds::{GroupBounds, compute_domain_bounds, compute_schema_bounds};
use crate::config::DiagramConfig;
use crate::highlight::{HighlightStatus, HighlightedColumns, compute_highlighted_columns};
use crate::hit_test::{GeometrySurface, find_table_at_point};
use crate::layout::{LayoutEngine, TablePosition};
use crate::state::{InteractionState, InteractionStore};
use crate::topology::{ColumnRef, SchemaTopology};

#[derive(Debug)]
pub struct Diagram {
    topology: Arc<SchemaTopology>,
    engine: LayoutEngine,
    bounds_padding: f64,
    store: InteractionStore,
}

impl Diagram {
    pub fn new(topology: Arc<SchemaTopology>, config: &DiagramConfig, store: InteractionStore) -> Self {
        Self {
            topology,
            engine: config.layout.clone(),
            bounds_padding: config.bounds_padding,
            store: store.with_limits(config.scale_limits()),
        }
    }

    pub fn topology(&self) -> &SchemaTopology {
        &self.topology
    }

    pub fn engine(&self) -> &LayoutEngine {
        &self.engine
    }

    pub fn store(&self) -> &InteractionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut InteractionStore {
        &mut self.store
    }

    pub fn state(&self) -> &InteractionState {
        self.store.state()
    }

    /// Swap in a reloaded topology. Interaction state is kept; entries for
    /// tables that no longer exist are ignored by every derived view.
    pub fn replace_topology(&mut self, topology: Arc<SchemaTopology>) {
        self.topology = topology;
    }

    pub fn visible_tables(&self) -> Vec<&str> {
        let state = self.store.state();
        self.topology
            .tables()
            .iter()
            .filter(|t| !state.is_hidden(&t.name))
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Bring stored positions up to date with the visible set.
    ///
    /// The first run lays out everything. Later runs only place tables that
    /// have no position yet, so cards the user has seen never move.
    /// Returns the number of tables placed.
    pub fn sync_layout(&mut self) -> usize {
        let state = self.store.state();
        let placed = if state.has_initial_layout {
            self.engine
                .place_missing(&self.topology, &state.hidden_tables, &state.positions)
        } else {
            self.engine
                .layout_with_overrides(&self.topology, &state.hidden_tables, &state.positions)
        };

        let count = placed
            .keys()
            .filter(|name| !self.store.state().positions.contains_key(*name))
            .count();
        if count > 0 || !self.store.state().has_initial_layout {
            debug!(tables = count, "syncing layout");
            self.store.apply_layout(placed);
        }
        count
    }

    /// Manual drag. Tables absent from the topology are ignored.
    pub fn update_position(&mut self, name: &str, position: TablePosition) -> bool {
        if !self.topology.contains(name) {
            debug!(table = name, "ignoring position update for unknown table");
            return false;
        }
        self.store.update_position(name, position);
        true
    }

    pub fn toggle_table(&mut self, name: &str) {
        self.store.toggle_table(name);
        self.sync_layout();
    }

    pub fn show_all_tables(&mut self) {
        self.store.show_all_tables();
        self.sync_layout();
    }

    pub fn hide_all_tables(&mut self) {
        let names: Vec<String> = self.topology.tables().iter().map(|t| t.name.clone()).collect();
        self.store.hide_all_tables(names);
    }

    /// Show or hide every table of one schema namespace.
    pub fn toggle_schema(&mut self, schema: &str, show: bool) {
        let names: Vec<String> = self
            .topology
            .tables()
            .iter()
            .filter(|t| t.schema == schema)
            .map(|t| t.name.clone())
            .collect();
        self.store.toggle_schema(names, show);
        self.sync_layout();
    }

    pub fn reset_layout(&mut self) {
        self.store.reset_layout();
        self.sync_layout();
    }

    /// Positions of the visible tables of the current topology.
    pub fn positions(&self) -> BTreeMap<String, TablePosition> {
        let state = self.store.state();
        state
            .positions
            .iter()
            .filter(|(name, _)| self.topology.contains(name) && !state.is_hidden(name))
            .map(|(name, p)| (name.clone(), *p))
            .collect()
    }

    pub fn highlighted_columns(&self) -> HighlightedColumns {
        compute_highlighted_columns(
            self.store.state().selected_column.as_ref(),
            self.topology.relationships(),
        )
    }

    pub fn column_highlight(&self, column: &ColumnRef) -> HighlightStatus {
        self.highlighted_columns().column_status(column)
    }

    pub fn schema_bounds(&self) -> BTreeMap<String, GroupBounds> {
        compute_schema_bounds(
            &self.topology,
            &self.store.state().positions,
            &self.store.state().hidden_tables,
            self.bounds_padding,
        )
    }

    pub fn domain_bounds(&self) -> BTreeMap<String, GroupBounds> {
        compute_domain_bounds(
            &self.topology,
            &self.store.state().positions,
            &self.store.state().hidden_tables,
            self.bounds_padding,
        )
    }

    pub fn hidden_tables(&self) -> &BTreeSet<String> {
        &self.store.state().hidden_tables
    }

    /// Table under a screen point, honoring pan/zoom, per-table zoom and
    /// z-order.
    pub fn find_table_at_point(&self, x: f64, y: f64) -> Option<String> {
        let surface = GeometrySurface::new(
            &self.topology,
            &self.store.state().positions,
            self.store.state(),
            &self.engine.metrics,
        );
        find_table_at_point(&surface, x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, SchemaDefinition, TableDefinition};
    use crate::state::{ColumnSelection, MemoryStorage};
    use crate::topology::tests::blog_schema;

    fn diagram() -> Diagram {
        let topology = Arc::new(SchemaTopology::build(&blog_schema()));
        let mut diagram = Diagram::new(topology, &DiagramConfig::default(), InteractionStore::new());
        diagram.store_mut().hydrate();
        diagram
    }

    fn assert_no_overlap(diagram: &Diagram) {
        let positions = diagram.positions();
        let cards: Vec<(&String, &TablePosition)> = positions.iter().collect();
        for (i, (a, pa)) in cards.iter().enumerate() {
            for (b, pb) in &cards[i + 1..] {
                assert!(!pa.overlaps(pb), "{} {:?} overlaps {} {:?}", a, pa, b, pb);
            }
        }
    }

    #[test]
    fn test_first_sync_lays_out_everything() {
        let mut diagram = diagram();
        assert!(diagram.positions().is_empty());

        assert_eq!(diagram.sync_layout(), 3);
        assert!(diagram.state().has_initial_layout);
        assert_eq!(diagram.positions().len(), 3);

        // Nothing left to place
        assert_eq!(diagram.sync_layout(), 0);
    }

    #[test]
    fn test_blog_scenario() {
        let mut diagram = diagram();
        diagram.sync_layout();
        let engine = diagram.engine().clone();
        let positions = diagram.positions();

        assert_eq!(positions["users"].x, engine.origin_x);
        assert_eq!(positions["posts"].x, engine.origin_x + engine.horizontal_spacing());
        assert_eq!(positions["comments"].x, engine.origin_x + 2.0 * engine.horizontal_spacing());

        diagram
            .store_mut()
            .set_selected_column(Some(ColumnSelection::foreign_key("posts", "author_id")));
        let highlighted = diagram.highlighted_columns();
        assert_eq!(highlighted.pk, Some(ColumnRef::new("users", "id")));
        assert_eq!(highlighted.fks, vec![ColumnRef::new("posts", "author_id")]);

        diagram.store_mut().set_selected_column(None);
        assert!(diagram.highlighted_columns().is_empty());
    }

    #[test]
    fn test_hidden_dependency_keeps_dependent_visible() {
        let mut diagram = diagram();
        diagram.store_mut().toggle_table("posts");
        diagram.sync_layout();
        let engine = diagram.engine().clone();
        let positions = diagram.positions();

        assert!(!positions.contains_key("posts"));
        assert_eq!(positions["comments"].x, engine.origin_x + engine.horizontal_spacing());
    }

    #[test]
    fn test_revealing_table_does_not_move_others() {
        let mut diagram = diagram();
        diagram.store_mut().toggle_table("posts");
        diagram.sync_layout();
        let before = diagram.positions();

        diagram.toggle_table("posts");
        let after = diagram.positions();

        assert_eq!(after.len(), 3);
        assert_eq!(after["users"], before["users"]);
        assert_eq!(after["comments"], before["comments"]);
        assert!(!after["posts"].overlaps(&after["comments"]));
    }

    #[test]
    fn test_hide_and_reveal_restores_position() {
        let mut diagram = diagram();
        diagram.sync_layout();
        let dragged = TablePosition::new(900.0, 600.0, 200.0, 100.0);
        assert!(diagram.update_position("posts", dragged));

        diagram.toggle_table("posts");
        assert!(!diagram.positions().contains_key("posts"));
        diagram.toggle_table("posts");

        assert_eq!(diagram.positions()["posts"], dragged);
    }

    #[test]
    fn test_update_unknown_table_is_noop() {
        let mut diagram = diagram();
        diagram.sync_layout();
        let before = diagram.state().clone();

        assert!(!diagram.update_position("ghost", TablePosition::new(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(*diagram.state(), before);
    }

    #[test]
    fn test_reset_layout_recomputes_defaults() {
        let mut diagram = diagram();
        diagram.sync_layout();
        let defaults = diagram.positions();

        diagram.update_position("users", TablePosition::new(999.0, 999.0, 10.0, 10.0));
        diagram.reset_layout();

        assert!(diagram.state().has_initial_layout);
        assert_eq!(diagram.positions(), defaults);
    }

    #[test]
    fn test_toggle_schema_by_namespace() {
        let schema = SchemaDefinition::new(vec![
            TableDefinition::new("accounts")
                .in_schema("auth")
                .column(ColumnDefinition::new("id", "uuid").primary_key()),
            TableDefinition::new("sessions")
                .in_schema("auth")
                .column(ColumnDefinition::new("account_id", "uuid").references("accounts", "id")),
            TableDefinition::new("invoices").in_schema("billing"),
        ]);
        let topology = Arc::new(SchemaTopology::build(&schema));
        let mut diagram = Diagram::new(topology, &DiagramConfig::default(), InteractionStore::new());

        diagram.toggle_schema("auth", false);
        assert_eq!(diagram.visible_tables(), vec!["invoices"]);
        assert!(diagram.schema_bounds().contains_key("billing"));
        assert!(!diagram.schema_bounds().contains_key("auth"));

        diagram.toggle_schema("auth", true);
        assert_eq!(diagram.visible_tables().len(), 3);
        assert!(diagram.schema_bounds().contains_key("auth"));
    }

    #[test]
    fn test_hide_all_then_show_all() {
        let mut diagram = diagram();
        diagram.sync_layout();

        diagram.hide_all_tables();
        assert!(diagram.visible_tables().is_empty());
        assert!(diagram.domain_bounds().is_empty());

        diagram.show_all_tables();
        assert_eq!(diagram.domain_bounds().len(), 2);
    }

    #[test]
    fn test_bounds_grow_when_table_revealed() {
        let mut diagram = diagram();
        diagram.store_mut().toggle_table("comments");
        diagram.sync_layout();
        let narrow = diagram.domain_bounds()["content"];

        diagram.toggle_table("comments");
        let wide = diagram.domain_bounds()["content"];

        assert!(wide.contains_rect(&narrow));
    }

    #[test]
    fn test_find_table_at_point() {
        let mut diagram = diagram();
        diagram.sync_layout();
        let users = diagram.positions()["users"];

        let hit = diagram.find_table_at_point(users.x + 5.0, users.y + 5.0);
        assert_eq!(hit.as_deref(), Some("users"));
        assert_eq!(diagram.find_table_at_point(-100.0, -100.0), None);
    }

    #[test]
    fn test_state_survives_reload() {
        let storage = MemoryStorage::new();
        let topology = Arc::new(SchemaTopology::build(&blog_schema()));
        {
            let store = InteractionStore::with_storage(Box::new(storage.clone()), "erd");
            let mut diagram = Diagram::new(Arc::clone(&topology), &DiagramConfig::default(), store);
            diagram.store_mut().hydrate();
            diagram.sync_layout();
            diagram.update_position("users", TablePosition::new(5.0, 5.0, 100.0, 60.0));
        }

        let mut store = InteractionStore::with_storage(Box::new(storage), "erd");
        store.hydrate();
        let mut diagram = Diagram::new(topology, &DiagramConfig::default(), store);

        assert_eq!(diagram.sync_layout(), 0);
        assert_eq!(diagram.positions()["users"].x, 5.0);
    }

    #[test]
    fn test_replace_topology_drops_stale_tables_from_views() {
        let mut diagram = diagram();
        diagram.sync_layout();

        let mut smaller = blog_schema();
        smaller.tables.pop();
        diagram.replace_topology(Arc::new(SchemaTopology::build(&smaller)));

        assert_eq!(diagram.positions().len(), 2);
        assert!(!diagram.update_position("comments", TablePosition::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_reveal_after_hiding_placed_table_keeps_cards_apart() {
        let mut diagram = diagram();
        diagram.store_mut().toggle_table("posts");
        diagram.sync_layout();

        // comments moves out of the way, posts takes over its layer
        diagram.toggle_table("comments");
        diagram.toggle_table("posts");
        diagram.toggle_table("comments");

        assert_eq!(diagram.positions().len(), 3);
        assert_no_overlap(&diagram);
    }

    #[test]
    fn test_no_overlap_across_hide_reveal_sequence() {
        let mut tables = vec![
            TableDefinition::new("accounts").column(ColumnDefinition::new("id", "int").primary_key()),
        ];
        for name in ["invoices", "orders", "payments", "refunds", "sessions"] {
            tables.push(
                TableDefinition::new(name)
                    .column(ColumnDefinition::new("id", "int").primary_key())
                    .column(ColumnDefinition::new("account_id", "int").references("accounts", "id")),
            );
        }
        let topology = Arc::new(SchemaTopology::build(&SchemaDefinition::new(tables)));
        let mut diagram = Diagram::new(topology, &DiagramConfig::default(), InteractionStore::new());
        diagram.store_mut().hydrate();

        diagram.store_mut().toggle_table("accounts");
        diagram.store_mut().toggle_table("orders");
        diagram.sync_layout();
        assert_no_overlap(&diagram);

        let steps = [
            "invoices", "accounts", "payments", "orders", "refunds", "invoices", "payments",
            "sessions", "refunds", "sessions",
        ];
        for name in steps {
            diagram.toggle_table(name);
            assert_no_overlap(&diagram);
        }

        diagram.show_all_tables();
        assert_eq!(diagram.positions().len(), 6);
        assert_no_overlap(&diagram);
    }
}
