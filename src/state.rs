//! Interaction state store.
//!
//! Holds the user-driven view state of one diagram session: hidden tables,
//! pan/zoom, the selected key column, per-table zoom, z-order, manual
//! positions and detail flags. Every mutation goes through an action method,
//! notifies subscribers and is written to the attached storage.

mod storage;

pub use storage::{CallbackStorage, FileStorage, MemoryStorage, StateStorage, StorageError};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{trace, warn};

use crate::layout::TablePosition;
use crate::topology::ColumnRef;

pub const DEFAULT_STORAGE_KEY: &str = "erd-diagram-state";

/// Zoom factor meaning "no per-table override".
pub const NEUTRAL_ZOOM: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

impl Transform {
    /// Screen point to diagram space.
    pub fn to_diagram(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.x) / self.scale, (y - self.y) / self.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Pk,
    Fk,
}

/// The key column the user clicked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSelection {
    pub table: String,
    pub column: String,
    #[serde(rename = "type")]
    pub kind: KeyKind,
}

impl ColumnSelection {
    pub fn primary_key(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            kind: KeyKind::Pk,
        }
    }

    pub fn foreign_key(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            kind: KeyKind::Fk,
        }
    }

    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef::new(&self.table, &self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self { min: 0.1, max: 4.0 }
    }
}

impl ScaleLimits {
    pub fn clamp(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return NEUTRAL_ZOOM;
        }
        scale.max(self.min).min(self.max)
    }
}

/// The persisted session state. Serializes to one flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionState {
    pub hidden_tables: BTreeSet<String>,
    pub transform: Transform,
    pub selected_column: Option<ColumnSelection>,
    pub table_zooms: BTreeMap<String, f64>,
    /// Last z-index handed out. Only ever increases.
    pub z_counter: u64,
    pub z_indexes: BTreeMap<String, u64>,
    pub positions: BTreeMap<String, TablePosition>,
    pub has_initial_layout: bool,
    pub expanded_tables: BTreeSet<String>,
    pub focused_table: Option<String>,
}

impl InteractionState {
    pub fn is_hidden(&self, table: &str) -> bool {
        self.hidden_tables.contains(table)
    }

    pub fn table_zoom(&self, table: &str) -> f64 {
        self.table_zooms.get(table).copied().unwrap_or(NEUTRAL_ZOOM)
    }

    pub fn z_index(&self, table: &str) -> u64 {
        self.z_indexes.get(table).copied().unwrap_or(0)
    }

    pub fn is_expanded(&self, table: &str) -> bool {
        self.expanded_tables.contains(table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&InteractionState)>;

/// Single-writer container for [`InteractionState`].
pub struct InteractionStore {
    state: InteractionState,
    limits: ScaleLimits,
    storage: Option<Box<dyn StateStorage>>,
    key: String,
    hydrated: bool,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl std::fmt::Debug for InteractionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionStore")
            .field("state", &self.state)
            .field("limits", &self.limits)
            .field("key", &self.key)
            .field("hydrated", &self.hydrated)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for InteractionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionStore {
    /// A store without persistence.
    pub fn new() -> Self {
        Self {
            state: InteractionState::default(),
            limits: ScaleLimits::default(),
            storage: None,
            key: DEFAULT_STORAGE_KEY.to_string(),
            hydrated: false,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn with_storage(storage: Box<dyn StateStorage>, key: impl Into<String>) -> Self {
        Self {
            storage: Some(storage),
            key: key.into(),
            ..Self::new()
        }
    }

    pub fn with_limits(mut self, limits: ScaleLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn limits(&self) -> ScaleLimits {
        self.limits
    }

    /// True once [`hydrate`](Self::hydrate) ran, even if nothing was stored.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Load the persisted state. Missing or unreadable state leaves the
    /// defaults in place.
    pub fn hydrate(&mut self) {
        let stored = match &self.storage {
            Some(storage) => match storage.load(&self.key) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(key = %self.key, error = %e, "failed to load interaction state");
                    None
                }
            },
            None => None,
        };

        match stored {
            Some(json) => self.hydrate_from_str(&json),
            None => {
                self.hydrated = true;
                self.notify();
            }
        }
    }

    /// Replace the state with a serialized snapshot, e.g. one read from
    /// browser session storage.
    pub fn hydrate_from_str(&mut self, json: &str) {
        match serde_json::from_str::<InteractionState>(json) {
            Ok(mut state) => {
                state.transform.scale = self.limits.clamp(state.transform.scale);
                state.table_zooms = state
                    .table_zooms
                    .into_iter()
                    .filter_map(|(name, zoom)| self.zoom_override(zoom).map(|z| (name, z)))
                    .collect();
                // Stored z-indexes may run ahead of a stale counter
                state.z_counter = state
                    .z_indexes
                    .values()
                    .copied()
                    .fold(state.z_counter, u64::max);
                self.state = state;
            }
            Err(e) => warn!(key = %self.key, error = %e, "discarding unreadable interaction state"),
        }
        self.hydrated = true;
        self.notify();
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&InteractionState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.state);
        }
    }

    fn persist(&mut self) {
        let Some(storage) = self.storage.as_mut() else {
            return;
        };
        let result = serde_json::to_string(&self.state)
            .map_err(|e| e.to_string())
            .and_then(|json| storage.save(&self.key, &json).map_err(|e| e.to_string()));
        if let Err(error) = result {
            warn!(key = %self.key, %error, "failed to persist interaction state");
        }
    }

    fn commit(&mut self, action: &'static str) {
        trace!(action, "interaction state updated");
        self.notify();
        self.persist();
    }

    // Visibility

    pub fn toggle_table(&mut self, name: &str) {
        if !self.state.hidden_tables.remove(name) {
            self.state.hidden_tables.insert(name.to_string());
        }
        self.commit("toggle_table");
    }

    pub fn show_all_tables(&mut self) {
        self.state.hidden_tables.clear();
        self.commit("show_all_tables");
    }

    pub fn hide_all_tables<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .hidden_tables
            .extend(names.into_iter().map(Into::into));
        self.commit("hide_all_tables");
    }

    /// Show or hide every table of a schema at once.
    pub fn toggle_schema<I, S>(&mut self, names: I, show: bool)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if show {
                self.state.hidden_tables.remove(&name);
            } else {
                self.state.hidden_tables.insert(name);
            }
        }
        self.commit("toggle_schema");
    }

    // Pan and zoom

    pub fn set_transform(&mut self, transform: Transform) {
        self.state.transform = Transform {
            scale: self.limits.clamp(transform.scale),
            ..transform
        };
        self.commit("set_transform");
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.state.transform.scale = self.limits.clamp(scale);
        self.commit("set_scale");
    }

    pub fn pan_to(&mut self, x: f64, y: f64) {
        self.state.transform.x = x;
        self.state.transform.y = y;
        self.commit("pan_to");
    }

    // Selection

    pub fn set_selected_column(&mut self, selection: Option<ColumnSelection>) {
        self.state.selected_column = selection;
        self.commit("set_selected_column");
    }

    pub fn set_focused_table(&mut self, table: Option<String>) {
        self.state.focused_table = table;
        self.commit("set_focused_table");
    }

    // Per-table zoom

    /// Clamped zoom, or `None` when it equals the neutral zoom.
    fn zoom_override(&self, zoom: f64) -> Option<f64> {
        let zoom = self.limits.clamp(zoom);
        ((zoom - NEUTRAL_ZOOM).abs() >= f64::EPSILON).then_some(zoom)
    }

    /// Setting the neutral zoom removes the override.
    pub fn set_table_zoom(&mut self, name: &str, zoom: f64) {
        match self.zoom_override(zoom) {
            Some(zoom) => {
                self.state.table_zooms.insert(name.to_string(), zoom);
            }
            None => {
                self.state.table_zooms.remove(name);
            }
        }
        self.commit("set_table_zoom");
    }

    pub fn clear_table_zoom(&mut self, name: &str) {
        self.state.table_zooms.remove(name);
        self.commit("clear_table_zoom");
    }

    // Z-order

    /// Give `name` a z-index above every index handed out so far.
    pub fn bring_table_to_front(&mut self, name: &str) -> u64 {
        self.state.z_counter += 1;
        let z = self.state.z_counter;
        self.state.z_indexes.insert(name.to_string(), z);
        self.commit("bring_table_to_front");
        z
    }

    // Geometry

    /// Manual position for `name`; it stays until [`reset_layout`](Self::reset_layout).
    pub fn update_position(&mut self, name: &str, position: TablePosition) {
        self.state.positions.insert(name.to_string(), position);
        self.commit("update_position");
    }

    /// Record computed positions for tables that have none yet.
    pub fn apply_layout(&mut self, positions: BTreeMap<String, TablePosition>) {
        for (name, position) in positions {
            self.state.positions.entry(name).or_insert(position);
        }
        self.state.has_initial_layout = true;
        self.commit("apply_layout");
    }

    /// Forget all geometry so the next layout pass starts from scratch.
    pub fn reset_layout(&mut self) {
        self.state.positions.clear();
        self.state.table_zooms.clear();
        self.state.focused_table = None;
        self.state.z_indexes.clear();
        self.state.expanded_tables.clear();
        self.state.has_initial_layout = false;
        self.commit("reset_layout");
    }

    pub fn toggle_table_expanded(&mut self, name: &str) {
        if !self.state.expanded_tables.remove(name) {
            self.state.expanded_tables.insert(name.to_string());
        }
        self.commit("toggle_table_expanded");
    }

    /// Reset the whole session and drop the persisted entry. The z-counter
    /// is kept in memory; the entry is written again on the next action.
    pub fn clear(&mut self) {
        self.state = InteractionState {
            z_counter: self.state.z_counter,
            ..InteractionState::default()
        };
        if let Some(storage) = self.storage.as_mut() {
            if let Err(e) = storage.remove(&self.key) {
                warn!(key = %self.key, error = %e, "failed to clear persisted state");
            }
        }
        trace!(action = "clear", "interaction state updated");
        self.notify();
    }
}
