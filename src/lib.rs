pub mod bounds;
pub mod config;
pub mod datatype;
pub mod diagram;
pub mod highlight;
pub mod layout;
pub mod measure;
pub mod schema;
pub mod state;
pub mod topology;

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

use config::DiagramConfig;
use diagram::Diagram;
use layout::TablePosition;
use schema::SchemaDefinition;
use state::{CallbackStorage, ColumnSelection, InteractionStore, Transform};
use topology::SchemaTopology;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn parse_config(config: Option<String>) -> Result<DiagramConfig, String> {
    match config {
        Some(json) => DiagramConfig::from_json_str(&json).map_err(|e| e.to_string()),
        None => Ok(DiagramConfig::default()),
    }
}

/// Resolve schema definitions to tables and foreign-key edges.
#[wasm_bindgen(js_name = "buildTopology")]
pub fn build_topology(schema: &str) -> Result<String, String> {
    let schema = SchemaDefinition::from_json_str(schema).map_err(|e| e.to_string())?;
    to_json(&SchemaTopology::build(&schema))
}

/// One-shot layout of every table not listed in `hidden` (a JSON array).
#[wasm_bindgen(js_name = "layoutTables")]
pub fn layout_tables(
    schema: &str,
    hidden: Option<String>,
    config: Option<String>,
) -> Result<String, String> {
    let schema = SchemaDefinition::from_json_str(schema).map_err(|e| e.to_string())?;
    let hidden: BTreeSet<String> = match hidden {
        Some(json) => serde_json::from_str(&json).map_err(|e| e.to_string())?,
        None => BTreeSet::new(),
    };
    let config = parse_config(config)?;

    let topology = SchemaTopology::build(&schema);
    to_json(&config.layout.layout(&topology, &hidden))
}

/// A diagram session driven from JavaScript.
///
/// Derived views are returned as JSON strings. When a `persist` callback is
/// given it receives `(key, json)` after every state change.
#[wasm_bindgen]
pub struct DiagramSession {
    diagram: Diagram,
}

#[wasm_bindgen]
impl DiagramSession {
    #[wasm_bindgen(constructor)]
    pub fn new(
        schema: &str,
        config: Option<String>,
        stored_state: Option<String>,
        persist: Option<js_sys::Function>,
    ) -> Result<DiagramSession, String> {
        let schema = SchemaDefinition::from_json_str(schema).map_err(|e| e.to_string())?;
        let config = parse_config(config)?;

        let mut store = match persist {
            Some(save) => InteractionStore::with_storage(
                Box::new(CallbackStorage::new(save, None)),
                config.storage_key.clone(),
            ),
            None => InteractionStore::new(),
        };
        match stored_state {
            Some(json) => store.hydrate_from_str(&json),
            None => store.hydrate(),
        }

        let topology = Arc::new(SchemaTopology::build(&schema));
        let mut diagram = Diagram::new(topology, &config, store);
        diagram.sync_layout();

        Ok(DiagramSession { diagram })
    }

    #[wasm_bindgen(js_name = "isHydrated")]
    pub fn is_hydrated(&self) -> bool {
        self.diagram.store().is_hydrated()
    }

    #[wasm_bindgen(js_name = "syncLayout")]
    pub fn sync_layout(&mut self) -> usize {
        self.diagram.sync_layout()
    }

    #[wasm_bindgen(js_name = "toggleTable")]
    pub fn toggle_table(&mut self, name: &str) {
        self.diagram.toggle_table(name);
    }

    #[wasm_bindgen(js_name = "showAllTables")]
    pub fn show_all_tables(&mut self) {
        self.diagram.show_all_tables();
    }

    #[wasm_bindgen(js_name = "hideAllTables")]
    pub fn hide_all_tables(&mut self) {
        self.diagram.hide_all_tables();
    }

    #[wasm_bindgen(js_name = "toggleSchema")]
    pub fn toggle_schema(&mut self, schema: &str, show: bool) {
        self.diagram.toggle_schema(schema, show);
    }

    #[wasm_bindgen(js_name = "setTransform")]
    pub fn set_transform(&mut self, x: f64, y: f64, scale: f64) {
        self.diagram
            .store_mut()
            .set_transform(Transform { x, y, scale });
    }

    #[wasm_bindgen(js_name = "setScale")]
    pub fn set_scale(&mut self, scale: f64) {
        self.diagram.store_mut().set_scale(scale);
    }

    #[wasm_bindgen(js_name = "panTo")]
    pub fn pan_to(&mut self, x: f64, y: f64) {
        self.diagram.store_mut().pan_to(x, y);
    }

    /// `selection` is `{"table", "column", "type": "pk" | "fk"}` or absent.
    #[wasm_bindgen(js_name = "setSelectedColumn")]
    pub fn set_selected_column(&mut self, selection: Option<String>) -> Result<(), String> {
        let selection: Option<ColumnSelection> = match selection {
            Some(json) => serde_json::from_str(&json).map_err(|e| e.to_string())?,
            None => None,
        };
        self.diagram.store_mut().set_selected_column(selection);
        Ok(())
    }

    #[wasm_bindgen(js_name = "setFocusedTable")]
    pub fn set_focused_table(&mut self, table: Option<String>) {
        self.diagram.store_mut().set_focused_table(table);
    }

    #[wasm_bindgen(js_name = "setTableZoom")]
    pub fn set_table_zoom(&mut self, name: &str, zoom: f64) {
        self.diagram.store_mut().set_table_zoom(name, zoom);
    }

    #[wasm_bindgen(js_name = "clearTableZoom")]
    pub fn clear_table_zoom(&mut self, name: &str) {
        self.diagram.store_mut().clear_table_zoom(name);
    }

    #[wasm_bindgen(js_name = "bringTableToFront")]
    pub fn bring_table_to_front(&mut self, name: &str) -> u64 {
        self.diagram.store_mut().bring_table_to_front(name)
    }

    #[wasm_bindgen(js_name = "updatePosition")]
    pub fn update_position(&mut self, name: &str, x: f64, y: f64, width: f64, height: f64) -> bool {
        self.diagram
            .update_position(name, TablePosition::new(x, y, width, height))
    }

    #[wasm_bindgen(js_name = "resetLayout")]
    pub fn reset_layout(&mut self) {
        self.diagram.reset_layout();
    }

    #[wasm_bindgen(js_name = "toggleTableExpanded")]
    pub fn toggle_table_expanded(&mut self, name: &str) {
        self.diagram.store_mut().toggle_table_expanded(name);
    }

    #[wasm_bindgen(js_name = "findTableAtPoint")]
    pub fn find_table_at_point(&self, x: f64, y: f64) -> Option<String> {
        self.diagram.find_table_at_point(x, y)
    }

    pub fn topology(&self) -> Result<String, String> {
        to_json(self.diagram.topology())
    }

    pub fn positions(&self) -> Result<String, String> {
        to_json(&self.diagram.positions())
    }

    #[wasm_bindgen(js_name = "highlightedColumns")]
    pub fn highlighted_columns(&self) -> Result<String, String> {
        to_json(&self.diagram.highlighted_columns())
    }

    #[wasm_bindgen(js_name = "schemaBounds")]
    pub fn schema_bounds(&self) -> Result<String, String> {
        to_json(&self.diagram.schema_bounds())
    }

    #[wasm_bindgen(js_name = "domainBounds")]
    pub fn domain_bounds(&self) -> Result<String, String> {
        to_json(&self.diagram.domain_bounds())
    }

    pub fn state(&self) -> Result<String, String> {
        to_json(self.diagram.state())
    }
}
