//! Declarative schema definitions: the input of the topology builder.
//!
//! Definitions are plain data describing tables, their columns and the
//! foreign-key annotations on those columns. They usually arrive as JSON
//! produced from typed ORM table definitions.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid schema definition: {0}")]
    Json(#[from] serde_json::Error),
}

/// A `{table, column}` pair naming a column of some table.
///
/// Never resolved eagerly: the named table may be absent from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ColumnRef>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            not_null: false,
            primary_key: false,
            foreign_key: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ColumnRef::new(table, column));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Table-level primary key; composite keys list several columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: default_schema(),
            comment: None,
            domain: None,
            primary_key: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }
}

/// An ordered set of table definitions. Order is declaration order and is
/// significant for layout cycle breaking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub tables: Vec<TableDefinition>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TableSet {
    List(Vec<TableDefinition>),
    Map(serde_json::Map<String, serde_json::Value>),
}

// Variant order matters: a struct variant would also accept a one-element list.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    List(Vec<TableDefinition>),
    Wrapped { tables: TableSet },
    Map(serde_json::Map<String, serde_json::Value>),
}

impl SchemaDefinition {
    pub fn new(tables: Vec<TableDefinition>) -> Self {
        Self { tables }
    }

    /// Parse a JSON document.
    ///
    /// Accepts `{"tables": [...]}`, `{"tables": {name: def}}`, a bare list or
    /// a bare mapping. In the mapping forms the key names the table unless
    /// the definition carries its own `name`.
    pub fn from_json_str(input: &str) -> Result<Self, SchemaError> {
        let set = match serde_json::from_str::<Document>(input)? {
            Document::List(tables) => TableSet::List(tables),
            Document::Wrapped { tables } => tables,
            Document::Map(entries) => TableSet::Map(entries),
        };

        let tables = match set {
            TableSet::List(tables) => tables,
            TableSet::Map(entries) => {
                let mut tables = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let mut table: TableDefinition = serde_json::from_value(value)?;
                    if table.name.is_empty() {
                        table.name = key;
                    }
                    tables.push(table);
                }
                tables
            }
        };

        Ok(Self { tables })
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let input = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&input)
    }

    /// Stable identity of this snapshot, used to memoize topology builds.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}
