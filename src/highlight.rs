//! Column highlighting for the selected key.
//!
//! Selecting either end of a foreign key highlights the whole fan-in: the
//! referenced primary key and every foreign key pointing at it.

use serde::Serialize;

use crate::state::{ColumnSelection, KeyKind};
use crate::topology::{ColumnRef, Relationship};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HighlightedColumns {
    pub pk: Option<ColumnRef>,
    pub fks: Vec<ColumnRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HighlightStatus {
    None,
    PkHighlighted,
    FkHighlighted,
}

impl HighlightedColumns {
    pub fn is_empty(&self) -> bool {
        self.pk.is_none() && self.fks.is_empty()
    }

    pub fn column_status(&self, column: &ColumnRef) -> HighlightStatus {
        if self.pk.as_ref() == Some(column) {
            HighlightStatus::PkHighlighted
        } else if self.fks.contains(column) {
            HighlightStatus::FkHighlighted
        } else {
            HighlightStatus::None
        }
    }

    /// Status of a whole table card; the primary key wins over foreign keys.
    pub fn table_status(&self, table: &str) -> HighlightStatus {
        if self.pk.as_ref().is_some_and(|pk| pk.table == table) {
            HighlightStatus::PkHighlighted
        } else if self.fks.iter().any(|fk| fk.table == table) {
            HighlightStatus::FkHighlighted
        } else {
            HighlightStatus::None
        }
    }
}

pub fn compute_highlighted_columns(
    selection: Option<&ColumnSelection>,
    relationships: &[Relationship],
) -> HighlightedColumns {
    let Some(selection) = selection else {
        return HighlightedColumns::default();
    };
    let selected = selection.column_ref();

    let pk = match selection.kind {
        KeyKind::Pk => selected,
        KeyKind::Fk => match relationships.iter().find(|r| r.from == selected) {
            Some(rel) => rel.to.clone(),
            // The foreign key did not resolve, so it has no fan-in
            None => return HighlightedColumns::default(),
        },
    };

    let fks = relationships
        .iter()
        .filter(|r| r.to == pk)
        .map(|r| r.from.clone())
        .collect();

    HighlightedColumns { pk: Some(pk), fks }
}
