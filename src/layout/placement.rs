//! Card placement on the layer grid.

use std::collections::{BTreeMap, HashMap};

use super::types::TablePosition;

/// Group tables by layer, alphabetically within each layer.
pub fn group_tables_by_layer<'a>(layers: &HashMap<&'a str, usize>) -> BTreeMap<usize, Vec<&'a str>> {
    let mut grouped: BTreeMap<usize, Vec<&'a str>> = BTreeMap::new();

    for (&table, &layer) in layers {
        grouped.entry(layer).or_default().push(table);
    }

    for tables in grouped.values_mut() {
        tables.sort_unstable();
    }

    grouped
}

/// Grid spacing for [`place_tables`].
pub struct GridSpacing {
    pub origin_x: f64,
    pub origin_y: f64,
    /// Distance between the left edges of adjacent layers.
    pub horizontal: f64,
    /// Minimum distance between the top edges of adjacent cells.
    pub vertical: f64,
    /// Minimum free space below a card.
    pub gap_y: f64,
}

/// Place every layer as one column of cells, layers left to right.
pub fn place_tables(
    grouped: &BTreeMap<usize, Vec<&str>>,
    card_sizes: &HashMap<&str, (f64, f64)>,
    spacing: &GridSpacing,
) -> BTreeMap<String, TablePosition> {
    let mut positions = BTreeMap::new();

    for (&layer, tables) in grouped {
        let x = spacing.origin_x + layer as f64 * spacing.horizontal;
        let mut y = spacing.origin_y;

        for &table in tables {
            let (w, h) = card_sizes.get(table).copied().unwrap_or((0.0, 0.0));
            positions.insert(table.to_string(), TablePosition::new(x, y, w, h));

            let pitch = spacing.vertical.max(h + spacing.gap_y);
            y += pitch;
        }
    }

    positions
}

/// Move `candidate` down until it clears every card in `placed`.
///
/// Each step lands at or below the bottom of the blocking card, so a card
/// is passed at most once and the loop ends after `placed.len()` steps.
/// Negative gaps are treated as zero.
pub fn resolve_overlap<'p>(
    mut candidate: TablePosition,
    placed: impl Iterator<Item = &'p TablePosition> + Clone,
    gap_y: f64,
) -> TablePosition {
    let gap_y = gap_y.max(0.0);
    while let Some(blocking) = placed.clone().find(|p| p.overlaps(&candidate)) {
        candidate.y = blocking.bottom() + gap_y;
    }
    candidate
}

/// Overall extent of a set of cards, including the origin margin on the far side.
pub fn layout_extent<'p>(
    positions: impl Iterator<Item = &'p TablePosition>,
    margin_x: f64,
    margin_y: f64,
) -> (f64, f64) {
    positions.fold((0.0_f64, 0.0_f64), |(w, h), p| {
        (w.max(p.right() + margin_x), h.max(p.bottom() + margin_y))
    })
}
