use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

use crate::topology::Table;

/// Text metrics used to size table cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextMetrics {
    pub char_width: f64,
    pub line_height: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub header_padding: f64,
    pub min_card_width: f64,
    pub min_card_height: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
            padding_x: 12.0,
            padding_y: 8.0,
            header_padding: 4.0,
            min_card_width: 160.0,
            min_card_height: 60.0,
        }
    }
}

impl TextMetrics {
    pub fn text_width(&self, text: &str) -> f64 {
        let width = UnicodeWidthStr::width(text);
        width as f64 * self.char_width
    }

    pub fn header_height(&self) -> f64 {
        self.line_height + self.header_padding * 2.0
    }

    /// Top offset of the column row at `index`, relative to the card.
    pub fn row_top(&self, index: usize) -> f64 {
        self.header_height() + self.padding_y + index as f64 * self.line_height
    }

    /// Natural card size: widest line of text, one row per column.
    pub fn card_size(&self, table: &Table) -> (f64, f64) {
        let header_width = self.text_width(&table.name);

        let max_col_width = table
            .columns
            .iter()
            .map(|c| self.text_width(&c.name) + self.text_width(&c.data_type) + self.char_width * 2.0)
            .fold(0.0, f64::max);

        let content_width = header_width.max(max_col_width) + self.padding_x * 2.0;
        let width = content_width.max(self.min_card_width);

        let body_height = if table.columns.is_empty() {
            0.0
        } else {
            table.columns.len() as f64 * self.line_height + self.padding_y * 2.0
        };

        let height = (self.header_height() + body_height).max(self.min_card_height);

        (width, height)
    }
}
