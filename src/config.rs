//! Diagram configuration.
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```json
//! { "layout": { "columnWidth": 320 }, "boundsPadding": 32 }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bounds::DEFAULT_BOUNDS_PADDING;
use crate::layout::LayoutEngine;
use crate::state::{DEFAULT_STORAGE_KEY, ScaleLimits};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid scale range: minScale {min} must be positive and at most maxScale {max}")]
    ScaleRange { min: f64, max: f64 },
    #[error("Invalid layout setting {field}: {value} ({expected})")]
    LayoutValue {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
}

fn check_layout_value(
    field: &'static str,
    value: f64,
    valid: bool,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if value.is_finite() && valid {
        Ok(())
    } else {
        Err(ConfigError::LayoutValue {
            field,
            value,
            expected,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiagramConfig {
    pub layout: LayoutEngine,
    pub bounds_padding: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub storage_key: String,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        let limits = ScaleLimits::default();
        Self {
            layout: LayoutEngine::default(),
            bounds_padding: DEFAULT_BOUNDS_PADDING,
            min_scale: limits.min,
            max_scale: limits.max,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl DiagramConfig {
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale) {
            return Err(ConfigError::ScaleRange {
                min: self.min_scale,
                max: self.max_scale,
            });
        }

        let layout = &self.layout;
        check_layout_value("originX", layout.origin_x, true, "finite")?;
        check_layout_value("originY", layout.origin_y, true, "finite")?;
        check_layout_value(
            "columnWidth",
            layout.column_width,
            layout.column_width > 0.0,
            "positive",
        )?;
        for (field, value) in [
            ("gapX", layout.gap_x),
            ("gapY", layout.gap_y),
            ("verticalSpacing", layout.vertical_spacing),
            ("boundsPadding", self.bounds_padding),
        ] {
            check_layout_value(field, value, value >= 0.0, "non-negative")?;
        }
        Ok(())
    }

    pub fn scale_limits(&self) -> ScaleLimits {
        ScaleLimits {
            min: self.min_scale,
            max: self.max_scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CycleFallback;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_is_default() {
        let config = DiagramConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DiagramConfig::default());
    }

    #[test]
    fn test_partial_nested_config() {
        let config = DiagramConfig::from_json_str(
            r#"{
                "layout": { "columnWidth": 320, "maxDepth": 8, "cycleFallback": "ground" },
                "boundsPadding": 32,
                "storageKey": "schema-page"
            }"#,
        )
        .unwrap();

        assert_eq!(config.layout.column_width, 320.0);
        assert_eq!(config.layout.max_depth, 8);
        assert_eq!(config.layout.cycle_fallback, CycleFallback::Ground);
        assert_eq!(config.layout.gap_x, LayoutEngine::default().gap_x);
        assert_eq!(config.bounds_padding, 32.0);
        assert_eq!(config.storage_key, "schema-page");
    }

    #[test]
    fn test_invalid_scale_range() {
        let err = DiagramConfig::from_json_str(r#"{ "minScale": 2, "maxScale": 1 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::ScaleRange { .. }));
    }

    #[rstest]
    #[case(r#"{ "layout": { "gapY": -10 } }"#, "gapY")]
    #[case(r#"{ "layout": { "gapX": -1 } }"#, "gapX")]
    #[case(r#"{ "layout": { "columnWidth": 0 } }"#, "columnWidth")]
    #[case(r#"{ "layout": { "verticalSpacing": -200 } }"#, "verticalSpacing")]
    #[case(r#"{ "boundsPadding": -4 }"#, "boundsPadding")]
    fn test_invalid_layout_values(#[case] input: &str, #[case] expected_field: &str) {
        match DiagramConfig::from_json_str(input) {
            Err(ConfigError::LayoutValue { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected layout error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_layout_value_rejected() {
        let mut config = DiagramConfig::default();
        config.layout.origin_x = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LayoutValue { field: "originX", .. })
        ));

        config.layout.origin_x = 0.0;
        config.layout.column_width = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "maxScale": 8 }}"#).unwrap();

        let config = DiagramConfig::load(file.path()).unwrap();
        assert_eq!(config.scale_limits().max, 8.0);

        let missing = DiagramConfig::load(Path::new("/nonexistent/erdview.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
