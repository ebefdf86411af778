//! Tunable constants for the transforms
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::document::SaveOptions;
use crate::error::PdfToolsError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Scale factor applied to page size when rasterizing
    pub raster_scale: f32,
    /// Factor applied to page width and height by the compress operation
    pub resize_factor: f32,
    pub watermark: WatermarkStyle,
    pub page_number_font_size: f32,
    /// Options used for every PDF output except flatten
    pub save: SaveOptions,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            raster_scale: 0.5,
            resize_factor: 0.75,
            watermark: WatermarkStyle::default(),
            page_number_font_size: 12.0,
            save: SaveOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkStyle {
    pub font_size: f32,
    /// Grey level used for all three RGB components (0 = black, 1 = white)
    pub gray: f32,
    pub opacity: f32,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            font_size: 150.0,
            gray: 0.5,
            opacity: 0.3,
        }
    }
}

impl ToolConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, PdfToolsError> {
        let config: ToolConfig = serde_json::from_str(json)
            .map_err(|e| PdfToolsError::Validation(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PdfToolsError> {
        let positive = [
            ("raster_scale", self.raster_scale),
            ("resize_factor", self.resize_factor),
            ("watermark.font_size", self.watermark.font_size),
            ("page_number_font_size", self.page_number_font_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PdfToolsError::Validation(format!(
                    "Invalid configuration: {} must be positive, got {}",
                    name, value
                )));
            }
        }

        let unit = [
            ("watermark.gray", self.watermark.gray),
            ("watermark.opacity", self.watermark.opacity),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(PdfToolsError::Validation(format!(
                    "Invalid configuration: {} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = ToolConfig::from_json("{}").unwrap();
        assert_eq!(config, ToolConfig::default());
        assert_eq!(config.raster_scale, 0.5);
        assert_eq!(config.resize_factor, 0.75);
        assert_eq!(config.watermark.font_size, 150.0);
        assert!(config.save.object_streams);
    }

    #[test]
    fn test_partial_override() {
        let config = ToolConfig::from_json(r#"{"watermark":{"opacity":0.5}}"#).unwrap();
        assert_eq!(config.watermark.opacity, 0.5);
        assert_eq!(config.watermark.gray, 0.5);
        assert_eq!(config.page_number_font_size, 12.0);
    }

    #[test]
    fn test_rejects_non_positive_scale() {
        let err = ToolConfig::from_json(r#"{"raster_scale":0}"#).unwrap_err();
        assert!(err.to_string().contains("raster_scale"));
    }

    #[test]
    fn test_rejects_opacity_out_of_range() {
        let err = ToolConfig::from_json(r#"{"watermark":{"opacity":1.5}}"#).unwrap_err();
        assert!(err.to_string().contains("watermark.opacity"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(ToolConfig::from_json("{not json").is_err());
    }
}
