use crate::download::FilenameStamp;
use crate::materialize::MaterializeMode;
use crate::sanitize::SafeColors;
use std::time::Duration;
use tierboard_core::ResolverConfig;
use tierboard_render::ImageFormat;

/// Per-call export options. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub format: ImageFormat,
    /// Lossy quality in `[0, 1]`; ignored for PNG and SVG.
    pub quality: f32,
    /// Output pixels per CSS pixel of the laid-out element.
    pub pixel_ratio: f32,
    pub background_color: Option<String>,
    /// Base name of the downloaded file; the stamp and extension are appended.
    pub filename: Option<String>,
    /// Try the serialization backend before the snapshot backend.
    pub prefer_serialization: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            quality: 0.95,
            pixel_ratio: 2.0,
            background_color: Some("#000000".to_string()),
            filename: None,
            prefer_serialization: false,
        }
    }
}

impl ExportOptions {
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        let quality = if self.quality.is_finite() {
            self.quality.clamp(0.0, 1.0)
        } else {
            defaults.quality
        };
        let pixel_ratio = if self.pixel_ratio.is_finite() && self.pixel_ratio > 0.0 {
            self.pixel_ratio.min(8.0)
        } else {
            1.0
        };
        let background_color = self
            .background_color
            .as_deref()
            .map(str::trim)
            .filter(|bg| !bg.is_empty())
            .map(str::to_string);
        let filename = self
            .filename
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Self {
            format: self.format,
            quality,
            pixel_ratio,
            background_color,
            filename,
            prefer_serialization: self.prefer_serialization,
        }
    }
}

/// Exporter-wide settings.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub resolver: ResolverConfig,
    /// Class put on the export root while capturing; the board hides its chrome under it.
    pub export_class: String,
    /// Elements carrying this class are never captured.
    pub exclusion_class: String,
    pub probe_timeout: Duration,
    pub success_display: Duration,
    pub materialize_mode: MaterializeMode,
    pub filename_stamp: FilenameStamp,
    pub default_basename: String,
    pub safe_colors: SafeColors,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            export_class: "exporting".to_string(),
            exclusion_class: "export-hidden".to_string(),
            probe_timeout: Duration::from_secs(3),
            success_display: Duration::from_secs(3),
            materialize_mode: MaterializeMode::Inline,
            filename_stamp: FilenameStamp::EpochMillis,
            default_basename: "game-ranking".to_string(),
            safe_colors: SafeColors::default(),
        }
    }
}
