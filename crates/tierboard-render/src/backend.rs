use crate::filter::ExclusionFilter;
use crate::raster::RasterError;
use std::fmt;
use std::str::FromStr;
use tierboard_core::{ColorError, Document, DomError, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Svg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Svg => "svg",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Svg => "image/svg+xml",
        }
    }

    pub fn is_bitmap(self) -> bool {
        !matches!(self, Self::Svg)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "svg" => Ok(Self::Svg),
            _ => Err(()),
        }
    }
}

/// Per-call capture settings shared by every backend.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub format: ImageFormat,
    /// Output pixels per CSS pixel.
    pub pixel_ratio: f32,
    /// Lossy quality in `[0, 1]`; only JPEG reads it.
    pub quality: f32,
    /// Fill composited behind transparent regions.
    pub background: Option<String>,
    pub filter: ExclusionFilter,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            pixel_ratio: 1.0,
            quality: 0.95,
            background: None,
            filter: ExclusionFilter::default(),
        }
    }
}

impl RenderSettings {
    pub(crate) fn jpeg_quality(&self) -> u8 {
        (self.quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
    }
}

/// What a backend produced: encoded bytes, or markup (SVG text or a data URI).
#[derive(Debug, Clone, PartialEq)]
pub enum ExportPayload {
    Blob { bytes: Vec<u8>, mime: &'static str },
    Text { markup: String, mime: &'static str },
}

impl ExportPayload {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Blob { mime, .. } | Self::Text { mime, .. } => mime,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Blob { bytes, .. } => bytes.is_empty(),
            Self::Text { markup, .. } => markup.trim().is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Blob { bytes, .. } => bytes.len(),
            Self::Text { markup, .. } => markup.len(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{backend} backend cannot produce {format}")]
    Unsupported {
        backend: &'static str,
        format: ImageFormat,
    },
    #[error("export target has nothing visible to capture")]
    EmptyTarget,
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error("cannot paint color `{value}`: {source}")]
    Color {
        value: String,
        #[source]
        source: ColorError,
    },
    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// One way of turning a document subtree into an image.
pub trait RasterBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether computed colors must be legacy sRGB notations before [`Self::render`] runs.
    fn needs_legacy_colors(&self) -> bool;

    fn supports(&self, format: ImageFormat) -> bool;

    fn render(
        &self,
        doc: &Document,
        root: NodeId,
        settings: &RenderSettings,
    ) -> Result<ExportPayload, BackendError>;
}
