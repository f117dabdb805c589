use std::path::PathBuf;
use tierboard_render::{BackendError, ImageFormat};

pub type Result<T> = std::result::Result<T, ExportError>;

/// Failures that end an export call. Per-image and per-backend problems are absorbed earlier
/// and only show up here when every backend failed.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no element with id `{id}`")]
    TargetNotFound { id: String },

    #[error("an export of `{id}` is already running")]
    Busy { id: String },

    #[error("no backend can produce {format}")]
    NoBackend { format: ImageFormat },

    #[error("{backend} backend failed: {source}")]
    Rasterize {
        backend: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("the rendered image was empty")]
    EmptyPayload,

    #[error("failed to write {}: {source}", path.display())]
    Download {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("{url} not found")]
    NotFound { url: String },

    #[error("{url} is outside the asset root")]
    Forbidden { url: String },

    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] AssetError),

    #[error("{url} is not a decodable image: {reason}")]
    Decode { url: String, reason: String },

    #[error("{url} did not load within {millis} ms")]
    TimedOut { url: String, millis: u128 },
}

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("drawing {url} would taint the canvas")]
    Tainted { url: String },

    #[error("failed to re-encode {url}: {source}")]
    Encode {
        url: String,
        #[source]
        source: image::ImageError,
    },
}
