#![forbid(unsafe_code)]

//! Capture backends for tierboard documents.
//!
//! Two interchangeable [`RasterBackend`]s turn a prepared document subtree into an export
//! payload:
//! - [`SnapshotBackend`] paints the visible boxes straight onto a `tiny-skia` bitmap
//! - [`SerializeBackend`] serializes them into a self-contained SVG and rasterizes that with
//!   `resvg` when a bitmap format is requested
//!
//! Both read only inline `data:` images; materializing covers beforehand is the caller's job.

pub mod backend;
pub mod data_uri;
pub mod filter;
pub mod fonts;
pub mod placeholder;
pub mod raster;
pub mod serialize;
pub mod snapshot;
mod tree;

pub use backend::{BackendError, ExportPayload, ImageFormat, RasterBackend, RenderSettings};
pub use filter::ExclusionFilter;
pub use placeholder::{placeholder_data_uri, placeholder_png};
pub use raster::{RasterError, RasterOptions};
pub use serialize::SerializeBackend;
pub use snapshot::SnapshotBackend;
