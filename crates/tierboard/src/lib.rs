#![forbid(unsafe_code)]

//! Export pipeline for tierboard ranking boards.
//!
//! [`Exporter::export_element`] captures one element of a [`Document`] as PNG, JPEG or SVG:
//! 1. back up every cover image and mark its canonical path
//! 2. put the root into export mode (hides interactive chrome)
//! 3. materialize covers into inline data, degrading to a placeholder
//! 4. neutralize colors the snapshot backend cannot parse
//! 5. run the backends with fallback and write the download
//! 6. restore styles, images and the export-mode class, whatever happened
//!
//! Asynchronous work runs on a single-threaded `tokio` runtime; loads are bounded by a timeout.
//!
//! [`Document`]: tierboard_core::Document

pub mod asset;
pub mod diagnostics;
pub mod download;
pub mod driver;
pub mod error;
pub mod export;
pub mod materialize;
pub mod options;
pub mod probe;
pub mod sanitize;
pub mod snapshot;
pub mod status;

pub use asset::{AssetSource, DirectoryAssets, FetchedAsset, MemoryAssets};
#[cfg(feature = "http")]
pub use asset::HttpAssets;
pub use diagnostics::{FixReport, ImageDiagnostic, diagnose_images, fix_images, trigger_export};
pub use download::{DownloadEmitter, FilenameStamp};
pub use driver::RasterizationDriver;
pub use error::{AssetError, ExportError, LoadError, MaterializeError, Result};
pub use export::{ExportArtifact, Exporter, ExporterBuilder};
pub use materialize::{MaterializeMode, MaterializeReport, Materializer, Outcome};
pub use options::{ExportConfig, ExportOptions};
pub use probe::{LoadProber, LoadedImage};
pub use sanitize::{SafeColors, StyleRestore, sanitize};
pub use snapshot::{BackupSet, ImageBackupRecord, RestoreReport};
pub use status::{ExportState, ExportStatus, StatusTracker};
