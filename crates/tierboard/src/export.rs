//! The export orchestrator.

use crate::asset::AssetSource;
use crate::download::{self, DownloadEmitter, payload_bytes};
use crate::driver::RasterizationDriver;
use crate::error::{ExportError, Result};
use crate::materialize::{MaterializeReport, Materializer};
use crate::options::{ExportConfig, ExportOptions};
use crate::probe::LoadProber;
use crate::sanitize::{StyleRestore, sanitize};
use crate::snapshot::{self, BackupSet};
use crate::status::StatusTracker;
use std::path::PathBuf;
use std::sync::Arc;
use tierboard_core::{Document, NodeId, PathResolver};
use tierboard_render::{ExclusionFilter, ExportPayload, ImageFormat, RasterBackend, RenderSettings};

/// A finished export.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub payload: ExportPayload,
    pub format: ImageFormat,
    /// Backend that produced the payload.
    pub backend: &'static str,
    pub file_name: String,
    /// Where the download was written, when the exporter has a download directory.
    pub path: Option<PathBuf>,
    pub report: MaterializeReport,
}

pub struct ExporterBuilder {
    assets: Arc<dyn AssetSource>,
    config: ExportConfig,
    backends: Option<Vec<Arc<dyn RasterBackend>>>,
    download_dir: Option<PathBuf>,
    status: Option<StatusTracker>,
    filter: ExclusionFilter,
}

impl ExporterBuilder {
    pub fn new(assets: Arc<dyn AssetSource>) -> Self {
        Self {
            assets,
            config: ExportConfig::default(),
            backends: None,
            download_dir: None,
            status: None,
            filter: ExclusionFilter::default(),
        }
    }

    pub fn config(mut self, config: ExportConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the default snapshot-then-serialize backend list.
    pub fn backends(mut self, backends: Vec<Arc<dyn RasterBackend>>) -> Self {
        self.backends = Some(backends);
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Shares a tracker with the UI instead of creating one.
    pub fn status(mut self, status: StatusTracker) -> Self {
        self.status = Some(status);
        self
    }

    /// Extra exclusion rules on top of the configured exclusion class.
    pub fn filter(mut self, filter: ExclusionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn build(self) -> Exporter {
        let config = self.config;
        let resolver = PathResolver::new(config.resolver.clone());
        let prober = LoadProber::new(self.assets, config.probe_timeout);
        let materializer = Materializer::new(resolver.clone(), prober.clone(), config.materialize_mode);
        let driver = match self.backends {
            Some(backends) => RasterizationDriver::new(backends),
            None => RasterizationDriver::default(),
        };
        let emitter = self
            .download_dir
            .map(|dir| DownloadEmitter::new(dir, config.filename_stamp));
        let status = self
            .status
            .unwrap_or_else(|| StatusTracker::new(config.success_display));
        let filter = self.filter.with_class(&config.exclusion_class);
        Exporter {
            resolver,
            prober,
            materializer,
            driver,
            emitter,
            status,
            filter,
            config,
        }
    }
}

#[derive(Debug)]
pub struct Exporter {
    resolver: PathResolver,
    prober: LoadProber,
    materializer: Materializer,
    driver: RasterizationDriver,
    emitter: Option<DownloadEmitter>,
    status: StatusTracker,
    filter: ExclusionFilter,
    config: ExportConfig,
}

/// One export's hold on the board. Dropping it undoes what the export changed: style restore,
/// then image restore, then export-class removal. A session dropped before [`Self::finish`]
/// was cancelled mid-flight and reports that through the status tracker.
struct ExportSession<'a> {
    doc: &'a mut Document,
    root: NodeId,
    backup: BackupSet,
    styles: Option<StyleRestore>,
    export_class: &'a str,
    status: &'a StatusTracker,
    finished: bool,
}

impl<'a> ExportSession<'a> {
    /// Backs up every image, then puts the root into export mode.
    fn enter(
        doc: &'a mut Document,
        root: NodeId,
        resolver: &PathResolver,
        export_class: &'a str,
        status: &'a StatusTracker,
    ) -> Self {
        let backup = snapshot::backup(doc, root, resolver);
        doc.add_class(root, export_class);
        Self {
            doc,
            root,
            backup,
            styles: None,
            export_class,
            status,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for ExportSession<'_> {
    fn drop(&mut self) {
        if let Some(styles) = self.styles.take() {
            styles.restore(self.doc);
        }
        let restored = snapshot::restore(self.doc, &self.backup);
        self.doc.remove_class(self.root, self.export_class);
        tracing::debug!(?restored, "export cleanup done");
        if !self.finished {
            tracing::warn!(root = %self.root, "export cancelled");
            self.status.fail("export failed: cancelled");
        }
    }
}

impl Exporter {
    pub fn builder(assets: Arc<dyn AssetSource>) -> ExporterBuilder {
        ExporterBuilder::new(assets)
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn prober(&self) -> &LoadProber {
        &self.prober
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    /// Whether element `id` of `doc` is in export mode right now.
    pub fn is_exporting(&self, doc: &Document, id: &str) -> bool {
        doc.get_element_by_id(id)
            .is_some_and(|root| doc.has_class(root, &self.config.export_class))
    }

    /// Exports element `id`. Never fails: problems are reported through [`Self::status`] and
    /// yield `None`.
    pub async fn export_element(
        &self,
        doc: &mut Document,
        id: &str,
        filename: Option<&str>,
        options: &ExportOptions,
    ) -> Option<ExportArtifact> {
        self.try_export_element(doc, id, filename, options).await.ok()
    }

    /// Like [`Self::export_element`], but also returns the error.
    pub async fn try_export_element(
        &self,
        doc: &mut Document,
        id: &str,
        filename: Option<&str>,
        options: &ExportOptions,
    ) -> Result<ExportArtifact> {
        let Some(root) = doc.get_element_by_id(id) else {
            let err = ExportError::TargetNotFound { id: id.to_string() };
            tracing::warn!(error = %err, "export aborted");
            self.status.fail(&format!("export failed: {err}"));
            return Err(err);
        };
        if doc.has_class(root, &self.config.export_class) {
            let err = ExportError::Busy { id: id.to_string() };
            tracing::warn!(error = %err, "export rejected");
            return Err(err);
        }

        let options = options.normalized();
        let basename = filename
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| options.filename.clone())
            .unwrap_or_else(|| self.config.default_basename.clone());

        self.status.begin("Preparing export");
        let mut session = ExportSession::enter(
            doc,
            root,
            &self.resolver,
            &self.config.export_class,
            &self.status,
        );
        let result = self.run(&mut session, &basename, &options).await;
        session.finish();

        match &result {
            Ok(artifact) => {
                tracing::info!(
                    id,
                    backend = artifact.backend,
                    file = %artifact.file_name,
                    placeholders = artifact.report.placeholders,
                    "export finished"
                );
                self.status.succeed(&format!("Saved {}", artifact.file_name));
            }
            Err(err) => {
                tracing::warn!(id, error = %err, "export failed");
                self.status.fail(&format!("export failed: {err}"));
            }
        }
        result
    }

    async fn run(
        &self,
        session: &mut ExportSession<'_>,
        basename: &str,
        options: &ExportOptions,
    ) -> Result<ExportArtifact> {
        let root = session.root;
        self.status.processing(10, "Loading images");
        let report = self
            .materializer
            .materialize_backup(session.doc, &mut session.backup)
            .await;

        let plan = self.driver.plan(options.format, options.prefer_serialization);
        if plan.is_empty() {
            return Err(ExportError::NoBackend {
                format: options.format,
            });
        }
        if plan.iter().any(|b| b.needs_legacy_colors()) {
            session.styles = Some(sanitize(session.doc, root, &self.config.safe_colors));
        }

        self.status.processing(50, "Rendering image");
        let settings = RenderSettings {
            format: options.format,
            pixel_ratio: options.pixel_ratio,
            quality: options.quality,
            background: options.background_color.clone(),
            filter: self.filter.clone(),
        };
        let (payload, backend) = self
            .driver
            .rasterize(&plan, session.doc, root, &settings)
            .await?;
        if payload.is_empty() {
            return Err(ExportError::EmptyPayload);
        }

        self.status.processing(90, "Saving file");
        let (file_name, path) = match &self.emitter {
            Some(emitter) => {
                let path = emitter.emit(&payload, basename, options.format).await?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (name, Some(path))
            }
            None => {
                payload_bytes(&payload)?;
                (
                    download::file_name(basename, self.config.filename_stamp, options.format),
                    None,
                )
            }
        };

        Ok(ExportArtifact {
            payload,
            format: options.format,
            backend,
            file_name,
            path,
            report,
        })
    }
}
