//! Runs capture backends in priority order, falling through on failure.

use crate::error::{ExportError, Result};
use std::sync::Arc;
use tierboard_core::{Document, NodeId};
use tierboard_render::{
    BackendError, ExportPayload, ImageFormat, RasterBackend, RenderSettings, SerializeBackend,
    SnapshotBackend,
};

#[derive(Clone)]
pub struct RasterizationDriver {
    backends: Vec<Arc<dyn RasterBackend>>,
}

impl std::fmt::Debug for RasterizationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.backends.iter().map(|b| b.name()))
            .finish()
    }
}

impl Default for RasterizationDriver {
    /// Snapshot first, serialization as the fallback.
    fn default() -> Self {
        Self::new(vec![Arc::new(SnapshotBackend), Arc::new(SerializeBackend)])
    }
}

impl RasterizationDriver {
    pub fn new(backends: Vec<Arc<dyn RasterBackend>>) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &[Arc<dyn RasterBackend>] {
        &self.backends
    }

    /// Backends to attempt for `format`, in order. SVG output, or an explicit preference, moves
    /// backends that read modern colors natively to the front.
    pub fn plan(&self, format: ImageFormat, prefer_serialization: bool) -> Vec<Arc<dyn RasterBackend>> {
        let mut plan: Vec<Arc<dyn RasterBackend>> = self
            .backends
            .iter()
            .filter(|b| b.supports(format))
            .cloned()
            .collect();
        if format == ImageFormat::Svg || prefer_serialization {
            plan.sort_by_key(|b| b.needs_legacy_colors());
        }
        plan
    }

    /// Tries each planned backend until one succeeds; when all fail, the last error is returned.
    pub async fn rasterize(
        &self,
        plan: &[Arc<dyn RasterBackend>],
        doc: &Document,
        root: NodeId,
        settings: &RenderSettings,
    ) -> Result<(ExportPayload, &'static str)> {
        let mut last: Option<(&'static str, BackendError)> = None;
        for backend in plan {
            tokio::task::yield_now().await;
            let name = backend.name();
            tracing::debug!(backend = name, format = %settings.format, "rasterizing");
            match backend.render(doc, root, settings) {
                Ok(payload) => {
                    tracing::debug!(backend = name, bytes = payload.len(), "rasterized");
                    return Ok((payload, name));
                }
                Err(err) => {
                    tracing::warn!(backend = name, error = %err, "backend failed, trying next");
                    last = Some((name, err));
                }
            }
        }
        match last {
            Some((backend, source)) => Err(ExportError::Rasterize { backend, source }),
            None => Err(ExportError::NoBackend {
                format: settings.format,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_orders_by_format_and_preference() {
        let driver = RasterizationDriver::default();
        let names = |plan: Vec<Arc<dyn RasterBackend>>| -> Vec<&'static str> {
            plan.iter().map(|b| b.name()).collect()
        };
        assert_eq!(
            names(driver.plan(ImageFormat::Png, false)),
            vec!["snapshot", "serialize"]
        );
        assert_eq!(
            names(driver.plan(ImageFormat::Jpeg, true)),
            vec!["serialize", "snapshot"]
        );
        assert_eq!(names(driver.plan(ImageFormat::Svg, false)), vec!["serialize"]);
    }
}
