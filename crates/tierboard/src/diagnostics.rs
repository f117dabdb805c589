//! Developer entry points for inspecting and repairing board images outside an export.

use crate::error::{ExportError, Result};
use crate::export::{ExportArtifact, Exporter};
use crate::options::ExportOptions;
use serde::Serialize;
use tierboard_core::paths::with_extension;
use tierboard_core::{CONTAINER_ID, Document, NodeId, normalize_image_path, strip_cache_bust};
use tierboard_render::placeholder_data_uri;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDiagnostic {
    pub index: usize,
    pub alt: Option<String>,
    pub src: String,
    pub canonical: String,
    /// Absolute URL the canonical path resolves to, when it resolves at all.
    pub url: Option<String>,
    pub can_load: bool,
    pub has_marker: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub fixed: usize,
    pub placeholders: usize,
}

fn root(doc: &Document, id: &str) -> Result<NodeId> {
    doc.get_element_by_id(id)
        .ok_or_else(|| ExportError::TargetNotFound { id: id.to_string() })
}

/// Reports what the exporter would see for every image under `id`, without changing anything.
pub async fn diagnose_images(exporter: &Exporter, doc: &Document, id: &str) -> Result<Vec<ImageDiagnostic>> {
    let root = root(doc, id)?;
    let marker_attr = &exporter.resolver().config().marker_attr;
    let mut out = Vec::new();
    for (index, img) in doc.images(root).into_iter().enumerate() {
        let canonical = exporter.resolver().resolve(doc, img);
        let url = exporter
            .materializer()
            .candidate_urls(doc, img)
            .into_iter()
            .next();
        let can_load = match &url {
            Some(url) => exporter.prober().probe(url).await,
            None => false,
        };
        out.push(ImageDiagnostic {
            index,
            alt: doc.attr(img, "alt").map(str::to_string),
            src: doc.image_src(img),
            canonical,
            url: url.map(|u| u.to_string()),
            can_load,
            has_marker: doc.attr(img, marker_attr).is_some(),
        });
    }
    Ok(out)
}

/// Persistently points every image under `id` at its verified absolute URL (trying the
/// canonical path, then a `.png` variant), recording the marker. Images that load under
/// neither get the placeholder.
pub async fn fix_images(exporter: &Exporter, doc: &mut Document, id: &str) -> Result<FixReport> {
    let root = root(doc, id)?;
    let marker_attr = exporter.resolver().config().marker_attr.clone();
    let mut report = FixReport::default();
    for img in doc.images(root) {
        let canonical = normalize_image_path(strip_cache_bust(&exporter.resolver().resolve(doc, img)));
        let mut candidates = vec![canonical.clone()];
        let png = with_extension(&canonical, "png");
        if png != canonical {
            candidates.push(png);
        }

        let mut fixed = None;
        for path in &candidates {
            let Ok(url) = doc.origin().join(path) else {
                continue;
            };
            if exporter.prober().probe(&url).await {
                fixed = Some((path.clone(), url));
                break;
            }
        }
        match fixed {
            Some((path, url)) => {
                doc.set_attr(img, "src", url.to_string());
                doc.set_attr(img, &marker_attr, path);
                report.fixed += 1;
            }
            None => {
                tracing::warn!(node = %img, path = %canonical, "no loadable source, using placeholder");
                doc.set_attr(img, &marker_attr, canonical);
                doc.set_attr(img, "src", placeholder_data_uri());
                report.placeholders += 1;
            }
        }
    }
    Ok(report)
}

/// Exports the ranking board with default options.
pub async fn trigger_export(exporter: &Exporter, doc: &mut Document) -> Option<ExportArtifact> {
    exporter
        .export_element(doc, CONTAINER_ID, None, &ExportOptions::default())
        .await
}
