//! Snapshot state: remembers each cover's canonical path before an export mutates it and puts
//! it back afterwards.

use tierboard_core::{Document, NodeId, PathResolver, strip_cache_bust};

/// One image found at export start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBackupRecord {
    pub element: NodeId,
    pub true_original_src: String,
    /// Exact marker text written (or found) on the element.
    pub marker_value: String,
    /// Whether the marker was written by this backup rather than a previous export.
    pub first_seen: bool,
    /// The path came from the accessible name with the default extension appended.
    pub extension_guessed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BackupSet {
    marker_attr: String,
    records: Vec<ImageBackupRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Images whose `src` had to be reassigned.
    pub rewritten: usize,
    pub unchanged: usize,
}

impl BackupSet {
    pub fn records(&self) -> &[ImageBackupRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replaces a guessed canonical path with the one that actually loaded, so restore points
    /// the board at an image that exists. Returns whether the record changed.
    pub fn confirm(&mut self, element: NodeId, loaded_path: &str) -> bool {
        let Some(record) = self
            .records
            .iter_mut()
            .find(|r| r.element == element && r.extension_guessed)
        else {
            return false;
        };
        if record.true_original_src == loaded_path {
            return false;
        }
        tracing::debug!(node = %element, from = %record.true_original_src, to = loaded_path, "confirmed cover path");
        record.true_original_src = loaded_path.to_string();
        true
    }
}

/// Records every image under `root`, writing the marker attribute on first-seen images.
/// Must run once per export, before any mutation.
pub fn backup(doc: &mut Document, root: NodeId, resolver: &PathResolver) -> BackupSet {
    let marker_attr = resolver.config().marker_attr.clone();
    let mut records = Vec::new();
    for img in doc.images(root) {
        let existing = doc
            .attr(img, &marker_attr)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        let first_seen = existing.is_none();
        let (marker_value, extension_guessed) = match existing {
            Some(marker) => (marker, false),
            None => {
                let resolved = resolver.resolve_with_source(doc, img);
                doc.set_attr(img, &marker_attr, resolved.path.as_str());
                (resolved.path, resolved.source.guessed_extension())
            }
        };
        tracing::trace!(node = %img, marker = %marker_value, first_seen, "backed up image");
        records.push(ImageBackupRecord {
            element: img,
            true_original_src: strip_cache_bust(&marker_value).to_string(),
            marker_value,
            first_seen,
            extension_guessed,
        });
    }
    BackupSet {
        marker_attr,
        records,
    }
}

/// Puts every recorded image back on its canonical path. `src` is only reassigned when it
/// differs once cache-busting queries are ignored; the marker is always rewritten clean.
pub fn restore(doc: &mut Document, set: &BackupSet) -> RestoreReport {
    let mut report = RestoreReport::default();
    for record in &set.records {
        let clean = record.true_original_src.as_str();
        let current = doc.attr(record.element, "src").unwrap_or_default();
        let differs = doc.resolve_url(strip_cache_bust(current)) != doc.resolve_url(clean);
        if differs {
            doc.set_attr(record.element, "src", clean);
            report.rewritten += 1;
        } else {
            report.unchanged += 1;
        }
        doc.set_attr(record.element, &set.marker_attr, clean);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn doc() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new(Url::parse("http://localhost:3000/").unwrap());
        let body = doc.body();
        let a = doc.create_element("img");
        doc.set_attr(a, "src", "/covers/Minecraft.jpg");
        doc.set_attr(a, "alt", "Minecraft");
        let b = doc.create_element("img");
        doc.set_attr(b, "src", "http://localhost:3000/covers/Halo.jpg?t=1");
        doc.set_attr(b, "data-original-src", "/covers/Halo.jpg?t=1");
        doc.append_child(body, a);
        doc.append_child(body, b);
        (doc, a, b)
    }

    #[test]
    fn backup_marks_first_seen_images_only() {
        let (mut d, a, b) = doc();
        let body = d.body();
        let set = backup(&mut d, body, &PathResolver::default());
        assert_eq!(set.len(), 2);
        assert!(set.records()[0].first_seen);
        assert!(!set.records()[1].first_seen);
        assert_eq!(d.attr(a, "data-original-src"), Some("/covers/Minecraft.jpg"));
        assert_eq!(set.records()[1].true_original_src, "/covers/Halo.jpg");
        assert_eq!(d.attr(b, "data-original-src"), Some("/covers/Halo.jpg?t=1"));
    }

    #[test]
    fn restore_rewrites_only_real_changes() {
        let (mut d, a, b) = doc();
        let body = d.body();
        let set = backup(&mut d, body, &PathResolver::default());
        d.set_attr(a, "src", "data:image/png;base64,AAAA");

        let report = restore(&mut d, &set);
        assert_eq!(report, RestoreReport { rewritten: 1, unchanged: 1 });
        assert_eq!(d.attr(a, "src"), Some("/covers/Minecraft.jpg"));
        // Only differed by the cache-busting token, so it was left alone.
        assert_eq!(d.attr(b, "src"), Some("http://localhost:3000/covers/Halo.jpg?t=1"));
        assert_eq!(d.attr(b, "data-original-src"), Some("/covers/Halo.jpg"));
    }

    #[test]
    fn confirmed_paths_replace_guessed_extensions() {
        let (mut d, a, _) = doc();
        let body = d.body();
        let blob = d.create_element("img");
        d.set_attr(blob, "src", "blob:http://localhost:3000/7");
        d.set_attr(blob, "alt", "Celeste");
        d.append_child(body, blob);

        let mut set = backup(&mut d, body, &PathResolver::default());
        assert!(set.records()[2].extension_guessed);
        assert!(!set.records()[0].extension_guessed);
        assert!(!set.confirm(a, "/covers/Minecraft.png"));
        assert!(set.confirm(blob, "/covers/Celeste.png"));

        restore(&mut d, &set);
        assert_eq!(d.attr(blob, "src"), Some("/covers/Celeste.png"));
        assert_eq!(d.attr(blob, "data-original-src"), Some("/covers/Celeste.png"));
        assert_eq!(d.attr(a, "src"), Some("/covers/Minecraft.jpg"));
    }

    #[test]
    fn repeated_cycles_do_not_drift() {
        let (mut d, a, _) = doc();
        let resolver = PathResolver::default();
        let body = d.body();
        for _ in 0..3 {
            let set = backup(&mut d, body, &resolver);
            d.set_attr(a, "src", "data:image/png;base64,AAAA");
            restore(&mut d, &set);
        }
        assert_eq!(d.attr(a, "src"), Some("/covers/Minecraft.jpg"));
        assert_eq!(d.attr(a, "data-original-src"), Some("/covers/Minecraft.jpg"));
    }
}
