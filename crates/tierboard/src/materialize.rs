//! Rewrites every cover in the export subtree into something the backends can read without
//! fetching: a PNG data URI redrawn from verified pixels, or the synthesized placeholder.

use crate::error::MaterializeError;
use crate::probe::{LoadProber, LoadedImage};
use crate::snapshot::BackupSet;
use futures::future::join_all;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use tierboard_core::paths::{normalize_image_path, with_extension};
use tierboard_core::{Document, NodeId, PathResolver, is_transient_src, strip_cache_bust};
use tierboard_render::data_uri::encode_data_uri;
use tierboard_render::placeholder_data_uri;
use url::Url;

/// Extensions tried, in order, when a cover name carried no extension of its own.
pub const FALLBACK_EXTENSIONS: &[&str] = &["jpg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaterializeMode {
    /// Redraw through an offscreen canvas into a PNG data URI.
    #[default]
    Inline,
    /// Point `src` at the verified absolute URL (with a cache-busting token).
    Direct,
}

/// What happened to one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Embedded { url: Url },
    Linked { url: Url },
    Placeholder { reason: String },
    /// An inline `data:` image with no recoverable source is left as it is.
    Untouched,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub embedded: usize,
    pub linked: usize,
    pub placeholders: usize,
    pub untouched: usize,
}

impl MaterializeReport {
    fn tally(outcomes: &[(NodeId, Outcome)]) -> Self {
        let mut report = Self::default();
        for (_, outcome) in outcomes {
            match outcome {
                Outcome::Embedded { .. } => report.embedded += 1,
                Outcome::Linked { .. } => report.linked += 1,
                Outcome::Placeholder { .. } => report.placeholders += 1,
                Outcome::Untouched => report.untouched += 1,
            }
        }
        tracing::debug!(?report, "materialized images");
        report
    }

    pub fn total(&self) -> usize {
        self.embedded + self.linked + self.placeholders + self.untouched
    }
}

/// Offscreen drawing surface sized to an image's natural dimensions.
struct OffscreenCanvas {
    width: u32,
    height: u32,
    tainted: bool,
    pixels: Vec<u8>,
}

impl OffscreenCanvas {
    fn draw(image: &LoadedImage) -> Self {
        let (width, height) = image.natural_size();
        Self {
            width,
            height,
            tainted: !image.cors_allowed,
            pixels: image.pixels.as_raw().clone(),
        }
    }

    fn to_data_uri(&self, url: &Url) -> Result<String, MaterializeError> {
        if self.tainted {
            return Err(MaterializeError::Tainted {
                url: url.to_string(),
            });
        }
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(
                &self.pixels,
                self.width,
                self.height,
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|source| MaterializeError::Encode {
                url: url.to_string(),
                source,
            })?;
        Ok(encode_data_uri("image/png", &png))
    }
}

/// Where one image should be looked for, captured before anything loads.
#[derive(Debug, Clone)]
struct Target {
    node: NodeId,
    candidates: Vec<Url>,
    inline_already: bool,
}

#[derive(Debug, Clone)]
pub struct Materializer {
    resolver: PathResolver,
    prober: LoadProber,
    mode: MaterializeMode,
}

impl Materializer {
    pub fn new(resolver: PathResolver, prober: LoadProber, mode: MaterializeMode) -> Self {
        Self {
            resolver,
            prober,
            mode,
        }
    }

    pub fn mode(&self) -> MaterializeMode {
        self.mode
    }

    /// Absolute URLs to try for `img`, best first. Empty when the image has no usable identity.
    pub fn candidate_urls(&self, doc: &Document, img: NodeId) -> Vec<Url> {
        let resolved = self.resolver.resolve_with_source(doc, img);
        candidates_for(doc, &resolved.path, resolved.source.guessed_extension())
    }

    fn capture(doc: &Document, img: NodeId, candidates: Vec<Url>) -> Target {
        let src = doc.attr(img, "src").unwrap_or_default().trim();
        Target {
            node: img,
            inline_already: candidates.is_empty() && src.starts_with("data:"),
            candidates,
        }
    }

    /// Loads the first candidate that works and returns the new `src`, if any.
    async fn settle(&self, target: &Target) -> (Outcome, Option<String>) {
        if target.inline_already {
            return (Outcome::Untouched, None);
        }
        for url in &target.candidates {
            let image = match self.prober.load(url).await {
                Ok(image) => image,
                Err(err) => {
                    tracing::debug!(node = %target.node, error = %err, "candidate rejected");
                    continue;
                }
            };
            return match self.mode {
                MaterializeMode::Direct => {
                    let mut linked = url.clone();
                    linked.set_query(Some(&format!(
                        "t={}",
                        chrono::Utc::now().timestamp_millis()
                    )));
                    let src = linked.to_string();
                    (Outcome::Linked { url: linked }, Some(src))
                }
                MaterializeMode::Inline => match OffscreenCanvas::draw(&image).to_data_uri(url) {
                    Ok(data) => (Outcome::Embedded { url: url.clone() }, Some(data)),
                    Err(err) => {
                        tracing::warn!(node = %target.node, error = %err, "drawing failed, using placeholder");
                        placeholder(err.to_string())
                    }
                },
            };
        }
        let reason = if target.candidates.is_empty() {
            "no resolvable source".to_string()
        } else {
            format!("{} candidate(s) failed to load", target.candidates.len())
        };
        tracing::warn!(node = %target.node, %reason, "image unresolvable, using placeholder");
        placeholder(reason)
    }

    /// Materializes one image in place. Never fails; problems degrade to the placeholder.
    pub async fn materialize(&self, doc: &mut Document, img: NodeId) -> Outcome {
        let target = Self::capture(doc, img, self.candidate_urls(doc, img));
        let (outcome, src) = self.settle(&target).await;
        if let Some(src) = src {
            doc.set_attr(img, "src", src);
        }
        outcome
    }

    /// Materializes every image under `root`. All loads run concurrently and are joined before
    /// any `src` changes, so the subtree is never observed half-rewritten.
    pub async fn materialize_all(&self, doc: &mut Document, root: NodeId) -> MaterializeReport {
        let view: &Document = doc;
        let targets: Vec<Target> = view
            .images(root)
            .into_iter()
            .map(|img| Self::capture(view, img, self.candidate_urls(view, img)))
            .collect();
        let outcomes = self.apply(doc, &targets).await;
        MaterializeReport::tally(&outcomes)
    }

    /// Materializes the images an export backed up, looking each one up by its recorded
    /// canonical path. Where the backup guessed the extension, `.png` and `.webp` are tried too
    /// and the path that loaded is confirmed in `backup`.
    pub async fn materialize_backup(&self, doc: &mut Document, backup: &mut BackupSet) -> MaterializeReport {
        let view: &Document = doc;
        let targets: Vec<Target> = backup
            .records()
            .iter()
            .map(|r| {
                let candidates = candidates_for(view, &r.marker_value, r.extension_guessed);
                Self::capture(view, r.element, candidates)
            })
            .collect();
        let outcomes = self.apply(doc, &targets).await;
        for (node, outcome) in &outcomes {
            if let Outcome::Embedded { url } | Outcome::Linked { url } = outcome {
                backup.confirm(*node, url.path());
            }
        }
        MaterializeReport::tally(&outcomes)
    }

    async fn apply(&self, doc: &mut Document, targets: &[Target]) -> Vec<(NodeId, Outcome)> {
        let settled = join_all(targets.iter().map(|t| self.settle(t))).await;
        let mut outcomes = Vec::with_capacity(targets.len());
        for (target, (outcome, src)) in targets.iter().zip(settled) {
            if let Some(src) = src {
                doc.set_attr(target.node, "src", src);
            }
            outcomes.push((target.node, outcome));
        }
        outcomes
    }
}

/// Absolute URLs for a canonical path, adding the fallback extensions when the one it has was
/// guessed.
fn candidates_for(doc: &Document, path: &str, guessed_extension: bool) -> Vec<Url> {
    let raw = strip_cache_bust(path.trim());
    if raw.is_empty() || is_transient_src(raw) {
        return Vec::new();
    }
    let path = normalize_image_path(raw);
    let mut paths = vec![path.clone()];
    if guessed_extension {
        paths.extend(
            FALLBACK_EXTENSIONS
                .iter()
                .map(|ext| with_extension(&path, ext))
                .filter(|p| *p != path),
        );
    }
    paths
        .iter()
        .filter_map(|p| doc.origin().join(p).ok())
        .collect()
}

fn placeholder(reason: String) -> (Outcome, Option<String>) {
    (
        Outcome::Placeholder { reason },
        Some(placeholder_data_uri().to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MemoryAssets;
    use image::RgbaImage;
    use std::sync::Arc;
    use std::time::Duration;

    fn origin() -> Url {
        Url::parse("http://localhost:3000/").unwrap()
    }

    fn png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([200, 10, 10, 255]));
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn materializer(assets: MemoryAssets, mode: MaterializeMode) -> Materializer {
        let prober = LoadProber::new(Arc::new(assets), Duration::from_secs(3));
        Materializer::new(PathResolver::default(), prober, mode)
    }

    fn doc_with_img(src: &str, alt: &str) -> (Document, NodeId) {
        let mut doc = Document::new(origin());
        let body = doc.body();
        let img = doc.create_element("img");
        doc.set_attr(img, "src", src);
        doc.set_attr(img, "alt", alt);
        doc.append_child(body, img);
        (doc, img)
    }

    #[test]
    fn defaulted_extension_adds_png_and_webp_candidates() {
        let m = materializer(MemoryAssets::new(origin()), MaterializeMode::Inline);
        let (doc, img) = doc_with_img("blob:http://localhost:3000/1", "Half Life");
        let urls: Vec<String> = m
            .candidate_urls(&doc, img)
            .iter()
            .map(Url::to_string)
            .collect();
        assert_eq!(
            urls,
            vec![
                "http://localhost:3000/covers/Half%20Life.jpg",
                "http://localhost:3000/covers/Half%20Life.png",
                "http://localhost:3000/covers/Half%20Life.webp",
            ]
        );

        let (doc, img) = doc_with_img("/covers/Halo.png", "Halo");
        assert_eq!(m.candidate_urls(&doc, img).len(), 1);
    }

    #[tokio::test]
    async fn inline_mode_embeds_png_data() {
        let mut assets = MemoryAssets::new(origin());
        assets.insert("/covers/Ratchet%20%26%20Clank.jpg", png());
        let m = materializer(assets, MaterializeMode::Inline);
        let (mut doc, img) = doc_with_img("/covers/Ratchet%20%26%20Clank.jpg", "Ratchet & Clank");

        let outcome = m.materialize(&mut doc, img).await;
        assert!(matches!(outcome, Outcome::Embedded { .. }));
        let src = doc.attr(img, "src").unwrap();
        assert!(src.starts_with("data:image/png;base64,"));
        assert_ne!(src, placeholder_data_uri());
    }

    #[tokio::test]
    async fn png_fallback_when_jpg_is_missing() {
        let mut assets = MemoryAssets::new(origin());
        assets.insert("/covers/Celeste.png", png());
        let m = materializer(assets, MaterializeMode::Direct);
        let (mut doc, img) = doc_with_img("data:image/gif;base64,R0lGOD", "Celeste");

        let outcome = m.materialize(&mut doc, img).await;
        let Outcome::Linked { url } = outcome else {
            panic!("expected a link, got {outcome:?}");
        };
        assert_eq!(url.path(), "/covers/Celeste.png");
        assert!(url.query().unwrap().starts_with("t="));
    }

    #[tokio::test]
    async fn backed_up_blob_tries_other_extensions_and_confirms_the_hit() {
        let mut assets = MemoryAssets::new(origin());
        assets.insert("/covers/Celeste.png", png());
        let m = materializer(assets, MaterializeMode::Inline);
        let (mut doc, img) = doc_with_img("blob:http://localhost:3000/9", "Celeste");
        let body = doc.body();

        let mut backup = crate::snapshot::backup(&mut doc, body, &PathResolver::default());
        assert_eq!(doc.attr(img, "data-original-src"), Some("/covers/Celeste.jpg"));

        let report = m.materialize_backup(&mut doc, &mut backup).await;
        assert_eq!(report.embedded, 1);
        assert_eq!(report.placeholders, 0);
        assert_eq!(backup.records()[0].true_original_src, "/covers/Celeste.png");

        crate::snapshot::restore(&mut doc, &backup);
        assert_eq!(doc.attr(img, "src"), Some("/covers/Celeste.png"));
    }

    #[tokio::test]
    async fn tainted_and_missing_images_become_placeholders() {
        let mut assets = MemoryAssets::new(origin());
        assets.insert_cross_origin("/covers/Minecraft.jpg", png());
        let m = materializer(assets, MaterializeMode::Inline);
        let mut doc = Document::new(origin());
        let body = doc.body();
        for (src, alt) in [("/covers/Minecraft.jpg", "Minecraft"), ("/covers/Gone.jpg", "Gone")] {
            let img = doc.create_element("img");
            doc.set_attr(img, "src", src);
            doc.set_attr(img, "alt", alt);
            doc.append_child(body, img);
        }

        let report = m.materialize_all(&mut doc, body).await;
        assert_eq!(report.placeholders, 2);
        for img in doc.images(body) {
            assert_eq!(doc.attr(img, "src"), Some(placeholder_data_uri()));
        }
    }
}
