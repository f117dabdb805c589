//! Canonical cover-image paths.
//!
//! Browsers rewrite `img.src` into absolute URLs, exports swap it for data URIs, and cache
//! busting appends query strings. The resolver recovers the asset-root path an image was
//! originally rendered with, so repeated exports never drift away from it.

use crate::dom::{Document, NodeId, is_transient_src};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Everything except ASCII alphanumerics and `-_.~` is escaped inside a file name.
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub const RECOGNIZED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "svg", "avif"];

/// Percent-encodes the last path segment, leaving directory separators alone.
///
/// `/covers/100% Orange Juice.jpg` becomes `/covers/100%25%20Orange%20Juice.jpg`.
pub fn encode_image_path(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => {
            let (dir, name) = path.split_at(i + 1);
            format!("{dir}{}", utf8_percent_encode(name, FILE_NAME))
        }
        None => utf8_percent_encode(path, FILE_NAME).to_string(),
    }
}

/// Inverse of [`encode_image_path`]; malformed escapes are kept literally.
pub fn decode_image_path(path: &str) -> String {
    match path.rfind('/') {
        Some(i) => {
            let (dir, name) = path.split_at(i + 1);
            format!("{dir}{}", percent_decode_str(name).decode_utf8_lossy())
        }
        None => percent_decode_str(path).decode_utf8_lossy().into_owned(),
    }
}

/// Encodes a path whether or not it was already encoded: `encode(decode(path))`.
pub fn normalize_image_path(path: &str) -> String {
    encode_image_path(&decode_image_path(path))
}

/// Drops a cache-busting query (`?t=...`) and anything after it.
pub fn strip_cache_bust(src: &str) -> &str {
    match src.find('?') {
        Some(i) => &src[..i],
        None => src,
    }
}

pub fn has_recognized_extension(name: &str) -> bool {
    extension_of(name)
        .is_some_and(|ext| RECOGNIZED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn extension_of(name: &str) -> Option<&str> {
    let file = name.rsplit('/').next().unwrap_or(name);
    let (stem, ext) = file.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

/// Replaces (or appends) the extension of the final path segment.
pub fn with_extension(path: &str, ext: &str) -> String {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => format!("{}.{ext}", &path[..file_start + dot]),
        _ => format!("{path}.{ext}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Static root every cover lives under, with leading and trailing slashes.
    pub asset_root: String,
    /// Durable attribute remembering the canonical path across exports.
    pub marker_attr: String,
    /// Explicit display-name attribute, preferred over `alt`.
    pub name_attr: String,
    pub default_extension: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            asset_root: "/covers/".to_string(),
            marker_attr: "data-original-src".to_string(),
            name_attr: "data-game-name".to_string(),
            default_extension: "jpg".to_string(),
        }
    }
}

/// Which piece of evidence produced a canonical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSource {
    Marker,
    /// Reconstructed from the accessible name; `defaulted_extension` is set when the name had
    /// no recognized extension and the default one was appended.
    AccessibleName { defaulted_extension: bool },
    AssetRoot,
    Verbatim,
}

impl PathSource {
    /// The extension in the path is a guess, so other extensions are worth trying.
    pub fn guessed_extension(self) -> bool {
        matches!(
            self,
            Self::AccessibleName {
                defaulted_extension: true
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: String,
    pub source: PathSource,
}

#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    config: ResolverConfig,
}

impl PathResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn resolve(&self, doc: &Document, img: NodeId) -> String {
        self.resolve_with_source(doc, img).path
    }

    /// Marker attribute, then accessible name (for transient sources), then the asset-root
    /// suffix of the current `src`, then the current `src` itself. Never fails.
    pub fn resolve_with_source(&self, doc: &Document, img: NodeId) -> ResolvedPath {
        if let Some(marker) = doc.attr(img, &self.config.marker_attr) {
            if !marker.trim().is_empty() {
                return ResolvedPath {
                    path: marker.to_string(),
                    source: PathSource::Marker,
                };
            }
        }

        let src = doc.image_src(img);

        if is_transient_src(&src) {
            if let Some(resolved) = self.from_accessible_name(doc, img) {
                return resolved;
            }
        }

        if let Some(i) = src.find(&self.config.asset_root) {
            return ResolvedPath {
                path: normalize_image_path(strip_cache_bust(&src[i..])),
                source: PathSource::AssetRoot,
            };
        }

        ResolvedPath {
            path: src,
            source: PathSource::Verbatim,
        }
    }

    pub fn accessible_name<'a>(&self, doc: &'a Document, img: NodeId) -> Option<&'a str> {
        [self.config.name_attr.as_str(), "alt"]
            .into_iter()
            .filter_map(|attr| doc.attr(img, attr))
            .map(str::trim)
            .find(|name| !name.is_empty())
    }

    /// Builds `<asset_root><name>[.<default_extension>]`, encoded.
    pub fn path_for_name(&self, name: &str) -> ResolvedPath {
        let defaulted_extension = !has_recognized_extension(name);
        let file = if defaulted_extension {
            format!("{name}.{}", self.config.default_extension)
        } else {
            name.to_string()
        };
        ResolvedPath {
            path: encode_image_path(&format!("{}{file}", self.config.asset_root)),
            source: PathSource::AccessibleName {
                defaulted_extension,
            },
        }
    }

    fn from_accessible_name(&self, doc: &Document, img: NodeId) -> Option<ResolvedPath> {
        self.accessible_name(doc, img)
            .map(|name| self.path_for_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn doc() -> Document {
        Document::new(Url::parse("http://localhost:3000/").unwrap())
    }

    fn img(doc: &mut Document, src: &str, alt: &str) -> NodeId {
        let body = doc.body();
        let n = doc.create_element("img");
        doc.set_attr(n, "src", src);
        doc.set_attr(n, "alt", alt);
        doc.append_child(body, n);
        n
    }

    #[test]
    fn encodes_only_the_file_name() {
        assert_eq!(
            encode_image_path("/covers/100% Orange Juice.jpg"),
            "/covers/100%25%20Orange%20Juice.jpg"
        );
        assert_eq!(
            encode_image_path("/covers/Ratchet & Clank!+.jpg"),
            "/covers/Ratchet%20%26%20Clank%21%2B.jpg"
        );
        assert_eq!(encode_image_path("/covers/Minecraft.jpg"), "/covers/Minecraft.jpg");
    }

    #[test]
    fn encoding_is_stable_under_reapplication() {
        for name in [
            "/covers/100% Orange Juice.jpg",
            "/covers/Ratchet & Clank.jpg",
            "/covers/Wow!+Plus.png",
            "/covers/plain.jpg",
        ] {
            let once = encode_image_path(name);
            assert_eq!(encode_image_path(&decode_image_path(&once)), once);
            assert_eq!(normalize_image_path(&once), once);
            assert_eq!(normalize_image_path(name), once);
            let url = Url::parse("http://localhost:3000/").unwrap().join(&once).unwrap();
            assert_eq!(url.path(), once);
        }
    }

    #[test]
    fn strips_cache_bust_query() {
        assert_eq!(strip_cache_bust("/covers/a.jpg?t=123"), "/covers/a.jpg");
        assert_eq!(strip_cache_bust("/covers/a.jpg"), "/covers/a.jpg");
    }

    #[test]
    fn extension_helpers() {
        assert!(has_recognized_extension("Halo.PNG"));
        assert!(!has_recognized_extension("Half-Life 2"));
        assert!(!has_recognized_extension("Dr. Mario"));
        assert_eq!(with_extension("/covers/a.jpg", "png"), "/covers/a.png");
        assert_eq!(
            with_extension("/covers/Dr.%20Mario.jpg", "png"),
            "/covers/Dr.%20Mario.png"
        );
        assert_eq!(with_extension("/covers/Halo", "png"), "/covers/Halo.png");
    }

    #[test]
    fn marker_wins_over_everything() {
        let mut d = doc();
        let n = img(&mut d, "data:image/png;base64,AAAA", "Minecraft");
        d.set_attr(n, "data-original-src", "/covers/Custom.png");
        let r = PathResolver::default().resolve_with_source(&d, n);
        assert_eq!(r.path, "/covers/Custom.png");
        assert_eq!(r.source, PathSource::Marker);
    }

    #[test]
    fn transient_src_uses_accessible_name() {
        let mut d = doc();
        let n = img(&mut d, "blob:http://localhost:3000/abc", "100% Orange Juice");
        let r = PathResolver::default().resolve_with_source(&d, n);
        assert_eq!(r.path, "/covers/100%25%20Orange%20Juice.jpg");
        assert_eq!(
            r.source,
            PathSource::AccessibleName {
                defaulted_extension: true
            }
        );

        assert!(r.source.guessed_extension());

        d.set_attr(n, "data-game-name", "Celeste.png");
        let r = PathResolver::default().resolve_with_source(&d, n);
        assert_eq!(r.path, "/covers/Celeste.png");
        assert!(!r.source.guessed_extension());
    }

    #[test]
    fn absolute_src_is_cut_at_asset_root() {
        let mut d = doc();
        let n = img(
            &mut d,
            "http://localhost:3000/covers/Minecraft.jpg?t=1700000000000",
            "Minecraft",
        );
        let r = PathResolver::default().resolve_with_source(&d, n);
        assert_eq!(r.path, "/covers/Minecraft.jpg");
        assert_eq!(r.source, PathSource::AssetRoot);
    }

    #[test]
    fn falls_back_to_current_src() {
        let mut d = doc();
        let n = img(&mut d, "/elsewhere/x.jpg", "");
        let r = PathResolver::default().resolve_with_source(&d, n);
        assert_eq!(r.path, "http://localhost:3000/elsewhere/x.jpg");
        assert_eq!(r.source, PathSource::Verbatim);
    }
}
