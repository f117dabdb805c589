//! Where cover bytes come from.
//!
//! An [`AssetSource`] stands in for the browser's network stack: it fetches an absolute URL and
//! reports whether the response may be read back as pixels (CORS).

use crate::error::AssetError;
use futures::FutureExt;
use futures::future::BoxFuture;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tierboard_core::{decode_image_path, strip_cache_bust};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    /// Whether pixels of this response may be read back without tainting a canvas.
    pub cors_allowed: bool,
}

pub trait AssetSource: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<FetchedAsset, AssetError>>;
}

/// Serves same-origin URLs under `mount` (usually `/covers/`) from a directory.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    origin: Url,
    mount: String,
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(origin: Url, mount: &str, root: impl Into<PathBuf>) -> Self {
        let mut mount = mount.trim().to_string();
        if !mount.starts_with('/') {
            mount.insert(0, '/');
        }
        if !mount.ends_with('/') {
            mount.push('/');
        }
        Self {
            origin,
            mount,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a URL onto a file below the root, refusing foreign origins and traversal.
    pub fn file_for(&self, url: &Url) -> Result<PathBuf, AssetError> {
        let forbidden = || AssetError::Forbidden {
            url: url.to_string(),
        };
        if url.origin() != self.origin.origin() {
            return Err(forbidden());
        }
        let rel = url.path().strip_prefix(&self.mount).ok_or_else(forbidden)?;
        let mut path = self.root.clone();
        for segment in rel.split('/') {
            let segment = decode_image_path(segment);
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['/', '\\'])
            {
                return Err(forbidden());
            }
            path.push(segment);
        }
        Ok(path)
    }

    async fn read(&self, url: &Url) -> Result<FetchedAsset, AssetError> {
        let path = self.file_for(url)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(FetchedAsset {
                bytes,
                cors_allowed: true,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AssetError::NotFound {
                url: url.to_string(),
            }),
            Err(source) => Err(AssetError::Io {
                url: url.to_string(),
                source,
            }),
        }
    }
}

impl AssetSource for DirectoryAssets {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<FetchedAsset, AssetError>> {
        self.read(url).boxed()
    }
}

/// In-memory assets keyed by absolute URL (query strings ignored).
#[derive(Debug, Clone)]
pub struct MemoryAssets {
    origin: Url,
    entries: FxHashMap<String, FetchedAsset>,
}

impl MemoryAssets {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            entries: FxHashMap::default(),
        }
    }

    fn key(&self, path_or_url: &str) -> String {
        let raw = strip_cache_bust(path_or_url.trim());
        self.origin
            .join(raw)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| raw.to_string())
    }

    /// Adds a same-origin asset; `path` may be relative to the origin.
    pub fn insert(&mut self, path: &str, bytes: Vec<u8>) -> &mut Self {
        let key = self.key(path);
        self.entries.insert(
            key,
            FetchedAsset {
                bytes,
                cors_allowed: true,
            },
        );
        self
    }

    /// Adds an asset served without CORS permission: it loads, but reading its pixels taints.
    pub fn insert_cross_origin(&mut self, url: &str, bytes: Vec<u8>) -> &mut Self {
        let key = self.key(url);
        self.entries.insert(
            key,
            FetchedAsset {
                bytes,
                cors_allowed: false,
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetSource for MemoryAssets {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<FetchedAsset, AssetError>> {
        let found = self.entries.get(&self.key(url.as_str())).cloned();
        async move {
            found.ok_or_else(|| AssetError::NotFound {
                url: url.to_string(),
            })
        }
        .boxed()
    }
}

/// Fetches assets over HTTP.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpAssets {
    client: reqwest::Client,
    page_origin: Url,
}

#[cfg(feature = "http")]
impl HttpAssets {
    pub fn new(page_origin: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            page_origin,
        }
    }

    async fn get(&self, url: &Url) -> Result<FetchedAsset, AssetError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AssetError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let cors_allowed = url.origin() == self.page_origin.origin()
            || response
                .headers()
                .contains_key(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN);
        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedAsset {
            bytes,
            cors_allowed,
        })
    }
}

#[cfg(feature = "http")]
impl AssetSource for HttpAssets {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<FetchedAsset, AssetError>> {
        self.get(url).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:3000/").unwrap()
    }

    #[test]
    fn directory_maps_encoded_names_and_refuses_escapes() {
        let assets = DirectoryAssets::new(origin(), "covers", "/srv/covers");
        let url = origin().join("/covers/100%25%20Orange%20Juice.jpg").unwrap();
        assert_eq!(
            assets.file_for(&url).unwrap(),
            Path::new("/srv/covers/100% Orange Juice.jpg")
        );

        for bad in [
            "http://localhost:3000/covers/%2E%2E/secret",
            "http://localhost:3000/covers/a%2Fb.jpg",
            "http://localhost:3000/other/a.jpg",
            "http://example.com/covers/a.jpg",
        ] {
            let url = Url::parse(bad).unwrap();
            assert!(
                matches!(assets.file_for(&url), Err(AssetError::Forbidden { .. })),
                "{bad}"
            );
        }
    }

    #[tokio::test]
    async fn memory_assets_ignore_cache_busting() {
        let mut assets = MemoryAssets::new(origin());
        assets.insert("/covers/Minecraft.jpg", vec![1, 2, 3]);
        let url = Url::parse("http://localhost:3000/covers/Minecraft.jpg?t=42").unwrap();
        let fetched = assets.fetch(&url).await.unwrap();
        assert_eq!(fetched.bytes, vec![1, 2, 3]);
        assert!(fetched.cors_allowed);

        let missing = Url::parse("http://localhost:3000/covers/Nope.jpg").unwrap();
        assert!(matches!(
            assets.fetch(&missing).await,
            Err(AssetError::NotFound { .. })
        ));
    }
}
