//! Bounded image loads.

use crate::asset::AssetSource;
use crate::error::LoadError;
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use tierboard_render::RasterOptions;
use tierboard_render::raster;
use url::Url;

/// A fetched and decoded image, ready to be drawn.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub url: Url,
    pub pixels: RgbaImage,
    pub cors_allowed: bool,
}

impl LoadedImage {
    pub fn natural_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(256)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

fn decode(url: &Url, bytes: &[u8]) -> Result<RgbaImage, LoadError> {
    let decode_err = |reason: String| LoadError::Decode {
        url: url.to_string(),
        reason,
    };
    if looks_like_svg(bytes) {
        let svg = String::from_utf8_lossy(bytes);
        let png = raster::svg_to_png(&svg, &RasterOptions::default())
            .map_err(|err| decode_err(err.to_string()))?;
        return image::load_from_memory(&png)
            .map(|img| img.to_rgba8())
            .map_err(|err| decode_err(err.to_string()));
    }
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|err| decode_err(err.to_string()))
}

#[derive(Clone)]
pub struct LoadProber {
    source: Arc<dyn AssetSource>,
    timeout: Duration,
}

impl std::fmt::Debug for LoadProber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadProber")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LoadProber {
    pub fn new(source: Arc<dyn AssetSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches and decodes `url`. Whichever of load, error or timeout happens first settles the
    /// call; a timed-out fetch is dropped.
    pub async fn load(&self, url: &Url) -> Result<LoadedImage, LoadError> {
        let attempt = async {
            let fetched = self.source.fetch(url).await?;
            let pixels = decode(url, &fetched.bytes)?;
            Ok::<_, LoadError>(LoadedImage {
                url: url.clone(),
                pixels,
                cors_allowed: fetched.cors_allowed,
            })
        };
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(LoadError::TimedOut {
                url: url.to_string(),
                millis: self.timeout.as_millis(),
            }),
        }
    }

    /// Never fails: any load problem is `false`.
    pub async fn probe(&self, url: &Url) -> bool {
        match self.load(url).await {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(%url, error = %err, "probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{FetchedAsset, MemoryAssets};
    use crate::error::AssetError;
    use futures::FutureExt;
    use futures::future::BoxFuture;

    struct Stalled;

    impl AssetSource for Stalled {
        fn fetch<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, Result<FetchedAsset, AssetError>> {
            futures::future::pending().boxed()
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn origin() -> Url {
        Url::parse("http://localhost:3000/").unwrap()
    }

    #[tokio::test]
    async fn loads_and_decodes() {
        let mut assets = MemoryAssets::new(origin());
        assets.insert("/covers/a.png", png_bytes());
        assets.insert("/covers/junk.jpg", b"not an image".to_vec());
        assets.insert(
            "/covers/v.svg",
            br#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="5"/>"#.to_vec(),
        );
        let prober = LoadProber::new(Arc::new(assets), Duration::from_secs(3));

        let loaded = prober
            .load(&origin().join("/covers/a.png").unwrap())
            .await
            .unwrap();
        assert_eq!(loaded.natural_size(), (3, 2));
        let svg = prober
            .load(&origin().join("/covers/v.svg").unwrap())
            .await
            .unwrap();
        assert_eq!(svg.natural_size(), (4, 5));

        assert!(!prober.probe(&origin().join("/covers/junk.jpg").unwrap()).await);
        assert!(!prober.probe(&origin().join("/covers/none.jpg").unwrap()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out() {
        let prober = LoadProber::new(Arc::new(Stalled), Duration::from_secs(3));
        let url = origin().join("/covers/slow.jpg").unwrap();
        let err = prober.load(&url).await.unwrap_err();
        assert!(matches!(err, LoadError::TimedOut { millis: 3000, .. }));
        assert!(!prober.probe(&url).await);
    }
}
