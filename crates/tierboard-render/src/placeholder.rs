//! The "no cover" graphic substituted for images that cannot be materialized.
//!
//! It is drawn in code rather than fetched, so exports never depend on a placeholder asset.

use crate::data_uri::encode_data_uri;
use std::sync::OnceLock;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

pub const PLACEHOLDER_SIZE: u32 = 64;

/// 1x1 gray PNG used if drawing the icon fails.
const FALLBACK_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn paint(r: u8, g: u8, b: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(r, g, b, 255));
    paint.anti_alias = true;
    paint
}

fn draw() -> Option<Vec<u8>> {
    let size = PLACEHOLDER_SIZE as f32;
    let mut pixmap = Pixmap::new(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)?;
    pixmap.fill(Color::from_rgba8(0x37, 0x41, 0x51, 255));

    let frame = PathBuilder::from_rect(Rect::from_xywh(8.0, 8.0, size - 16.0, size - 16.0)?);
    let stroke = Stroke {
        width: 2.0,
        ..Stroke::default()
    };
    pixmap.stroke_path(&frame, &paint(0x6b, 0x72, 0x80), &stroke, Transform::identity(), None);

    // Picture glyph: a sun over two peaks.
    let glyph = paint(0x9c, 0xa3, 0xaf);
    let sun = PathBuilder::from_circle(24.0, 24.0, 5.0)?;
    pixmap.fill_path(&sun, &glyph, FillRule::Winding, Transform::identity(), None);

    let mut pb = PathBuilder::new();
    pb.move_to(14.0, 48.0);
    pb.line_to(28.0, 32.0);
    pb.line_to(36.0, 40.0);
    pb.line_to(42.0, 34.0);
    pb.line_to(50.0, 48.0);
    pb.close();
    let peaks = pb.finish()?;
    pixmap.fill_path(&peaks, &glyph, FillRule::Winding, Transform::identity(), None);

    pixmap.encode_png().ok()
}

/// PNG bytes of the placeholder icon; identical on every call.
pub fn placeholder_png() -> &'static [u8] {
    static PNG: OnceLock<Vec<u8>> = OnceLock::new();
    PNG.get_or_init(|| {
        draw().unwrap_or_else(|| {
            tracing::warn!("drawing the placeholder failed; using the 1x1 fallback");
            use base64::Engine as _;
            base64::engine::general_purpose::STANDARD
                .decode(FALLBACK_PNG_BASE64)
                .unwrap_or_default()
        })
    })
}

pub fn placeholder_data_uri() -> &'static str {
    static URI: OnceLock<String> = OnceLock::new();
    URI.get_or_init(|| encode_data_uri("image/png", placeholder_png()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_a_stable_png() {
        let png = placeholder_png();
        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
        let decoded = image::load_from_memory(png).unwrap();
        assert_eq!(decoded.width(), PLACEHOLDER_SIZE);
        assert_eq!(placeholder_data_uri(), placeholder_data_uri());
        assert!(placeholder_data_uri().starts_with("data:image/png;base64,"));
    }
}
