//! DOM-serialization backend: writes the visible subtree as a self-contained SVG document.
//!
//! Images are embedded as the `data:` URIs already present on the document; colors in any
//! supported notation (including `oklch()`) are converted to sRGB hex. Bitmap formats are
//! produced by rasterizing that SVG.

use crate::backend::{BackendError, ExportPayload, ImageFormat, RasterBackend, RenderSettings};
use crate::raster::{self, RasterOptions};
use crate::tree::{self, BoxKind, RenderBox, RenderTree};
use htmlize::{escape_attribute, escape_text};
use std::fmt::Write as _;
use tierboard_core::{Color, ComputedStyle, Document, NodeId};

#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeBackend;

impl SerializeBackend {
    pub const NAME: &'static str = "serialize";
}

fn fill_attrs(value: &str, attr: &str) -> Option<String> {
    match Color::parse(value) {
        Ok(c) if c.is_transparent() => None,
        Ok(c) if c.is_opaque() => Some(format!(r#" {attr}="{}""#, c.to_hex())),
        Ok(c) => Some(format!(
            r#" {attr}="{}" {attr}-opacity="{:.3}""#,
            Color { a: 255, ..c }.to_hex(),
            c.alpha_f32()
        )),
        Err(err) => {
            tracing::warn!(value, error = %err, "serializer drops unparseable color");
            None
        }
    }
}

fn fmt_num(v: f32) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

struct Writer {
    out: String,
}

impl Writer {
    fn write_box(&mut self, b: &RenderBox) {
        match &b.kind {
            BoxKind::Text(text) => {
                self.write_text(b, text);
                return;
            }
            BoxKind::Element | BoxKind::Image { .. } => {}
        }

        let _ = write!(self.out, "<g");
        if !b.classes.is_empty() {
            let _ = write!(self.out, r#" class="{}""#, escape_attribute(b.classes.join(" ")));
        }
        let opacity = b.style.opacity();
        if opacity < 1.0 {
            let _ = write!(self.out, r#" opacity="{}""#, fmt_num(opacity));
        }
        self.out.push('>');

        self.write_frame(b.rect, &b.style);
        if let BoxKind::Image { src } = &b.kind {
            self.write_image(b, src);
        }
        for child in &b.children {
            self.write_box(child);
        }
        self.out.push_str("</g>");
    }

    fn write_frame(&mut self, rect: tierboard_core::Rect, style: &ComputedStyle) {
        let fill = fill_attrs(style.background_color(), "fill");
        let border_width = style.border_width();
        let stroke = if border_width > 0.0 {
            fill_attrs(style.border_color(), "stroke")
        } else {
            None
        };
        if fill.is_none() && stroke.is_none() {
            return;
        }
        let _ = write!(
            self.out,
            r#"<rect x="{}" y="{}" width="{}" height="{}""#,
            fmt_num(rect.x),
            fmt_num(rect.y),
            fmt_num(rect.width),
            fmt_num(rect.height)
        );
        let radius = style.border_radius();
        if radius > 0.0 {
            let _ = write!(self.out, r#" rx="{}""#, fmt_num(radius));
        }
        self.out.push_str(fill.as_deref().unwrap_or(r#" fill="none""#));
        if let Some(stroke) = stroke {
            let _ = write!(self.out, r#"{stroke} stroke-width="{}""#, fmt_num(border_width));
        }
        self.out.push_str("/>");
    }

    fn write_image(&mut self, b: &RenderBox, src: &str) {
        if !src.starts_with("data:") {
            tracing::warn!(node = %b.node, src, "serializer skips non-inline image");
            return;
        }
        let _ = write!(
            self.out,
            r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" href="{}"/>"#,
            fmt_num(b.rect.x),
            fmt_num(b.rect.y),
            fmt_num(b.rect.width),
            fmt_num(b.rect.height),
            escape_attribute(src)
        );
    }

    fn write_text(&mut self, b: &RenderBox, text: &str) {
        let Some(fill) = fill_attrs(b.style.color(), "fill") else {
            return;
        };
        let place = tree::place_text(b.rect, &b.style);
        let _ = write!(
            self.out,
            r#"<text x="{}" y="{}" font-size="{}" font-family="{}" font-weight="{}" text-anchor="{}"{fill}>{}</text>"#,
            fmt_num(place.x),
            fmt_num(place.y),
            fmt_num(b.style.font_size()),
            escape_attribute(b.style.font_family()),
            b.style.font_weight(),
            place.anchor,
            escape_text(text)
        );
    }
}

/// Serializes a render tree into an SVG document sized in CSS pixels.
fn to_svg(tree: &RenderTree, background: Option<&str>) -> String {
    let (w, h) = (fmt_num(tree.width), fmt_num(tree.height));
    let mut writer = Writer {
        out: format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
        ),
    };
    if let Some(fill) = background.and_then(|bg| fill_attrs(bg, "fill")) {
        let _ = write!(writer.out, r#"<rect width="{w}" height="{h}"{fill}/>"#);
    }
    writer.write_box(&tree.root);
    writer.out.push_str("</svg>");
    writer.out
}

impl RasterBackend for SerializeBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn needs_legacy_colors(&self) -> bool {
        false
    }

    fn supports(&self, _format: ImageFormat) -> bool {
        true
    }

    fn render(
        &self,
        doc: &Document,
        root: NodeId,
        settings: &RenderSettings,
    ) -> Result<ExportPayload, BackendError> {
        let tree = tree::build(doc, root, &settings.filter)?;
        let svg = to_svg(&tree, settings.background.as_deref());
        tracing::debug!(bytes = svg.len(), "serialized subtree");

        let options = RasterOptions {
            scale: settings.pixel_ratio.max(0.01),
            background: settings.background.clone(),
            jpeg_quality: settings.jpeg_quality(),
        };
        match settings.format {
            ImageFormat::Svg => Ok(ExportPayload::Text {
                markup: svg,
                mime: ImageFormat::Svg.mime(),
            }),
            ImageFormat::Png => Ok(ExportPayload::Blob {
                bytes: raster::svg_to_png(&svg, &options)?,
                mime: ImageFormat::Png.mime(),
            }),
            ImageFormat::Jpeg => Ok(ExportPayload::Blob {
                bytes: raster::svg_to_jpeg(&svg, &options)?,
                mime: ImageFormat::Jpeg.mime(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_compact() {
        assert_eq!(fmt_num(12.0), "12");
        assert_eq!(fmt_num(0.5), "0.5");
        assert_eq!(fmt_num(1.0 / 3.0), "0.33");
    }

    #[test]
    fn colors_convert_to_hex() {
        assert_eq!(
            fill_attrs("oklch(1 0 0)", "fill").as_deref(),
            Some(r##" fill="#ffffff""##)
        );
        assert_eq!(fill_attrs("transparent", "fill"), None);
        assert_eq!(
            fill_attrs("rgba(0, 0, 0, 0.5)", "stroke").as_deref(),
            Some(r##" stroke="#000000" stroke-opacity="0.502""##)
        );
    }
}
