//! Bitmap snapshot backend: walks the cloned render boxes and paints them onto a pixmap.
//!
//! Like canvas-based snapshot libraries it understands only sRGB color notations; a computed
//! `oklch()` or `lab()` value makes the whole capture fail.

use crate::backend::{BackendError, ExportPayload, ImageFormat, RasterBackend, RenderSettings};
use crate::data_uri::DataUri;
use crate::fonts::usvg_options;
use crate::raster::{self, RasterError};
use crate::tree::{self, BoxKind, RenderBox};
use tierboard_core::{Color, Document, NodeId, Rect};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform};

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotBackend;

impl SnapshotBackend {
    pub const NAME: &'static str = "snapshot";
}

fn legacy_color(value: &str) -> Result<Color, BackendError> {
    Color::parse_legacy(value).map_err(|source| BackendError::Color {
        value: value.to_string(),
        source,
    })
}

fn solid(color: Color, opacity: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    let a = (f32::from(color.a) * opacity).round().clamp(0.0, 255.0) as u8;
    paint.set_color_rgba8(color.r, color.g, color.b, a);
    paint.anti_alias = true;
    paint
}

/// Rectangle path with optional rounded corners (quadratic approximations).
pub(crate) fn box_path(rect: Rect, radius: f32) -> Option<Path> {
    let r = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
    if r <= 0.0 {
        let rect = tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)?;
        return Some(PathBuilder::from_rect(rect));
    }
    let (x, y, right, bottom) = (rect.x, rect.y, rect.right(), rect.bottom());
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.quad_to(right, y, right, y + r);
    pb.line_to(right, bottom - r);
    pb.quad_to(right, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.quad_to(x, bottom, x, bottom - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

struct Painter {
    pixmap: Pixmap,
    scale: Transform,
    ratio: f32,
}

impl Painter {
    fn paint_box(&mut self, b: &RenderBox) -> Result<(), BackendError> {
        let opacity = b.style.opacity();
        if let BoxKind::Text(text) = &b.kind {
            return self.paint_text(b, text, opacity);
        }

        let background = legacy_color(b.style.background_color())?;
        let border_width = b.style.border_width();
        let border = if border_width > 0.0 {
            Some(legacy_color(b.style.border_color())?)
        } else {
            None
        };
        let path = box_path(b.rect, b.style.border_radius());

        if let Some(path) = &path {
            if !background.is_transparent() {
                self.pixmap.fill_path(
                    path,
                    &solid(background, opacity),
                    FillRule::Winding,
                    self.scale,
                    None,
                );
            }
        }
        if let BoxKind::Image { src } = &b.kind {
            self.paint_image(b, src, opacity);
        }
        if let (Some(path), Some(border)) = (&path, border) {
            let stroke = Stroke {
                width: border_width,
                ..Stroke::default()
            };
            self.pixmap
                .stroke_path(path, &solid(border, opacity), &stroke, self.scale, None);
        }
        Ok(())
    }

    /// Undecodable or non-inline images are skipped, leaving the box background visible.
    fn paint_image(&mut self, b: &RenderBox, src: &str, opacity: f32) {
        let Some(data) = DataUri::parse(src) else {
            tracing::warn!(node = %b.node, src, "snapshot skips non-inline image");
            return;
        };
        let image = if data.is_svg() {
            let svg = String::from_utf8_lossy(&data.bytes);
            raster::svg_to_pixmap(&svg, 1.0, None)
        } else {
            raster::decode_bitmap(&data.bytes)
        };
        let image = match image {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(node = %b.node, error = %err, "snapshot skips undecodable image");
                return;
            }
        };

        let sx = b.rect.width * self.ratio / image.width() as f32;
        let sy = b.rect.height * self.ratio / image.height() as f32;
        let transform = Transform::from_row(
            sx,
            0.0,
            0.0,
            sy,
            b.rect.x * self.ratio,
            b.rect.y * self.ratio,
        );
        let paint = PixmapPaint {
            opacity,
            quality: tiny_skia::FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, image.as_ref(), &paint, transform, None);
    }

    fn paint_text(&mut self, b: &RenderBox, text: &str, opacity: f32) -> Result<(), BackendError> {
        let color = legacy_color(b.style.color())?;
        let place = tree::place_text(b.rect, &b.style);
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}"><text x="{x}" y="{y}" font-size="{size}" font-family="{family}" font-weight="{weight}" fill="{fill}" fill-opacity="{alpha}" text-anchor="{anchor}">{text}</text></svg>"#,
            w = (b.rect.right() + 1.0).max(1.0),
            h = (b.rect.bottom() + 1.0).max(1.0),
            x = place.x,
            y = place.y,
            size = b.style.font_size(),
            family = htmlize::escape_attribute(b.style.font_family()),
            weight = b.style.font_weight(),
            fill = Color { a: 255, ..color }.to_hex(),
            alpha = color.alpha_f32() * opacity,
            anchor = place.anchor,
            text = htmlize::escape_text(text),
        );
        let tree = usvg::Tree::from_str(&svg, &usvg_options()).map_err(|_| RasterError::SvgParse)?;
        resvg::render(&tree, self.scale, &mut self.pixmap.as_mut());
        Ok(())
    }
}

impl RasterBackend for SnapshotBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn needs_legacy_colors(&self) -> bool {
        true
    }

    fn supports(&self, format: ImageFormat) -> bool {
        format.is_bitmap()
    }

    fn render(
        &self,
        doc: &Document,
        root: NodeId,
        settings: &RenderSettings,
    ) -> Result<ExportPayload, BackendError> {
        if !self.supports(settings.format) {
            return Err(BackendError::Unsupported {
                backend: Self::NAME,
                format: settings.format,
            });
        }
        let tree = tree::build(doc, root, &settings.filter)?;
        let ratio = settings.pixel_ratio.max(0.01);
        let width = (tree.width * ratio).ceil().max(1.0) as u32;
        let height = (tree.height * ratio).ceil().max(1.0) as u32;
        let pixmap = Pixmap::new(width, height).ok_or(RasterError::PixmapAlloc)?;
        let mut painter = Painter {
            pixmap,
            scale: Transform::from_scale(ratio, ratio),
            ratio,
        };

        let background = match settings.background.as_deref() {
            Some(bg) => Some(legacy_color(bg)?),
            None if settings.format == ImageFormat::Jpeg => Some(Color::WHITE),
            None => None,
        };
        if let Some(bg) = background {
            if settings.format == ImageFormat::Jpeg && !bg.is_opaque() {
                return Err(RasterError::JpegOpaqueBackgroundRequired.into());
            }
            painter.pixmap.fill(raster::to_skia(bg));
        }

        let mut boxes = Vec::new();
        tree.root.walk(&mut boxes);
        tracing::debug!(boxes = boxes.len(), width, height, "painting snapshot");
        for b in boxes {
            painter.paint_box(b)?;
        }

        let bytes = match settings.format {
            ImageFormat::Jpeg => {
                raster::pixmap_to_jpeg(&painter.pixmap, settings.jpeg_quality())?
            }
            _ => raster::pixmap_to_png(&painter.pixmap)?,
        };
        Ok(ExportPayload::Blob {
            bytes,
            mime: settings.format.mime(),
        })
    }
}
