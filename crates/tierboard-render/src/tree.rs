use crate::backend::BackendError;
use crate::filter::ExclusionFilter;
use tierboard_core::{ComputedStyle, Document, NodeData, NodeId, Rect};

/// A visible box cloned out of the document, positioned relative to the capture root.
#[derive(Debug, Clone)]
pub(crate) struct RenderBox {
    pub node: NodeId,
    pub rect: Rect,
    pub style: ComputedStyle,
    pub kind: BoxKind,
    pub classes: Vec<String>,
    pub children: Vec<RenderBox>,
}

#[derive(Debug, Clone)]
pub(crate) enum BoxKind {
    Element,
    Image { src: String },
    /// Text runs take the rect and style of their parent element.
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct RenderTree {
    pub root: RenderBox,
    pub width: f32,
    pub height: f32,
}

/// Clones the capturable part of `root`: excluded and hidden elements are dropped along with
/// their subtrees.
pub(crate) fn build(
    doc: &Document,
    root: NodeId,
    filter: &ExclusionFilter,
) -> Result<RenderTree, BackendError> {
    let origin = doc.rect(root);
    if origin.is_empty() {
        return Err(BackendError::EmptyTarget);
    }
    let style = doc.computed_style(root)?;
    if filter.excludes(doc, root) || style.is_hidden() {
        return Err(BackendError::EmptyTarget);
    }
    let root_box = clone_element(doc, root, style, origin, filter)?;
    Ok(RenderTree {
        root: root_box,
        width: origin.width,
        height: origin.height,
    })
}

fn relative(rect: Rect, origin: Rect) -> Rect {
    Rect::new(rect.x - origin.x, rect.y - origin.y, rect.width, rect.height)
}

fn clone_element(
    doc: &Document,
    node: NodeId,
    style: ComputedStyle,
    origin: Rect,
    filter: &ExclusionFilter,
) -> Result<RenderBox, BackendError> {
    let rect = relative(doc.rect(node), origin);
    let kind = match doc.tag(node) {
        Some("img") => BoxKind::Image {
            src: doc.attr(node, "src").unwrap_or_default().trim().to_string(),
        },
        _ => BoxKind::Element,
    };

    let mut children = Vec::new();
    for &child in doc.children(node) {
        match doc.data(child) {
            NodeData::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    children.push(RenderBox {
                        node: child,
                        rect,
                        style: style.clone(),
                        kind: BoxKind::Text(text.to_string()),
                        classes: Vec::new(),
                        children: Vec::new(),
                    });
                }
            }
            NodeData::Element(_) => {
                if filter.excludes(doc, child) {
                    tracing::trace!(node = %child, "excluded from capture");
                    continue;
                }
                let child_style = doc.computed_style(child)?;
                if child_style.is_hidden() {
                    continue;
                }
                children.push(clone_element(doc, child, child_style, origin, filter)?);
            }
        }
    }

    Ok(RenderBox {
        node,
        rect,
        style,
        kind,
        classes: doc.classes(node).map(str::to_string).collect(),
        children,
    })
}

impl RenderBox {
    /// Pre-order walk, parents before children.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a RenderBox>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

/// Baseline position and anchor for a single-line text run centered vertically in `rect`.
pub(crate) struct TextPlacement {
    pub x: f32,
    pub y: f32,
    pub anchor: &'static str,
}

pub(crate) fn place_text(rect: Rect, style: &ComputedStyle) -> TextPlacement {
    let font_size = style.font_size();
    let y = rect.y + rect.height / 2.0 + font_size * 0.35;
    let (x, anchor) = match style.text_align().to_ascii_lowercase().as_str() {
        "center" => (rect.x + rect.width / 2.0, "middle"),
        "right" | "end" => (rect.right() - 4.0, "end"),
        _ => (rect.x + 4.0, "start"),
    };
    TextPlacement { x, y, anchor }
}
