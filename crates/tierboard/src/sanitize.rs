//! Temporarily swaps wide-gamut computed colors for legacy sRGB ones so the snapshot backend can
//! parse them.

use rustc_hash::FxHashMap;
use tierboard_core::{Document, NodeId, uses_wide_gamut_function};

/// Substitutes written over offending channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeColors {
    pub background: String,
    pub text: String,
    pub border: String,
}

impl Default for SafeColors {
    fn default() -> Self {
        Self {
            background: "#000000".to_string(),
            text: "#ffffff".to_string(),
            border: "#333333".to_string(),
        }
    }
}

/// Original inline style text of every element the sanitizer touched.
///
/// Consumed by [`StyleRestore::restore`], so restoring can happen at most once.
#[must_use = "styles stay overridden until the restore is applied"]
#[derive(Debug, Default)]
pub struct StyleRestore {
    originals: FxHashMap<NodeId, String>,
    order: Vec<NodeId>,
    skipped: usize,
}

impl StyleRestore {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Elements whose style could not be inspected.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.originals.contains_key(&node)
    }

    /// Puts every recorded inline style back verbatim; an empty original removes the attribute.
    pub fn restore(mut self, doc: &mut Document) -> usize {
        let restored = self.order.len();
        for node in self.order.drain(..) {
            if let Some(original) = self.originals.remove(&node) {
                doc.set_inline_style(node, &original);
            }
        }
        restored
    }
}

/// Walks `root` and its descendants, overriding any computed background, text or border color
/// that uses a wide-gamut function.
pub fn sanitize(doc: &mut Document, root: NodeId, colors: &SafeColors) -> StyleRestore {
    let mut restore = StyleRestore::default();
    for node in doc.descendants(root) {
        if !doc.is_element(node) {
            continue;
        }
        let style = match doc.computed_style(node) {
            Ok(style) => style,
            Err(err) => {
                tracing::warn!(%node, error = %err, "skipping style sanitize");
                restore.skipped += 1;
                continue;
            }
        };

        let mut overrides: Vec<(&str, &str)> = Vec::new();
        if uses_wide_gamut_function(style.background_color()) {
            overrides.push(("background-color", colors.background.as_str()));
        }
        if uses_wide_gamut_function(style.color()) {
            overrides.push(("color", colors.text.as_str()));
        }
        if style.border_width() > 0.0 && uses_wide_gamut_function(style.border_color()) {
            overrides.push(("border-color", colors.border.as_str()));
        }
        if overrides.is_empty() {
            continue;
        }

        if !restore.originals.contains_key(&node) {
            restore
                .originals
                .insert(node, doc.inline_style(node).to_string());
            restore.order.push(node);
        }
        for (property, value) in overrides {
            doc.set_style_property(node, property, value);
        }
    }
    tracing::debug!(
        overridden = restore.len(),
        skipped = restore.skipped,
        "sanitized styles"
    );
    restore
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierboard_core::{Color, Stylesheet};
    use url::Url;

    fn doc() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new(Url::parse("http://localhost:3000/").unwrap());
        doc.set_stylesheet(Stylesheet::parse(
            ".board { background-color: oklch(0.145 0 0); color: oklch(0.985 0 0); }\n\
             .row { border: 1px solid oklch(0.269 0 0); }\n\
             .plain { background-color: #1f2937; }",
        ));
        let body = doc.body();
        let board = doc.create_element("div");
        doc.set_attr(board, "class", "board");
        doc.set_inline_style(board, "width: 960px");
        let row = doc.create_element("div");
        doc.set_attr(row, "class", "row");
        let plain = doc.create_element("div");
        doc.set_attr(plain, "class", "plain");
        doc.append_child(body, board);
        doc.append_child(board, row);
        doc.append_child(row, plain);
        (doc, board, row, plain)
    }

    #[test]
    fn overrides_only_offending_channels_and_restores_verbatim() {
        let (mut d, board, row, plain) = doc();
        let restore = sanitize(&mut d, board, &SafeColors::default());

        assert!(restore.contains(board));
        assert!(restore.contains(row));
        assert!(!restore.contains(plain));
        assert_eq!(
            d.inline_style(board),
            "width: 960px; background-color: #000000; color: #ffffff;"
        );
        assert_eq!(d.inline_style(row), "border-color: #333333;");

        for n in d.descendants(board) {
            let style = d.computed_style(n).unwrap();
            assert!(Color::parse_legacy(style.background_color()).is_ok());
            assert!(Color::parse_legacy(style.color()).is_ok());
        }

        assert_eq!(restore.restore(&mut d), 2);
        assert_eq!(d.inline_style(board), "width: 960px");
        assert_eq!(d.attr(row, "style"), None);
        assert_eq!(d.attr(plain, "style"), None);
    }

    #[test]
    fn detached_nodes_are_skipped() {
        let (mut d, board, _, _) = doc();
        d.detach(board);
        let restore = sanitize(&mut d, board, &SafeColors::default());
        assert!(restore.is_empty());
        assert_eq!(restore.skipped(), 3);
    }
}
