use std::fmt;
use std::sync::Arc;
use tierboard_core::{Document, NodeId};

type Predicate = Arc<dyn Fn(&Document, NodeId) -> bool + Send + Sync>;

/// Decides which elements a backend must not capture.
///
/// `script` and `style` elements and anything carrying the `export-hidden` class are always
/// excluded; callers can add tags, classes and a predicate on top.
#[derive(Clone)]
pub struct ExclusionFilter {
    tags: Vec<String>,
    classes: Vec<String>,
    predicate: Option<Predicate>,
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self {
            tags: vec!["script".to_string(), "style".to_string()],
            classes: vec!["export-hidden".to_string()],
            predicate: None,
        }
    }
}

impl fmt::Debug for ExclusionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionFilter")
            .field("tags", &self.tags)
            .field("classes", &self.classes)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl ExclusionFilter {
    pub fn with_tag(mut self, tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        let class = class.trim().to_string();
        if !class.is_empty() && !self.classes.contains(&class) {
            self.classes.push(class);
        }
        self
    }

    /// Adds an element-level ignore predicate; returning `true` excludes the element.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Document, NodeId) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Whether `node` (and with it its subtree) is left out of the capture.
    pub fn excludes(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if self.tags.iter().any(|t| t == tag) {
            return true;
        }
        if self.classes.iter().any(|c| doc.has_class(node, c)) {
            return true;
        }
        self.predicate.as_ref().is_some_and(|p| p(doc, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn default_rules_and_predicate() {
        let mut doc = Document::new(Url::parse("http://localhost:3000/").unwrap());
        let body = doc.body();
        let script = doc.create_element("script");
        let button = doc.create_element("button");
        doc.set_attr(button, "class", "remove-button export-hidden");
        let card = doc.create_element("div");
        doc.set_attr(card, "data-skip", "1");
        let text = doc.create_text("x");
        for n in [script, button, card, text] {
            doc.append_child(body, n);
        }

        let filter = ExclusionFilter::default();
        assert!(filter.excludes(&doc, script));
        assert!(filter.excludes(&doc, button));
        assert!(!filter.excludes(&doc, card));
        assert!(!filter.excludes(&doc, text));

        let filter = filter.with_predicate(|doc, n| doc.attr(n, "data-skip").is_some());
        assert!(filter.excludes(&doc, card));
    }
}
