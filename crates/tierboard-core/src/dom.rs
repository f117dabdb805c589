//! Arena-backed document model standing in for the live DOM of the ranking page.
//!
//! Nodes are never freed; detaching a node only unlinks it from its parent, so `NodeId`s held by
//! backup records stay valid for the lifetime of the [`Document`].

use crate::style::{ComputedStyle, Declarations, Stylesheet};
use crate::{DomError, Result};
use indexmap::IndexMap;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Laid-out border box in CSS pixels, relative to the document origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
    rect: Rect,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    origin: Url,
    stylesheet: Stylesheet,
}

impl Document {
    pub fn new(origin: Url) -> Self {
        let body = Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Element(ElementData {
                tag: "body".to_string(),
                attrs: IndexMap::new(),
            }),
            rect: Rect::default(),
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
            origin,
            stylesheet: Stylesheet::default(),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    pub fn stylesheet_mut(&mut self) -> &mut Stylesheet {
        &mut self.stylesheet
    }

    pub fn set_stylesheet(&mut self, stylesheet: Stylesheet) {
        self.stylesheet = stylesheet;
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
            rect: Rect::default(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element(ElementData {
            tag: tag.trim().to_ascii_lowercase(),
            attrs: IndexMap::new(),
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Appends `child` as the last child of `parent`, unlinking it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.0].data
    }

    /// Whether the node is reachable from `<body>`.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cur = node;
        loop {
            if cur == self.body {
                return true;
            }
            match self.nodes[cur.0].parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    pub fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes[node.0].data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[node.0].data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Text(t) => Some(t.as_str()),
            NodeData::Element(_) => None,
        }
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for n in self.descendants(node) {
            if let Some(t) = self.text(n) {
                out.push_str(t);
            }
        }
        out
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .and_then(|el| el.attrs.get(name))
            .map(String::as_str)
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let Some(el) = self.element_mut(node) {
            el.attrs.insert(name.to_string(), value.into());
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Option<String> {
        self.element_mut(node)
            .and_then(|el| el.attrs.shift_remove(name))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    pub fn classes(&self, node: NodeId) -> impl Iterator<Item = &str> {
        self.attr(node, "class")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).any(|c| c == class)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let mut list: Vec<String> = self.classes(node).map(str::to_string).collect();
        list.push(class.to_string());
        self.set_attr(node, "class", list.join(" "));
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if !self.has_class(node, class) {
            return;
        }
        let list: Vec<String> = self
            .classes(node)
            .filter(|c| *c != class)
            .map(str::to_string)
            .collect();
        if list.is_empty() {
            self.remove_attr(node, "class");
        } else {
            self.set_attr(node, "class", list.join(" "));
        }
    }

    /// Inline style text (`style` attribute), empty when unset.
    pub fn inline_style(&self, node: NodeId) -> &str {
        self.attr(node, "style").unwrap_or_default()
    }

    /// Replaces the inline style text verbatim; an empty string removes the attribute.
    pub fn set_inline_style(&mut self, node: NodeId, css_text: &str) {
        if css_text.is_empty() {
            self.remove_attr(node, "style");
        } else {
            self.set_attr(node, "style", css_text);
        }
    }

    pub fn set_style_property(&mut self, node: NodeId, property: &str, value: &str) {
        let mut decls = Declarations::parse(self.inline_style(node));
        decls.set(property, value);
        let text = decls.to_css_text();
        self.set_inline_style(node, &text);
    }

    pub fn rect(&self, node: NodeId) -> Rect {
        self.nodes[node.0].rect
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.nodes[node.0].rect = rect;
    }

    /// Pre-order traversal of `root` and everything below it.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    pub fn images(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.tag(*n) == Some("img"))
            .collect()
    }

    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), |n| self.parent(*n))
    }

    /// Mirrors the `HTMLImageElement.src` getter: relative sources resolve against the origin,
    /// while `data:`/`blob:` sources are returned untouched.
    pub fn image_src(&self, node: NodeId) -> String {
        let raw = self.attr(node, "src").unwrap_or_default().trim();
        if raw.is_empty() {
            return String::new();
        }
        if is_transient_src(raw) {
            return raw.to_string();
        }
        match self.origin.join(raw) {
            Ok(url) => url.to_string(),
            Err(_) => raw.to_string(),
        }
    }

    /// Resolves any URL-ish string against the origin; used to compare sources by value.
    pub fn resolve_url(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.is_empty() || is_transient_src(raw) {
            return raw.to_string();
        }
        match self.origin.join(raw) {
            Ok(url) => url.to_string(),
            Err(_) => raw.to_string(),
        }
    }

    pub fn computed_style(&self, node: NodeId) -> Result<ComputedStyle> {
        if !self.is_element(node) {
            return Err(DomError::NotAnElement { node });
        }
        if !self.is_connected(node) {
            return Err(DomError::Detached { node });
        }

        let mut chain: Vec<NodeId> = self.ancestors(node).collect();
        chain.reverse();
        chain.push(node);

        let mut style = ComputedStyle::initial();
        for n in chain {
            let mut own = style.inherited();
            for decls in self.stylesheet.matching(self, n) {
                own.apply(decls);
            }
            own.apply(&Declarations::parse(self.inline_style(n)));
            style = own;
        }
        Ok(style)
    }
}

/// `data:` and `blob:` URLs are transient representations that carry no asset identity.
pub fn is_transient_src(src: &str) -> bool {
    let s = src.trim_start();
    s.starts_with("data:") || s.starts_with("blob:")
}
