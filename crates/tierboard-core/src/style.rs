//! A deliberately small CSS cascade: declaration blocks, compound/descendant selectors, and the
//! handful of properties the export backends read.

use crate::dom::{Document, NodeId};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

const INHERITED: &[&str] = &[
    "color",
    "font-size",
    "font-family",
    "font-weight",
    "text-align",
    "visibility",
];

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"))
}

/// Splits a value on ASCII whitespace while keeping parenthesized groups intact, so
/// `1px solid oklch(50% 0.1 20)` yields three tokens.
pub fn split_value_tokens(value: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    for (i, ch) in value.char_indices() {
        match ch {
            '(' => {
                depth += 1;
                start.get_or_insert(i);
            }
            ')' => depth = depth.saturating_sub(1),
            c if c.is_ascii_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    out.push(&value[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        out.push(&value[s..]);
    }
    out
}

/// Ordered `property: value` pairs as found in a `style` attribute or a rule body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations(IndexMap<String, String>);

impl Declarations {
    pub fn parse(text: &str) -> Self {
        let mut out = Self::default();
        // Semicolons inside parentheses (e.g. data URIs) are not separators.
        let mut depth = 0usize;
        let mut start = 0usize;
        for (i, ch) in text.char_indices() {
            match ch {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ';' if depth == 0 => {
                    out.push_chunk(&text[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        out.push_chunk(&text[start..]);
        out
    }

    fn push_chunk(&mut self, chunk: &str) {
        if let Some((k, v)) = chunk.split_once(':') {
            let (k, v) = (k.trim(), v.trim());
            if !k.is_empty() && !v.is_empty() {
                self.set(k, v);
            }
        }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.0.get(property).map(String::as_str)
    }

    pub fn set(&mut self, property: &str, value: &str) {
        self.0
            .insert(property.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    pub fn remove(&mut self, property: &str) -> Option<String> {
        self.0.shift_remove(property)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_css_text(&self) -> String {
        let mut out = String::new();
        for (k, v) in &self.0 {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(k);
            out.push_str(": ");
            out.push_str(v);
            out.push(';');
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(text: &str) -> Option<Self> {
        let mut out = Self::default();
        let mut rest = text;
        let head_end = rest.find(['.', '#']).unwrap_or(rest.len());
        let head = &rest[..head_end];
        if !head.is_empty() && head != "*" {
            if !head.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return None;
            }
            out.tag = Some(head.to_ascii_lowercase());
        }
        rest = &rest[head_end..];
        while !rest.is_empty() {
            let marker = rest.as_bytes()[0];
            let body = &rest[1..];
            let end = body.find(['.', '#']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return None;
            }
            match marker {
                b'.' => out.classes.push(name.to_string()),
                b'#' => out.id = Some(name.to_string()),
                _ => return None,
            }
            rest = &body[end..];
        }
        Some(out)
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| doc.has_class(node, c))
    }

    fn specificity(&self) -> (u32, u32, u32) {
        (
            u32::from(self.id.is_some()),
            self.classes.len() as u32,
            u32::from(self.tag.is_some()),
        )
    }
}

/// Compound selectors joined by the descendant combinator; the last compound is the subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    parts: Vec<Compound>,
}

impl Selector {
    pub fn parse(text: &str) -> Option<Self> {
        let parts = text
            .split_ascii_whitespace()
            .map(Compound::parse)
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(Self { parts })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some((subject, rest)) = self.parts.split_last() else {
            return false;
        };
        if !subject.matches(doc, node) {
            return false;
        }
        let mut pending = rest.iter().rev().peekable();
        for ancestor in doc.ancestors(node) {
            let Some(next) = pending.peek() else {
                break;
            };
            if next.matches(doc, ancestor) {
                pending.next();
            }
        }
        pending.peek().is_none()
    }

    fn specificity(&self) -> (u32, u32, u32) {
        self.parts.iter().fold((0, 0, 0), |acc, c| {
            let s = c.specificity();
            (acc.0 + s.0, acc.1 + s.1, acc.2 + s.2)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selectors: Vec<Selector>,
    pub declarations: Declarations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    rules: Vec<StyleRule>,
}

impl Stylesheet {
    /// Parses flat rule lists; at-rules and unparseable selectors are skipped.
    pub fn parse(css: &str) -> Self {
        let css = comment_regex().replace_all(css, "");
        let mut out = Self::default();
        for block in css.split('}') {
            let Some((selector_text, body)) = block.split_once('{') else {
                continue;
            };
            let selector_text = selector_text.trim();
            if selector_text.starts_with('@') {
                tracing::debug!(rule = selector_text, "skipping at-rule");
                continue;
            }
            out.add_rule(selector_text, body);
        }
        out
    }

    pub fn add_rule(&mut self, selector_text: &str, body: &str) {
        let selectors: Vec<Selector> = selector_text
            .split(',')
            .filter_map(|s| Selector::parse(s.trim()))
            .collect();
        if selectors.is_empty() {
            return;
        }
        self.rules.push(StyleRule {
            selectors,
            declarations: Declarations::parse(body),
        });
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    /// Declaration blocks applying to `node`, ordered by specificity then source order.
    pub fn matching<'a>(&'a self, doc: &Document, node: NodeId) -> Vec<&'a Declarations> {
        let mut hits: Vec<((u32, u32, u32), usize, &Declarations)> = Vec::new();
        for (idx, rule) in self.rules.iter().enumerate() {
            let best = rule
                .selectors
                .iter()
                .filter(|s| s.matches(doc, node))
                .map(Selector::specificity)
                .max();
            if let Some(specificity) = best {
                hits.push((specificity, idx, &rule.declarations));
            }
        }
        hits.sort_by_key(|(specificity, idx, _)| (*specificity, *idx));
        hits.into_iter().map(|(_, _, d)| d).collect()
    }
}

/// Resolved property values for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    values: IndexMap<String, String>,
}

impl ComputedStyle {
    pub fn initial() -> Self {
        let mut values = IndexMap::new();
        for (k, v) in [
            ("display", "block"),
            ("color", "#000000"),
            ("background-color", "transparent"),
            ("border-width", "0px"),
            ("border-style", "none"),
            ("border-color", "currentcolor"),
            ("font-size", "16px"),
            ("font-family", "sans-serif"),
            ("font-weight", "400"),
            ("text-align", "start"),
            ("visibility", "visible"),
            ("opacity", "1"),
        ] {
            values.insert(k.to_string(), v.to_string());
        }
        Self { values }
    }

    /// Initial values overlaid with the inheritable properties of `self`.
    pub fn inherited(&self) -> Self {
        let mut out = Self::initial();
        for prop in INHERITED {
            if let Some(v) = self.values.get(*prop) {
                out.values.insert((*prop).to_string(), v.clone());
            }
        }
        out
    }

    pub fn apply(&mut self, decls: &Declarations) {
        for (k, v) in decls.iter() {
            match k {
                "border" => self.apply_border_shorthand(v),
                "background" => {
                    if !v.contains("url(") && !v.contains("gradient(") {
                        self.set("background-color", v);
                    }
                }
                _ => self.set(k, v),
            }
        }
    }

    fn apply_border_shorthand(&mut self, value: &str) {
        for token in split_value_tokens(value) {
            let lower = token.to_ascii_lowercase();
            if parse_length_px(&lower).is_some() {
                self.set("border-width", token);
            } else if matches!(
                lower.as_str(),
                "none" | "solid" | "dashed" | "dotted" | "double" | "hidden"
            ) {
                self.set("border-style", token);
            } else {
                self.set("border-color", token);
            }
        }
    }

    fn set(&mut self, property: &str, value: &str) {
        let value = value.trim().trim_end_matches("!important").trim();
        self.values.insert(property.to_string(), value.to_string());
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.values.get(property).map(String::as_str)
    }

    pub fn display(&self) -> &str {
        self.get("display").unwrap_or("block")
    }

    pub fn is_hidden(&self) -> bool {
        self.display().eq_ignore_ascii_case("none")
            || self
                .get("visibility")
                .is_some_and(|v| v.eq_ignore_ascii_case("hidden"))
    }

    pub fn color(&self) -> &str {
        self.get("color").unwrap_or("#000000")
    }

    pub fn background_color(&self) -> &str {
        self.get("background-color").unwrap_or("transparent")
    }

    /// `currentcolor` resolves to the element's `color`.
    pub fn border_color(&self) -> &str {
        match self.get("border-color") {
            Some(v) if !v.eq_ignore_ascii_case("currentcolor") => v,
            _ => self.color(),
        }
    }

    /// Border width in px, zero when the border style suppresses painting.
    pub fn border_width(&self) -> f32 {
        let style = self.get("border-style").unwrap_or("none");
        let width = self
            .get("border-width")
            .and_then(parse_length_px)
            .unwrap_or(0.0);
        // A bare width paints solid, matching the `border-style: solid` preflight reset.
        if style.eq_ignore_ascii_case("hidden") {
            0.0
        } else {
            width
        }
    }

    pub fn border_radius(&self) -> f32 {
        self.get("border-radius")
            .and_then(parse_length_px)
            .unwrap_or(0.0)
    }

    pub fn font_size(&self) -> f32 {
        self.get("font-size")
            .and_then(parse_length_px)
            .unwrap_or(16.0)
    }

    pub fn font_family(&self) -> &str {
        self.get("font-family").unwrap_or("sans-serif")
    }

    pub fn font_weight(&self) -> u16 {
        match self.get("font-weight").unwrap_or("400") {
            "bold" => 700,
            "normal" => 400,
            other => other.parse().unwrap_or(400),
        }
    }

    pub fn text_align(&self) -> &str {
        self.get("text-align").unwrap_or("start")
    }

    pub fn opacity(&self) -> f32 {
        self.get("opacity")
            .and_then(|v| v.parse::<f32>().ok())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(1.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parses `12px`, `12` or `0`; other units are not laid out by this model.
pub fn parse_length_px(value: &str) -> Option<f32> {
    let v = value.trim();
    let num = v.strip_suffix("px").unwrap_or(v);
    let n = num.trim().parse::<f32>().ok()?;
    n.is_finite().then_some(n)
}
