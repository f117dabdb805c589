//! Renders a ranking into the document the way the ranking page does: a header, tier rows or a
//! Top-N grid, and one card per game with its cover image and interactive chrome.
//!
//! Editing rankings (adding, removing, dragging) belongs to the host UI; this module only
//! produces the subtree exports operate on.

use crate::dom::{Document, NodeId, Rect};
use crate::paths::encode_image_path;
use crate::style::Stylesheet;
use serde::{Deserialize, Serialize};

pub const CONTAINER_ID: &str = "ranking-container";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub name: String,
    /// Cover path; defaults to `/covers/<name>.jpg` when absent.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

impl Game {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: None,
            genre: None,
            year: None,
        }
    }

    pub fn cover_path(&self) -> String {
        match &self.image {
            Some(path) => encode_image_path(path),
            None => encode_image_path(&format!("/covers/{}.jpg", self.name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingItem {
    pub id: String,
    pub game: Game,
    pub position: u32,
    #[serde(default)]
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    #[default]
    Top,
    Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub id: String,
    pub name: String,
    /// Row label background, any CSS color.
    pub color: String,
}

pub fn default_tiers() -> Vec<TierConfig> {
    [
        ("t1", "T1", "oklch(0.637 0.237 25.331)"),
        ("t2", "T2", "oklch(0.705 0.213 47.604)"),
        ("t3", "T3", "oklch(0.795 0.184 86.047)"),
        ("t4", "T4", "oklch(0.723 0.219 149.579)"),
        ("t5", "T5", "oklch(0.623 0.214 259.815)"),
    ]
    .into_iter()
    .map(|(id, name, color)| TierConfig {
        id: id.to_string(),
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub mode: RankingMode,
    #[serde(default)]
    pub items: Vec<RankingItem>,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
}

fn default_title() -> String {
    "My Game Ranking".to_string()
}

impl Ranking {
    pub fn new(mode: RankingMode) -> Self {
        Self {
            title: default_title(),
            mode,
            items: Vec::new(),
            tiers: default_tiers(),
        }
    }

    /// Appends a game unless it is already ranked; tier mode defaults to the first tier.
    pub fn push(&mut self, game: Game, tier: Option<&str>) {
        if self.items.iter().any(|item| item.game.id == game.id) {
            return;
        }
        let tier = match self.mode {
            RankingMode::Tier => Some(
                tier.map(str::to_string)
                    .or_else(|| self.tiers.first().map(|t| t.id.clone()))
                    .unwrap_or_else(|| "t1".to_string()),
            ),
            RankingMode::Top => None,
        };
        self.items.push(RankingItem {
            id: format!("{}-{}", game.id, self.items.len() + 1),
            position: self.items.len() as u32 + 1,
            game,
            tier,
        });
    }

    pub fn items_in_tier(&self, tier: &str) -> Vec<&RankingItem> {
        let mut items: Vec<&RankingItem> = self
            .items
            .iter()
            .filter(|item| item.tier.as_deref() == Some(tier))
            .collect();
        items.sort_by_key(|item| item.position);
        items
    }

    pub fn top_items(&self) -> Vec<&RankingItem> {
        let mut items: Vec<&RankingItem> = self.items.iter().collect();
        items.sort_by_key(|item| item.position);
        items
    }
}

/// Fixed geometry for the rendered board, in CSS px.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardLayout {
    pub width: f32,
    pub padding: f32,
    pub gap: f32,
    pub header_height: f32,
    pub tier_label_width: f32,
    pub card_width: f32,
    pub cover_height: f32,
    pub caption_height: f32,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            width: 960.0,
            padding: 16.0,
            gap: 12.0,
            header_height: 64.0,
            tier_label_width: 80.0,
            card_width: 96.0,
            cover_height: 128.0,
            caption_height: 24.0,
        }
    }
}

impl BoardLayout {
    fn card_height(&self) -> f32 {
        self.cover_height + self.caption_height
    }

    fn cards_per_row(&self, available: f32) -> usize {
        let n = ((available + self.gap) / (self.card_width + self.gap)).floor();
        (n as usize).max(1)
    }
}

const BOARD_CSS: &str = r#"
#ranking-container { background-color: oklch(0.145 0 0); color: oklch(0.985 0 0); font-family: Arial, sans-serif; }
.ranking-header { border-color: oklch(0.269 0 0); border-width: 1px; font-size: 24px; font-weight: 700; }
.tier-row { border-color: oklch(0.269 0 0); border-width: 1px; }
.tier-label { color: #ffffff; font-size: 20px; font-weight: 700; text-align: center; }
.game-card { background-color: #1f2937; border-radius: 8px; }
.game-title { font-size: 12px; text-align: center; }
.rank-badge { background-color: #facc15; color: #111827; font-size: 12px; font-weight: 700; text-align: center; }
.export-hidden { background-color: #374151; color: #e5e7eb; }
.exporting .export-hidden { display: none; }
"#;

/// Stylesheet the board is rendered with; colors use `oklch()` like a modern utility-CSS build.
pub fn board_stylesheet() -> Stylesheet {
    Stylesheet::parse(BOARD_CSS)
}

struct Builder<'a> {
    doc: &'a mut Document,
    layout: &'a BoardLayout,
}

impl Builder<'_> {
    fn element(&mut self, parent: NodeId, tag: &str, class: &str, rect: Rect) -> NodeId {
        let n = self.doc.create_element(tag);
        if !class.is_empty() {
            self.doc.set_attr(n, "class", class);
        }
        self.doc.set_rect(n, rect);
        self.doc.append_child(parent, n);
        n
    }

    fn text(&mut self, parent: NodeId, text: &str) {
        let t = self.doc.create_text(text);
        self.doc.append_child(parent, t);
    }

    fn card(&mut self, parent: NodeId, item: &RankingItem, x: f32, y: f32, rank: Option<u32>) {
        let l = self.layout;
        let card = self.element(
            parent,
            "div",
            "game-card",
            Rect::new(x, y, l.card_width, l.card_height()),
        );
        self.doc.set_attr(card, "data-item-id", item.id.as_str());

        let img = self.element(
            card,
            "img",
            "game-cover",
            Rect::new(x, y, l.card_width, l.cover_height),
        );
        self.doc.set_attr(img, "src", item.game.cover_path());
        self.doc.set_attr(img, "alt", item.game.name.as_str());
        self.doc.set_attr(img, "data-game-name", item.game.name.as_str());
        self.doc.set_attr(img, "data-game-id", item.game.id.as_str());

        let caption = self.element(
            card,
            "span",
            "game-title",
            Rect::new(x, y + l.cover_height, l.card_width, l.caption_height),
        );
        self.text(caption, &item.game.name);

        if let Some(rank) = rank {
            let badge = self.element(card, "span", "rank-badge", Rect::new(x, y, 24.0, 20.0));
            self.text(badge, &rank.to_string());
        }

        let remove = self.element(
            card,
            "button",
            "remove-button export-hidden",
            Rect::new(x + l.card_width - 20.0, y, 20.0, 20.0),
        );
        self.doc.set_attr(remove, "aria-label", "Remove");
        self.text(remove, "x");
        self.element(
            card,
            "div",
            "drag-handle export-hidden",
            Rect::new(x, y + l.cover_height - 16.0, l.card_width, 16.0),
        );
    }

    fn add_button(&mut self, parent: NodeId, x: f32, y: f32) {
        let l = self.layout;
        let add = self.element(
            parent,
            "button",
            "add-game-button export-hidden",
            Rect::new(x, y, l.card_width, l.card_height()),
        );
        self.text(add, "+");
    }
}

/// Renders `ranking` under `<body>` as `#ranking-container`, installs the board stylesheet, and
/// returns the container.
pub fn render_board(ranking: &Ranking, doc: &mut Document, layout: &BoardLayout) -> NodeId {
    doc.set_stylesheet(board_stylesheet());
    let body = doc.body();
    let mut b = Builder { doc, layout };
    let l = layout;

    let container = b.element(body, "div", "ranking-board", Rect::new(0.0, 0.0, l.width, 0.0));
    b.doc.set_attr(container, "id", CONTAINER_ID);

    let header = b.element(
        container,
        "div",
        "ranking-header",
        Rect::new(0.0, 0.0, l.width, l.header_height),
    );
    let heading = b.element(
        header,
        "h1",
        "ranking-title",
        Rect::new(l.padding, 0.0, l.width - 2.0 * l.padding, l.header_height),
    );
    b.text(heading, &ranking.title);

    let mut y = l.header_height + l.padding;
    match ranking.mode {
        RankingMode::Tier => {
            let row_x = l.padding + l.tier_label_width + l.gap;
            let available = l.width - row_x - l.padding;
            let per_row = l.cards_per_row(available);
            for tier in &ranking.tiers {
                let items = ranking.items_in_tier(&tier.id);
                // One slot for the add button.
                let slots = items.len() + 1;
                let lines = slots.div_ceil(per_row);
                let row_height =
                    lines as f32 * l.card_height() + (lines as f32 - 1.0) * l.gap + 2.0 * l.gap;

                let row = b.element(
                    container,
                    "div",
                    "tier-row",
                    Rect::new(l.padding, y, l.width - 2.0 * l.padding, row_height),
                );
                b.doc.set_attr(row, "data-tier", tier.id.as_str());
                let label = b.element(
                    row,
                    "div",
                    "tier-label",
                    Rect::new(l.padding, y, l.tier_label_width, row_height),
                );
                b.doc
                    .set_inline_style(label, &format!("background-color: {};", tier.color));
                b.text(label, &tier.name);

                for slot in 0..slots {
                    let col = slot % per_row;
                    let line = slot / per_row;
                    let x = row_x + col as f32 * (l.card_width + l.gap);
                    let cy = y + l.gap + line as f32 * (l.card_height() + l.gap);
                    match items.get(slot) {
                        Some(item) => b.card(row, item, x, cy, None),
                        None => b.add_button(row, x, cy),
                    }
                }
                y += row_height + l.gap;
            }
        }
        RankingMode::Top => {
            let available = l.width - 2.0 * l.padding;
            let per_row = l.cards_per_row(available);
            let grid_top = y;
            let items = ranking.top_items();
            let slots = items.len() + 1;
            let lines = slots.div_ceil(per_row);
            let grid_height = lines as f32 * l.card_height() + (lines as f32 - 1.0) * l.gap;
            let grid = b.element(
                container,
                "div",
                "top-grid",
                Rect::new(l.padding, grid_top, available, grid_height),
            );
            for slot in 0..slots {
                let col = slot % per_row;
                let line = slot / per_row;
                let x = l.padding + col as f32 * (l.card_width + l.gap);
                let cy = grid_top + line as f32 * (l.card_height() + l.gap);
                match items.get(slot) {
                    Some(item) => b.card(grid, item, x, cy, Some(slot as u32 + 1)),
                    None => b.add_button(grid, x, cy),
                }
            }
            y += grid_height + l.gap;
        }
    }

    let height = y + l.padding - l.gap;
    b.doc
        .set_rect(container, Rect::new(0.0, 0.0, l.width, height));
    container
}
