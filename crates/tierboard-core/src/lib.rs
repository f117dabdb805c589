#![forbid(unsafe_code)]

//! Headless model of a ranking board: an arena document with a small style cascade, CSS color
//! parsing (legacy and wide-gamut), and canonical cover-image paths.
//!
//! Nothing here renders pixels; see `tierboard-render` for the capture backends.

pub mod board;
pub mod color;
pub mod dom;
pub mod paths;
pub mod style;

pub use board::{
    BoardLayout, CONTAINER_ID, Game, Ranking, RankingItem, RankingMode, TierConfig, board_stylesheet,
    default_tiers, render_board,
};
pub use color::{Color, ColorError, uses_wide_gamut_function};
pub use dom::{Document, ElementData, NodeData, NodeId, Rect, is_transient_src};
pub use paths::{
    PathResolver, PathSource, ResolvedPath, ResolverConfig, decode_image_path, encode_image_path,
    normalize_image_path, strip_cache_bust,
};
pub use style::{ComputedStyle, Declarations, Stylesheet};

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("node {node} is not attached to the document")]
    Detached { node: NodeId },

    #[error("node {node} is not an element")]
    NotAnElement { node: NodeId },
}
