//! Shared `usvg` options. Loading system fonts is slow, so the database is built once per process.

use std::sync::{Arc, OnceLock};
use usvg::fontdb;

/// Generic family names fall back to this face, matching the board's `Arial, sans-serif` stack.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

fn font_database() -> Arc<fontdb::Database> {
    static DB: OnceLock<Arc<fontdb::Database>> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded system fonts");
        Arc::new(db)
    })
    .clone()
}

pub fn usvg_options() -> usvg::Options<'static> {
    let mut opt = usvg::Options::default();
    opt.fontdb = font_database();
    opt.font_family = DEFAULT_FONT_FAMILY.to_string();
    opt
}
