//! Placeholder results served while the upstream is unhealthy.
//!
//! Everything here is a pure function of the query: no clock, no I/O, and
//! the output has the same shape as a real upstream response.
use crate::model::{Author, Entry, FrontMatter, Page};
use crate::query::CatalogQuery;

pub const UNAVAILABLE_TITLE: &str = "Service is unavailable now x( !";
pub const UNAVAILABLE_CONTENT: &str = "Wait a minute...";
pub const SYSTEM_AUTHOR: &str = "system";
pub const UNAVAILABLE_WORDS: [&str; 4] = ["Service", "is", "unavailable", "now"];

/// A result type that can stand in for itself when the real call is skipped
/// or fails.
pub trait Synthesize: Sized {
    fn synthesize(query: &CatalogQuery) -> Self;
}

pub fn placeholder_entry(entry_id: i64) -> Entry {
    let system = Author {
        name: SYSTEM_AUTHOR.to_string(),
        date: None,
    };
    Entry {
        entry_id,
        content: UNAVAILABLE_CONTENT.to_string(),
        created: system.clone(),
        updated: system,
        front_matter: FrontMatter {
            title: UNAVAILABLE_TITLE.to_string(),
            tags: Vec::new(),
            categories: Vec::new(),
        },
    }
}

/// Single-entry page: first and last of exactly one page.
pub fn placeholder_page() -> Page<Entry> {
    Page::new(vec![placeholder_entry(0)], 0, 1, 1)
}

pub fn placeholder_tags() -> Vec<String> {
    UNAVAILABLE_WORDS.iter().map(|w| w.to_string()).collect()
}

pub fn placeholder_categories() -> Vec<Vec<String>> {
    vec![placeholder_tags()]
}

impl Synthesize for Page<Entry> {
    fn synthesize(_query: &CatalogQuery) -> Self {
        placeholder_page()
    }
}

impl Synthesize for Entry {
    fn synthesize(query: &CatalogQuery) -> Self {
        placeholder_entry(query.entry_id().unwrap_or(0))
    }
}

impl Synthesize for Vec<String> {
    fn synthesize(_query: &CatalogQuery) -> Self {
        placeholder_tags()
    }
}

impl Synthesize for Vec<Vec<String>> {
    fn synthesize(_query: &CatalogQuery) -> Self {
        placeholder_categories()
    }
}
