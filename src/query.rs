//! Logical catalog queries and their translation into upstream requests.
//!
//! `build` is pure: it only validates input and lays out raw path segments
//! and query parameters. Escaping happens when the client assembles the URL.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CatalogError, CatalogResult};
use crate::model::PageRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    All,
    BySearchTerm,
    ById,
    ByTag,
    ByCategories,
    ByCreatedBy,
    ByUpdatedBy,
    AllTags,
    AllCategories,
}

impl QueryKind {
    pub const COUNT: usize = 9;

    /// Every kind, in declaration order. `index()` relies on this order.
    pub const ALL: [QueryKind; Self::COUNT] = [
        QueryKind::All,
        QueryKind::BySearchTerm,
        QueryKind::ById,
        QueryKind::ByTag,
        QueryKind::ByCategories,
        QueryKind::ByCreatedBy,
        QueryKind::ByUpdatedBy,
        QueryKind::AllTags,
        QueryKind::AllCategories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::All => "all",
            QueryKind::BySearchTerm => "by_search_term",
            QueryKind::ById => "by_id",
            QueryKind::ByTag => "by_tag",
            QueryKind::ByCategories => "by_categories",
            QueryKind::ByCreatedBy => "by_created_by",
            QueryKind::ByUpdatedBy => "by_updated_by",
            QueryKind::AllTags => "all_tags",
            QueryKind::AllCategories => "all_categories",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub fn is_paginated(&self) -> bool {
        !matches!(
            self,
            QueryKind::ById | QueryKind::AllTags | QueryKind::AllCategories
        )
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical query together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    All { page: PageRequest },
    BySearchTerm { term: String, page: PageRequest },
    ById { id: i64 },
    ByTag { tag: String, page: PageRequest },
    ByCategories { categories: Vec<String>, page: PageRequest },
    ByCreatedBy { name: String, page: PageRequest },
    ByUpdatedBy { name: String, page: PageRequest },
    AllTags,
    AllCategories,
}

impl CatalogQuery {
    pub fn kind(&self) -> QueryKind {
        match self {
            CatalogQuery::All { .. } => QueryKind::All,
            CatalogQuery::BySearchTerm { .. } => QueryKind::BySearchTerm,
            CatalogQuery::ById { .. } => QueryKind::ById,
            CatalogQuery::ByTag { .. } => QueryKind::ByTag,
            CatalogQuery::ByCategories { .. } => QueryKind::ByCategories,
            CatalogQuery::ByCreatedBy { .. } => QueryKind::ByCreatedBy,
            CatalogQuery::ByUpdatedBy { .. } => QueryKind::ByUpdatedBy,
            CatalogQuery::AllTags => QueryKind::AllTags,
            CatalogQuery::AllCategories => QueryKind::AllCategories,
        }
    }

    pub fn page(&self) -> Option<PageRequest> {
        match self {
            CatalogQuery::All { page }
            | CatalogQuery::BySearchTerm { page, .. }
            | CatalogQuery::ByTag { page, .. }
            | CatalogQuery::ByCategories { page, .. }
            | CatalogQuery::ByCreatedBy { page, .. }
            | CatalogQuery::ByUpdatedBy { page, .. } => Some(*page),
            CatalogQuery::ById { .. } | CatalogQuery::AllTags | CatalogQuery::AllCategories => {
                None
            }
        }
    }

    pub fn entry_id(&self) -> Option<i64> {
        match self {
            CatalogQuery::ById { id } => Some(*id),
            _ => None,
        }
    }
}

/// A query parameter. `value == None` is a bare flag (`?updated`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: &'static str,
    pub value: Option<String>,
}

impl QueryParam {
    fn value(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: Some(value.into()),
        }
    }

    fn flag(name: &'static str) -> Self {
        Self { name, value: None }
    }
}

/// Upstream request descriptor: raw path segments below the API root plus
/// ordered query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    pub kind: QueryKind,
    pub segments: Vec<String>,
    pub params: Vec<QueryParam>,
}

impl CatalogRequest {
    pub fn param(&self, name: &str) -> Option<&QueryParam> {
        self.params.iter().find(|p| p.name == name)
    }
}

pub fn build(query: &CatalogQuery) -> CatalogResult<CatalogRequest> {
    let (segments, mut params) = match query {
        CatalogQuery::All { .. } => (vec!["entries".to_string()], Vec::new()),
        CatalogQuery::BySearchTerm { term, .. } => (
            vec!["entries".to_string()],
            vec![QueryParam::value("q", term.as_str())],
        ),
        CatalogQuery::ById { id } => {
            if *id < 0 {
                return Err(CatalogError::invalid(format!(
                    "entry id must be >= 0, got {id}"
                )));
            }
            (vec!["entries".to_string(), id.to_string()], Vec::new())
        }
        CatalogQuery::ByTag { tag, .. } => (
            vec![
                "tags".to_string(),
                required("tag", tag)?,
                "entries".to_string(),
            ],
            Vec::new(),
        ),
        CatalogQuery::ByCategories { categories, .. } => (
            vec![
                "categories".to_string(),
                join_categories(categories)?,
                "entries".to_string(),
            ],
            Vec::new(),
        ),
        CatalogQuery::ByCreatedBy { name, .. } => (
            vec![
                "users".to_string(),
                required("user name", name)?,
                "entries".to_string(),
            ],
            Vec::new(),
        ),
        CatalogQuery::ByUpdatedBy { name, .. } => (
            vec![
                "users".to_string(),
                required("user name", name)?,
                "entries".to_string(),
            ],
            vec![QueryParam::flag("updated")],
        ),
        CatalogQuery::AllTags => (vec!["tags".to_string()], Vec::new()),
        CatalogQuery::AllCategories => (vec!["categories".to_string()], Vec::new()),
    };

    if let Some(page) = query.page() {
        if !page.is_valid() {
            return Err(CatalogError::invalid(format!(
                "page index must be >= 0 and size > 0, got index {} size {}",
                page.index, page.size
            )));
        }
        params.push(QueryParam::value("page", page.index.to_string()));
        params.push(QueryParam::value("size", page.size.to_string()));
        params.push(QueryParam::value("excludeContent", "true"));
    }

    Ok(CatalogRequest {
        kind: query.kind(),
        segments,
        params,
    })
}

fn required(what: &str, value: &str) -> CatalogResult<String> {
    if value.trim().is_empty() {
        return Err(CatalogError::invalid(format!("{what} must be non-empty")));
    }
    // URL path assembly drops dot segments, which would change the endpoint.
    if matches!(value, "." | "..") {
        return Err(CatalogError::invalid(format!("{what} must not be '{value}'")));
    }
    Ok(value.to_string())
}

/// Categories travel as one comma-separated segment, so a name must not
/// itself contain a comma.
fn join_categories(categories: &[String]) -> CatalogResult<String> {
    if categories.is_empty() {
        return Err(CatalogError::invalid("categories must be non-empty"));
    }
    for category in categories {
        if category.trim().is_empty() {
            return Err(CatalogError::invalid("category names must be non-empty"));
        }
        if category.contains(',') {
            return Err(CatalogError::invalid(format!(
                "category name must not contain ',': {category}"
            )));
        }
    }
    required("categories", &categories.join(","))
}
