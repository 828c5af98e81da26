//! One method per logical catalog query.
//!
//! Every method builds the upstream request, runs it under the resilience
//! guard and decodes the body inside the guarded call. Upstream health
//! problems come back as placeholder results; only `InvalidQuery` and
//! `UpstreamClient` errors reach the caller.
use anyhow::Result;
use std::sync::Arc;

use crate::circuit::{CircuitState, ResilienceGuard};
use crate::client::{decode, decode_page, CatalogBackend, RemoteCatalogClient};
use crate::config::Config;
use crate::error::CatalogResult;
use crate::fallback::Synthesize;
use crate::model::{Entry, Page, PageRequest};
use crate::query::{self, CatalogQuery, QueryKind};

pub struct CatalogFacade {
    backend: Arc<dyn CatalogBackend>,
    guard: ResilienceGuard,
}

impl CatalogFacade {
    pub fn new(backend: Arc<dyn CatalogBackend>, guard: ResilienceGuard) -> Self {
        Self { backend, guard }
    }

    /// Wire the HTTP client and the per-kind circuits from configuration.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = RemoteCatalogClient::from_config(cfg)?;
        Ok(Self::new(Arc::new(client), ResilienceGuard::from_config(cfg)))
    }

    pub async fn find_all(&self, page: PageRequest) -> CatalogResult<Page<Entry>> {
        self.run(CatalogQuery::All { page }, decode_page).await
    }

    pub async fn find_by_query(&self, term: &str, page: PageRequest) -> CatalogResult<Page<Entry>> {
        let query = CatalogQuery::BySearchTerm {
            term: term.to_string(),
            page,
        };
        self.run(query, decode_page).await
    }

    pub async fn find_by_id(&self, id: i64) -> CatalogResult<Entry> {
        self.run(CatalogQuery::ById { id }, decode).await
    }

    pub async fn find_by_tag(&self, tag: &str, page: PageRequest) -> CatalogResult<Page<Entry>> {
        let query = CatalogQuery::ByTag {
            tag: tag.to_string(),
            page,
        };
        self.run(query, decode_page).await
    }

    pub async fn find_by_categories(
        &self,
        categories: Vec<String>,
        page: PageRequest,
    ) -> CatalogResult<Page<Entry>> {
        self.run(CatalogQuery::ByCategories { categories, page }, decode_page)
            .await
    }

    /// Entries authored by `name`.
    pub async fn find_by_created_by(
        &self,
        name: &str,
        page: PageRequest,
    ) -> CatalogResult<Page<Entry>> {
        let query = CatalogQuery::ByCreatedBy {
            name: name.to_string(),
            page,
        };
        self.run(query, decode_page).await
    }

    /// Entries last modified by `name`.
    pub async fn find_by_updated_by(
        &self,
        name: &str,
        page: PageRequest,
    ) -> CatalogResult<Page<Entry>> {
        let query = CatalogQuery::ByUpdatedBy {
            name: name.to_string(),
            page,
        };
        self.run(query, decode_page).await
    }

    pub async fn find_tags(&self) -> CatalogResult<Vec<String>> {
        self.run(CatalogQuery::AllTags, decode).await
    }

    pub async fn find_categories(&self) -> CatalogResult<Vec<Vec<String>>> {
        self.run(CatalogQuery::AllCategories, decode).await
    }

    pub fn circuit_state(&self, kind: QueryKind) -> CircuitState {
        self.guard.state(kind)
    }

    pub fn circuit_states(&self) -> Vec<(QueryKind, CircuitState)> {
        QueryKind::ALL
            .iter()
            .map(|kind| (*kind, self.guard.state(*kind)))
            .collect()
    }

    async fn run<T>(&self, query: CatalogQuery, decode: fn(&str) -> CatalogResult<T>) -> CatalogResult<T>
    where
        T: Synthesize,
    {
        let request = query::build(&query)?;
        let backend = &self.backend;
        self.guard
            .execute(&query, || async move {
                let body = backend.fetch(&request).await?;
                decode(&body)
            })
            .await
    }
}
