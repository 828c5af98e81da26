//! HTTP front for browsing the catalog.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/`, `/entries` | Latest entries; `?q=` searches |
//! | `GET` | `/entries/{id}` | One entry; `?partial` returns its body as HTML |
//! | `GET` | `/tags/{tag}/entries` | Entries with a tag |
//! | `GET` | `/categories/{a,b}/entries` | Entries under a category path |
//! | `GET` | `/users/{name}/entries` | Entries by author; `?updated` for last editor |
//! | `GET` | `/tags` | All tags |
//! | `GET` | `/categories` | All category paths |
//! | `GET` | `/health` | Version and circuit states |
//!
//! Listings accept `page` (0-based) and `size`. Errors use the envelope
//! `{ "error": { "code": "bad_request", "message": "..." } }`.
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::circuit::CircuitState;
use crate::config::Config;
use crate::error::CatalogError;
use crate::facade::CatalogFacade;
use crate::model::{Entry, Page, PageRequest};
use crate::render::MarkdownRenderer;

type Params = Query<HashMap<String, String>>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<CatalogFacade>,
    pub renderer: Arc<dyn MarkdownRenderer>,
    pub default_page_size: i64,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_entries))
        .route("/entries", get(list_entries))
        .route("/entries/{entry_id}", get(entry_by_id))
        .route("/tags", get(all_tags))
        .route("/tags/{tag}/entries", get(entries_by_tag))
        .route("/categories", get(all_categories))
        .route("/categories/{categories}/entries", get(entries_by_categories))
        .route("/users/{name}/entries", get(entries_by_user))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind `app.bind` and serve until Ctrl-C.
pub async fn serve(cfg: &Config, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&cfg.app.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.app.bind))?;
    info!(bind = %cfg.app.bind, api = %cfg.api.url, "blog UI listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(?err, "failed to listen for ctrl-c");
            }
        })
        .await
        .context("HTTP server failed")
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidQuery(msg) => bad_request(msg),
            CatalogError::UpstreamClient { status: 404, body } => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: body,
            },
            CatalogError::UpstreamClient { status, body } => {
                warn!(status, %body, "catalog API rejected a request");
                AppError {
                    status: StatusCode::BAD_GATEWAY,
                    code: "upstream_rejected",
                    message: format!("catalog API answered {status}"),
                }
            }
            other => {
                warn!(err = ?other, "upstream fault reached the HTTP layer");
                AppError {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    code: "upstream_unavailable",
                    message: other.to_string(),
                }
            }
        }
    }
}

fn parse_number(params: &HashMap<String, String>, name: &str) -> Result<Option<i64>, AppError> {
    match params.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| bad_request(format!("{name} must be an integer, got '{raw}'"))),
    }
}

fn page_request(state: &AppState, params: &HashMap<String, String>) -> Result<PageRequest, AppError> {
    let index = parse_number(params, "page")?.unwrap_or(0);
    let size = parse_number(params, "size")?.unwrap_or(state.default_page_size);
    Ok(PageRequest::new(index, size))
}

// ============ Entries ============

#[instrument(skip_all)]
async fn list_entries(
    State(state): State<AppState>,
    Query(params): Params,
) -> Result<Json<Page<Entry>>, AppError> {
    let page = page_request(&state, &params)?;
    let entries = match params.get("q") {
        Some(term) => state.facade.find_by_query(term, page).await?,
        None => state.facade.find_all(page).await?,
    };
    Ok(Json(entries))
}

#[instrument(skip_all, fields(entry_id = %entry_id))]
async fn entry_by_id(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Query(params): Params,
) -> Result<Response, AppError> {
    let id: i64 = entry_id
        .parse()
        .map_err(|_| bad_request(format!("entry id must be an integer, got '{entry_id}'")))?;
    let entry = state.facade.find_by_id(id).await?;
    if params.contains_key("partial") {
        return Ok(Html(state.renderer.render(&entry.content)).into_response());
    }
    Ok(Json(entry).into_response())
}

#[instrument(skip_all, fields(tag = %tag))]
async fn entries_by_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(params): Params,
) -> Result<Json<Page<Entry>>, AppError> {
    let page = page_request(&state, &params)?;
    Ok(Json(state.facade.find_by_tag(&tag, page).await?))
}

#[instrument(skip_all, fields(categories = %categories))]
async fn entries_by_categories(
    State(state): State<AppState>,
    Path(categories): Path<String>,
    Query(params): Params,
) -> Result<Json<Page<Entry>>, AppError> {
    let page = page_request(&state, &params)?;
    let categories = categories.split(',').map(str::to_string).collect();
    Ok(Json(state.facade.find_by_categories(categories, page).await?))
}

#[instrument(skip_all, fields(name = %name))]
async fn entries_by_user(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Params,
) -> Result<Json<Page<Entry>>, AppError> {
    let page = page_request(&state, &params)?;
    let entries = if params.contains_key("updated") {
        state.facade.find_by_updated_by(&name, page).await?
    } else {
        state.facade.find_by_created_by(&name, page).await?
    };
    Ok(Json(entries))
}

// ============ Listings ============

async fn all_tags(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.facade.find_tags().await?))
}

async fn all_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Vec<String>>>, AppError> {
    Ok(Json(state.facade.find_categories().await?))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    circuits: BTreeMap<&'static str, CircuitState>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let circuits = state
        .facade
        .circuit_states()
        .into_iter()
        .map(|(kind, circuit)| (kind.as_str(), circuit))
        .collect();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        circuits,
    })
}
