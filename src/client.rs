use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CatalogError, CatalogResult};
use crate::model::Page;
use crate::query::CatalogRequest;

/// Every upstream path lives under this segment of the base URL.
const API_ROOT: &str = "api";

/// Transport seam between the façade and the upstream API. Returns the raw
/// response body so decoding failures surface in the guarded call.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    async fn fetch(&self, request: &CatalogRequest) -> CatalogResult<String>;
}

#[derive(Clone)]
pub struct RemoteCatalogClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for RemoteCatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCatalogClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RemoteCatalogClient {
    pub fn new(base_url: Url, timeout: Duration, user_agent: &str) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            bail!("catalog base URL {} cannot carry a path", base_url);
        }
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout)
            .no_proxy()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = cfg.api.base_url().context("invalid api.url")?;
        Self::new(base_url, cfg.api.timeout(), &cfg.api.user_agent)
    }

    /// Absolute URL for `request`: each segment is percent-escaped on its
    /// own and parameters are form-encoded; bare flags carry no `=`.
    pub fn endpoint(&self, request: &CatalogRequest) -> CatalogResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::invalid("catalog base URL cannot carry a path"))?
            .pop_if_empty()
            .push(API_ROOT)
            .extend(request.segments.iter());

        if !request.params.is_empty() {
            let mut query = url.query_pairs_mut();
            for param in &request.params {
                match &param.value {
                    Some(value) => query.append_pair(param.name, value),
                    None => query.append_key_only(param.name),
                };
            }
        }
        Ok(url)
    }

    pub fn build_request(&self, request: &CatalogRequest) -> CatalogResult<reqwest::Request> {
        let url = self.endpoint(request)?;
        self.http
            .get(url)
            .header(ACCEPT, "application/json")
            .build()
            .map_err(|err| CatalogError::invalid(format!("failed to build request: {err}")))
    }
}

#[async_trait]
impl CatalogBackend for RemoteCatalogClient {
    async fn fetch(&self, request: &CatalogRequest) -> CatalogResult<String> {
        let http_request = self.build_request(request)?;
        debug!(kind = %request.kind, url = %http_request.url(), "sending catalog request");

        let res = self
            .http
            .execute(http_request)
            .await
            .map_err(|err| CatalogError::UpstreamUnreachable(err.to_string()))?;

        let status = res.status();
        if status.is_client_error() {
            let body = res.text().await.unwrap_or_default();
            warn!(kind = %request.kind, %status, "catalog API rejected request");
            return Err(CatalogError::UpstreamClient {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(CatalogError::UpstreamServer {
                status: status.as_u16(),
                body,
            });
        }

        res.text().await.map_err(|err| {
            if err.is_timeout() {
                CatalogError::UpstreamUnreachable(err.to_string())
            } else {
                CatalogError::ResponseDecode(err.to_string())
            }
        })
    }
}

/// Decode a JSON response body.
pub fn decode<T: DeserializeOwned>(body: &str) -> CatalogResult<T> {
    serde_json::from_str(body).map_err(|err| CatalogError::ResponseDecode(err.to_string()))
}

/// Decode a page and reject one whose counts or flags contradict its content.
pub fn decode_page<T: DeserializeOwned>(body: &str) -> CatalogResult<Page<T>> {
    let page: Page<T> = decode(body)?;
    if !page.is_consistent() {
        return Err(CatalogError::ResponseDecode(format!(
            "inconsistent page: numberOfElements={} with {} elements, number={} of {} first={} last={}",
            page.number_of_elements,
            page.content.len(),
            page.number,
            page.total_pages,
            page.first,
            page.last
        )));
    }
    Ok(page)
}
