//! Error taxonomy for catalog access.
use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// The caller asked for something that can never be a valid upstream
    /// request (bad pagination, empty path parameter).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The upstream answered 4xx. Points at a bad request on our side, so it
    /// is neither counted against the circuit nor replaced by a placeholder.
    #[error("upstream rejected request with status {status}: {body}")]
    UpstreamClient { status: u16, body: String },

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream server error {status}: {body}")]
    UpstreamServer { status: u16, body: String },

    #[error("failed to decode upstream response: {0}")]
    ResponseDecode(String),
}

impl CatalogError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CatalogError::InvalidQuery(message.into())
    }

    /// Faults that say something about upstream health. These feed the
    /// circuit breaker and are answered with a placeholder.
    pub fn is_upstream_fault(&self) -> bool {
        matches!(
            self,
            CatalogError::UpstreamUnreachable(_)
                | CatalogError::UpstreamServer { .. }
                | CatalogError::ResponseDecode(_)
        )
    }

    /// Upstream status code, when the upstream produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::UpstreamClient { status, .. }
            | CatalogError::UpstreamServer { status, .. } => Some(*status),
            _ => None,
        }
    }
}
