use ksq_core::{Gvr, QueryError};
use ksq_resources::CacheError;

/// Errors returned by the access layer, each with an HTTP status class.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Neither a built-in kind nor a known custom resource.
    #[error("resource {0} is not supported")]
    NotSupported(Gvr),
    /// A custom resource exists but is not marked as served.
    #[error("resource {0} is not served")]
    NotServed(Gvr),
    /// Named reads of a namespaced resource need a namespace.
    #[error("resource {0} is namespaced; a namespace is required")]
    NamespaceRequired(Gvr),
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },
    #[error("upstream: {0}")]
    Upstream(CacheError),
    #[error(transparent)]
    InvalidQuery(#[from] QueryError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotSupported(_)
            | ApiError::NotServed(_)
            | ApiError::NamespaceRequired(_)
            | ApiError::InvalidQuery(_) => 400,
            ApiError::NotFound { .. } => 404,
            ApiError::Upstream(_) => 500,
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::NotFound { kind, name } => ApiError::NotFound { kind, name },
            other => ApiError::Upstream(other),
        }
    }
}
