//! Collaborators the access layer reads through: an object cache and a
//! lookup for custom resource definitions.

use async_trait::async_trait;
use ksq_core::{Gvk, Gvr, Query};
use thiserror::Error;

use crate::object::ResourceObject;
use crate::scheme::ResolvedResource;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: String, name: String },
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl CacheError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        CacheError::NotFound { kind: kind.into(), name: name.into() }
    }
}

/// Read access to cached objects, typed and unstructured alike.
///
/// `namespace == None` lists across all namespaces (and is the only valid
/// value for cluster-scoped resources). Implementations may use the query's
/// label selector to narrow the result; the list pipeline still applies
/// every filter afterwards.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    async fn get(
        &self,
        target: &ResolvedResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, CacheError>;

    async fn list(
        &self,
        target: &ResolvedResource,
        namespace: Option<&str>,
        query: &Query,
    ) -> Result<Vec<ResourceObject>, CacheError>;
}

/// What the access layer needs to know about a custom resource definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdInfo {
    pub gvk: Gvk,
    pub namespaced: bool,
    /// Marked as served through the aggregation layer.
    pub served: bool,
}

#[async_trait]
pub trait CrdLookup: Send + Sync {
    /// `Ok(None)` when no definition exists for `gvr`.
    async fn find(&self, gvr: &Gvr) -> Result<Option<CrdInfo>, CacheError>;
}
