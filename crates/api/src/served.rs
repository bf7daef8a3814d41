use std::collections::HashMap;
use std::sync::Arc;

use ksq_core::Gvr;
use ksq_resources::{CrdLookup, ResolvedResource};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};

/// Cache of custom resources known to be served.
///
/// Reads share the lock; the first resolution of a resource takes it
/// exclusively to insert. Only served results are kept, so a definition
/// that becomes served later is picked up on the next request.
pub struct ServedResources {
    lookup: Arc<dyn CrdLookup>,
    served: RwLock<HashMap<Gvr, ResolvedResource>>,
}

impl ServedResources {
    pub fn new(lookup: Arc<dyn CrdLookup>) -> Self {
        Self { lookup, served: RwLock::new(HashMap::new()) }
    }

    pub async fn resolve(&self, gvr: &Gvr) -> ApiResult<ResolvedResource> {
        if let Some(r) = self.served.read().await.get(gvr) {
            return Ok(r.clone());
        }
        metrics::counter!("served_cache_misses_total", 1u64);
        let info = self.lookup.find(gvr).await.map_err(ApiError::Upstream)?;
        match info {
            None => {
                debug!(gvr = %gvr, "no definition");
                Err(ApiError::NotSupported(gvr.clone()))
            }
            Some(info) if !info.served => {
                debug!(gvr = %gvr, "definition not served");
                Err(ApiError::NotServed(gvr.clone()))
            }
            Some(info) => {
                let resolved = ResolvedResource::unstructured(gvr.clone(), &info);
                let mut served = self.served.write().await;
                let entry = served.entry(gvr.clone()).or_insert(resolved);
                info!(gvr = %gvr, gvk = %entry.gvk, "api: served resource cached");
                Ok(entry.clone())
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.served.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.served.read().await.is_empty()
    }
}
