//! ksq resource access layer.
//!
//! [`ResourceGetter`] turns a GVR plus a query into a listed page: built-in
//! kinds resolve through the typed [`Scheme`], everything else must be a
//! served custom resource. Objects come from an [`ObjectCache`] and go
//! through the per-kind [`ListRegistry`] pipeline.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use ksq_core::{field, Field, Gvr, ListResult, MetaObject, Query, Requirement, Value};
use ksq_resources::{CrdLookup, ListRegistry, ObjectCache, ResolvedResource, ResourceObject, Scheme};
use tracing::{debug, info};

mod config;
mod error;
mod served;

pub use config::{Config, DEFAULT_SERVED_LABEL, DEFAULT_WORKSPACE_LABEL};
pub use error::{ApiError, ApiResult};
pub use served::ServedResources;

pub struct ResourceGetter {
    scheme: Arc<Scheme>,
    registry: Arc<ListRegistry>,
    cache: Arc<dyn ObjectCache>,
    served: ServedResources,
    config: Config,
}

impl ResourceGetter {
    pub fn new(
        scheme: Arc<Scheme>,
        registry: Arc<ListRegistry>,
        cache: Arc<dyn ObjectCache>,
        crds: Arc<dyn CrdLookup>,
        config: Config,
    ) -> Self {
        Self { scheme, registry, cache, served: ServedResources::new(crds), config }
    }

    pub fn registry(&self) -> &ListRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn served(&self) -> &ServedResources {
        &self.served
    }

    /// Build a query from request parameters using this registry's filter
    /// fields. With `strict`, any ignored or malformed parameter is an error.
    pub fn parse_query<I, K, V>(&self, params: I, strict: bool) -> ApiResult<Query>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let parsed = Query::parse(params, self.registry.comparable_fields());
        for d in &parsed.diagnostics {
            debug!(param = %d.param, raw = %d.raw, reason = %d.reason, "query parameter ignored");
        }
        if strict {
            Ok(parsed.strict()?)
        } else {
            Ok(parsed.query)
        }
    }

    /// Built-in kinds first, then served custom resources.
    pub async fn resolve(&self, gvr: &Gvr) -> ApiResult<ResolvedResource> {
        match self.scheme.resolve(gvr) {
            Some(typed) => Ok(typed),
            None => self.served.resolve(gvr).await,
        }
    }

    pub async fn get(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> ApiResult<ResourceObject> {
        let t0 = Instant::now();
        let target = self.resolve(gvr).await?;
        let ns = scope_namespace(&target, namespace);
        if target.namespaced && ns.is_none() {
            return Err(ApiError::NamespaceRequired(gvr.clone()));
        }
        let obj = self.cache.get(&target, ns, name).await?;
        let obj = self.registry.transforms_for(&target.gvk).iter().fold(obj, |o, t| t(o));
        info!(gvr = %gvr, ns = %ns.unwrap_or("-"), obj = %name, took_ms = %t0.elapsed().as_millis(), "api: get ok");
        Ok(obj)
    }

    pub async fn list(&self, gvr: &Gvr, namespace: Option<&str>, query: &Query) -> ApiResult<ListResult<ResourceObject>> {
        let t0 = Instant::now();
        let target = self.resolve(gvr).await?;
        let ns = scope_namespace(&target, namespace);
        let mut objects = self.cache.list(&target, ns, query).await?;
        if let Some(sel) = query.label_selector.as_ref() {
            objects.retain(|o| sel.matches(o.labels()));
        }
        let result = self.registry.list(&target.gvk, objects, query);
        info!(
            gvr = %gvr,
            ns = %ns.unwrap_or("(all)"),
            typed = target.is_typed(),
            total = result.total_items,
            took_ms = %t0.elapsed().as_millis(),
            "api: list ok"
        );
        Ok(result)
    }

    /// List across namespaces, restricted to objects labelled with `workspace`.
    pub async fn list_in_workspace(
        &self,
        gvr: &Gvr,
        workspace: &str,
        query: &Query,
    ) -> ApiResult<ListResult<ResourceObject>> {
        let scoped = scope_to_workspace(query, &self.config.workspace_label, workspace);
        self.list(gvr, None, &scoped).await
    }
}

/// Cluster-scoped resources ignore the requested namespace.
fn scope_namespace<'a>(target: &ResolvedResource, namespace: Option<&'a str>) -> Option<&'a str> {
    match namespace {
        Some(ns) if !target.namespaced => {
            debug!(gvr = %target.gvr, ns, "namespace ignored for cluster-scoped resource");
            None
        }
        other => other,
    }
}

/// Add the workspace constraint to a copy of `query`. The `label` filter
/// holds a single value, so when the caller already filters on a label the
/// workspace goes into the label selector instead and both apply.
pub fn scope_to_workspace(query: &Query, label_key: &str, workspace: &str) -> Query {
    let mut q = query.clone();
    if q.has_filter(field::LABEL) {
        let mut sel = q.label_selector.take().unwrap_or_default();
        sel.push(Requirement::Equals(label_key.to_string(), workspace.to_string()));
        q.label_selector = Some(sel);
    } else {
        q.filters.insert(Field::from_static(field::LABEL), Value::from(format!("{label_key}={workspace}")));
    }
    q
}
