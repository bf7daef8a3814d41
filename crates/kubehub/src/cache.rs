use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{Api, ListParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Client, Resource};
use ksq_core::Query;
use ksq_resources::{CacheError, ObjectCache, ResolvedResource, ResourceObject, TypedKind};
use serde::de::DeserializeOwned;
use tracing::debug;

/// [`ObjectCache`] reading straight from the API server.
///
/// Typed kinds go through their k8s-openapi types; everything else is read
/// as `DynamicObject`. The query's label selector is forwarded so the server
/// narrows the list; the remaining filters run in the list pipeline.
#[derive(Clone)]
pub struct KubeCache {
    client: Client,
}

impl KubeCache {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn upstream(e: kube::Error) -> CacheError {
    CacheError::Upstream(anyhow::Error::new(e).context("kube api"))
}

pub(crate) fn list_params(query: &Query) -> ListParams {
    match query.label_selector.as_ref().filter(|s| !s.is_empty()) {
        Some(sel) => ListParams::default().labels(&sel.to_string()),
        None => ListParams::default(),
    }
}

pub(crate) fn api_resource(target: &ResolvedResource) -> ApiResource {
    let gvk = GroupVersionKind::gvk(&target.gvk.group, &target.gvk.version, &target.gvk.kind);
    ApiResource::from_gvk_with_plural(&gvk, &target.gvr.resource)
}

trait Namespaced:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + Debug + DeserializeOwned + Into<ResourceObject>
{
}
impl<K> Namespaced for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + Debug + DeserializeOwned + Into<ResourceObject>
{
}

trait ClusterScoped:
    Resource<Scope = ClusterResourceScope, DynamicType = ()> + Clone + Debug + DeserializeOwned + Into<ResourceObject>
{
}
impl<K> ClusterScoped for K where
    K: Resource<Scope = ClusterResourceScope, DynamicType = ()> + Clone + Debug + DeserializeOwned + Into<ResourceObject>
{
}

fn namespaced_api<K: Namespaced>(client: Client, namespace: Option<&str>) -> Api<K> {
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

async fn list_namespaced<K: Namespaced>(
    client: Client,
    namespace: Option<&str>,
    lp: &ListParams,
) -> Result<Vec<ResourceObject>, CacheError> {
    let list = namespaced_api::<K>(client, namespace).list(lp).await.map_err(upstream)?;
    Ok(list.items.into_iter().map(Into::into).collect())
}

async fn list_cluster<K: ClusterScoped>(
    client: Client,
    _namespace: Option<&str>,
    lp: &ListParams,
) -> Result<Vec<ResourceObject>, CacheError> {
    let list = Api::<K>::all(client).list(lp).await.map_err(upstream)?;
    Ok(list.items.into_iter().map(Into::into).collect())
}

async fn get_namespaced<K: Namespaced>(
    client: Client,
    namespace: Option<&str>,
    name: &str,
) -> Result<Option<ResourceObject>, CacheError> {
    let api = namespaced_api::<K>(client, namespace);
    Ok(api.get_opt(name).await.map_err(upstream)?.map(Into::into))
}

async fn get_cluster<K: ClusterScoped>(
    client: Client,
    _namespace: Option<&str>,
    name: &str,
) -> Result<Option<ResourceObject>, CacheError> {
    Ok(Api::<K>::all(client).get_opt(name).await.map_err(upstream)?.map(Into::into))
}

macro_rules! by_kind {
    ($kind:expr, $ns:ident, $cluster:ident, $($arg:expr),*) => {
        match $kind {
            TypedKind::Pod => $ns::<Pod>($($arg),*).await,
            TypedKind::ConfigMap => $ns::<ConfigMap>($($arg),*).await,
            TypedKind::Secret => $ns::<Secret>($($arg),*).await,
            TypedKind::PersistentVolumeClaim => $ns::<PersistentVolumeClaim>($($arg),*).await,
            TypedKind::Deployment => $ns::<Deployment>($($arg),*).await,
            TypedKind::StatefulSet => $ns::<StatefulSet>($($arg),*).await,
            TypedKind::DaemonSet => $ns::<DaemonSet>($($arg),*).await,
            TypedKind::Job => $ns::<Job>($($arg),*).await,
            TypedKind::Namespace => $cluster::<Namespace>($($arg),*).await,
            TypedKind::Node => $cluster::<Node>($($arg),*).await,
            TypedKind::PersistentVolume => $cluster::<PersistentVolume>($($arg),*).await,
        }
    };
}

impl KubeCache {
    fn dynamic_api(&self, target: &ResolvedResource, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = api_resource(target);
        match namespace.filter(|_| target.namespaced) {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

#[async_trait]
impl ObjectCache for KubeCache {
    async fn get(
        &self,
        target: &ResolvedResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, CacheError> {
        debug!(gvr = %target.gvr, ns = ?namespace, obj = name, "kube get");
        let found = match target.typed {
            Some(kind) => by_kind!(kind, get_namespaced, get_cluster, self.client.clone(), namespace, name)?,
            None => self.dynamic_api(target, namespace).get_opt(name).await.map_err(upstream)?.map(Into::into),
        };
        found.ok_or_else(|| CacheError::not_found(target.gvk.kind.as_str(), name))
    }

    async fn list(
        &self,
        target: &ResolvedResource,
        namespace: Option<&str>,
        query: &Query,
    ) -> Result<Vec<ResourceObject>, CacheError> {
        let lp = list_params(query);
        debug!(gvr = %target.gvr, ns = ?namespace, selector = ?lp.label_selector, "kube list");
        match target.typed {
            Some(kind) => by_kind!(kind, list_namespaced, list_cluster, self.client.clone(), namespace, &lp),
            None => {
                let list = self.dynamic_api(target, namespace).list(&lp).await.map_err(upstream)?;
                Ok(list.items.into_iter().map(Into::into).collect())
            }
        }
    }
}
