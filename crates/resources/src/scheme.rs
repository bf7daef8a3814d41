//! Registry of statically typed kinds. Anything it does not recognize is
//! handled as an unstructured document.

use std::collections::HashMap;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
};
use ksq_core::{Gvk, Gvr};
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;

use crate::object::ResourceObject;
use crate::source::{CacheError, CrdInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedKind {
    Pod,
    ConfigMap,
    Secret,
    Namespace,
    Node,
    PersistentVolume,
    PersistentVolumeClaim,
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
}

fn gvk_of<K: k8s_openapi::Resource>() -> Gvk {
    Gvk::new(K::GROUP, K::VERSION, K::KIND)
}

impl TypedKind {
    pub const ALL: [TypedKind; 11] = [
        TypedKind::Pod,
        TypedKind::ConfigMap,
        TypedKind::Secret,
        TypedKind::Namespace,
        TypedKind::Node,
        TypedKind::PersistentVolume,
        TypedKind::PersistentVolumeClaim,
        TypedKind::Deployment,
        TypedKind::StatefulSet,
        TypedKind::DaemonSet,
        TypedKind::Job,
    ];

    pub fn gvk(self) -> Gvk {
        match self {
            TypedKind::Pod => gvk_of::<Pod>(),
            TypedKind::ConfigMap => gvk_of::<ConfigMap>(),
            TypedKind::Secret => gvk_of::<Secret>(),
            TypedKind::Namespace => gvk_of::<Namespace>(),
            TypedKind::Node => gvk_of::<Node>(),
            TypedKind::PersistentVolume => gvk_of::<PersistentVolume>(),
            TypedKind::PersistentVolumeClaim => gvk_of::<PersistentVolumeClaim>(),
            TypedKind::Deployment => gvk_of::<Deployment>(),
            TypedKind::StatefulSet => gvk_of::<StatefulSet>(),
            TypedKind::DaemonSet => gvk_of::<DaemonSet>(),
            TypedKind::Job => gvk_of::<Job>(),
        }
    }

    /// REST collection name, e.g. `deployments`.
    pub fn plural(self) -> &'static str {
        match self {
            TypedKind::Pod => <Pod as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::ConfigMap => <ConfigMap as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::Secret => <Secret as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::Namespace => <Namespace as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::Node => <Node as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::PersistentVolume => <PersistentVolume as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::PersistentVolumeClaim => <PersistentVolumeClaim as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::Deployment => <Deployment as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::StatefulSet => <StatefulSet as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::DaemonSet => <DaemonSet as k8s_openapi::Resource>::URL_PATH_SEGMENT,
            TypedKind::Job => <Job as k8s_openapi::Resource>::URL_PATH_SEGMENT,
        }
    }

    pub fn gvr(self) -> Gvr {
        let gvk = self.gvk();
        Gvr::new(gvk.group, gvk.version, self.plural())
    }

    pub fn namespaced(self) -> bool {
        !matches!(self, TypedKind::Namespace | TypedKind::Node | TypedKind::PersistentVolume)
    }

    /// Deserialize a document of this kind into its typed representation.
    pub fn decode(self, value: serde_json::Value) -> Result<ResourceObject, CacheError> {
        fn typed<K: DeserializeOwned + Into<ResourceObject>>(
            value: serde_json::Value,
        ) -> Result<ResourceObject, CacheError> {
            Ok(serde_json::from_value::<K>(value)?.into())
        }
        match self {
            TypedKind::Pod => typed::<Pod>(value),
            TypedKind::ConfigMap => typed::<ConfigMap>(value),
            TypedKind::Secret => typed::<Secret>(value),
            TypedKind::Namespace => typed::<Namespace>(value),
            TypedKind::Node => typed::<Node>(value),
            TypedKind::PersistentVolume => typed::<PersistentVolume>(value),
            TypedKind::PersistentVolumeClaim => typed::<PersistentVolumeClaim>(value),
            TypedKind::Deployment => typed::<Deployment>(value),
            TypedKind::StatefulSet => typed::<StatefulSet>(value),
            TypedKind::DaemonSet => typed::<DaemonSet>(value),
            TypedKind::Job => typed::<Job>(value),
        }
    }
}

/// A resource after resolution: identity, scope and representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub gvr: Gvr,
    pub gvk: Gvk,
    pub namespaced: bool,
    /// `None` means unstructured.
    pub typed: Option<TypedKind>,
}

impl ResolvedResource {
    pub fn typed(kind: TypedKind) -> Self {
        Self { gvr: kind.gvr(), gvk: kind.gvk(), namespaced: kind.namespaced(), typed: Some(kind) }
    }

    pub fn unstructured(gvr: Gvr, crd: &CrdInfo) -> Self {
        Self { gvr, gvk: crd.gvk.clone(), namespaced: crd.namespaced, typed: None }
    }

    pub fn is_typed(&self) -> bool {
        self.typed.is_some()
    }
}

/// Typed kinds known at compile time, looked up by GVK or GVR.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    by_gvk: HashMap<Gvk, TypedKind>,
    by_gvr: HashMap<Gvr, TypedKind>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut s = Self::new();
        for kind in TypedKind::ALL {
            s.register(kind);
        }
        s
    }

    pub fn register(&mut self, kind: TypedKind) {
        self.by_gvk.insert(kind.gvk(), kind);
        self.by_gvr.insert(kind.gvr(), kind);
    }

    pub fn recognizes(&self, gvk: &Gvk) -> Option<TypedKind> {
        self.by_gvk.get(gvk).copied()
    }

    pub fn resolve(&self, gvr: &Gvr) -> Option<ResolvedResource> {
        self.by_gvr.get(gvr).map(|k| ResolvedResource::typed(*k))
    }

    /// Decode a JSON document: typed when the scheme recognizes its
    /// `apiVersion`/`kind`, unstructured otherwise.
    pub fn decode(&self, value: serde_json::Value) -> Result<ResourceObject, CacheError> {
        let api_version = value.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("");
        let kind = value.get("kind").and_then(|v| v.as_str()).unwrap_or("");
        if api_version.is_empty() || kind.is_empty() {
            return Err(CacheError::Decode(serde::de::Error::custom("object is missing apiVersion or kind")));
        }
        match self.recognizes(&Gvk::from_api_version(api_version, kind)) {
            Some(typed) => typed.decode(value),
            None => Ok(serde_json::from_value::<DynamicObject>(value)?.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksq_core::MetaObject;

    #[test]
    fn builtins_resolve_by_gvr_and_gvk() {
        let s = Scheme::with_builtins();
        let r = s.resolve(&Gvr::new("apps", "v1", "deployments")).unwrap();
        assert_eq!(r.typed, Some(TypedKind::Deployment));
        assert!(r.namespaced);
        assert_eq!(r.gvk, Gvk::new("apps", "v1", "Deployment"));

        let nodes = s.resolve(&Gvr::new("", "v1", "nodes")).unwrap();
        assert!(!nodes.namespaced);

        assert_eq!(s.recognizes(&Gvk::new("", "v1", "Secret")), Some(TypedKind::Secret));
        assert!(s.resolve(&Gvr::new("snapshot.storage.k8s.io", "v1", "volumesnapshots")).is_none());
    }

    #[test]
    fn decode_picks_representation() {
        let s = Scheme::with_builtins();
        let typed = s
            .decode(serde_json::json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "web", "namespace": "bar"},
                "spec": {"selector": {}, "template": {}}
            }))
            .unwrap();
        assert!(matches!(typed, ResourceObject::Deployment(_)));
        assert_eq!(typed.namespace(), "bar");

        let untyped = s
            .decode(serde_json::json!({
                "apiVersion": "example.io/v1",
                "kind": "Widget",
                "metadata": {"name": "w"},
                "spec": {"size": 3}
            }))
            .unwrap();
        assert!(untyped.is_unstructured());
        assert_eq!(untyped.name(), "w");

        assert!(matches!(s.decode(serde_json::json!({"metadata": {}})), Err(CacheError::Decode(_))));
    }

    #[test]
    fn empty_scheme_treats_everything_as_unstructured() {
        let s = Scheme::new();
        let o = s
            .decode(serde_json::json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "c"}}))
            .unwrap();
        assert!(o.is_unstructured());
    }
}
