//! `ResourceObject`: one listed object, either a statically typed kind known
//! to the [`Scheme`](crate::Scheme) or an unstructured document.

use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ConfigMap, Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Secret,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use ksq_core::{Gvk, MetaObject};
use kube::core::DynamicObject;
use serde::Serialize;

use crate::capability::{ConditionTimes, PhaseStatus, ReplicaStatus};
use crate::scheme::TypedKind;

/// Serializes to the object's own JSON document.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResourceObject {
    Pod(Box<Pod>),
    ConfigMap(Box<ConfigMap>),
    Secret(Box<Secret>),
    Namespace(Box<Namespace>),
    Node(Box<Node>),
    PersistentVolume(Box<PersistentVolume>),
    PersistentVolumeClaim(Box<PersistentVolumeClaim>),
    Deployment(Box<Deployment>),
    StatefulSet(Box<StatefulSet>),
    DaemonSet(Box<DaemonSet>),
    Job(Box<Job>),
    Unstructured(Box<DynamicObject>),
}

impl ResourceObject {
    pub fn typed_kind(&self) -> Option<TypedKind> {
        Some(match self {
            ResourceObject::Pod(_) => TypedKind::Pod,
            ResourceObject::ConfigMap(_) => TypedKind::ConfigMap,
            ResourceObject::Secret(_) => TypedKind::Secret,
            ResourceObject::Namespace(_) => TypedKind::Namespace,
            ResourceObject::Node(_) => TypedKind::Node,
            ResourceObject::PersistentVolume(_) => TypedKind::PersistentVolume,
            ResourceObject::PersistentVolumeClaim(_) => TypedKind::PersistentVolumeClaim,
            ResourceObject::Deployment(_) => TypedKind::Deployment,
            ResourceObject::StatefulSet(_) => TypedKind::StatefulSet,
            ResourceObject::DaemonSet(_) => TypedKind::DaemonSet,
            ResourceObject::Job(_) => TypedKind::Job,
            ResourceObject::Unstructured(_) => return None,
        })
    }

    /// Typed kinds report their static identity; unstructured objects report
    /// whatever `apiVersion`/`kind` they carry (empty when absent).
    pub fn gvk(&self) -> Gvk {
        match (self.typed_kind(), self) {
            (Some(kind), _) => kind.gvk(),
            (None, ResourceObject::Unstructured(o)) => match &o.types {
                Some(t) => Gvk::from_api_version(&t.api_version, &t.kind),
                None => Gvk::new("", "", ""),
            },
            (None, _) => Gvk::new("", "", ""),
        }
    }

    pub fn is_unstructured(&self) -> bool {
        matches!(self, ResourceObject::Unstructured(_))
    }

    /// The unstructured document, if this object is one of `kind`.
    pub fn unstructured_of_kind(&self, kind: &str) -> Option<&DynamicObject> {
        match self {
            ResourceObject::Unstructured(o) if o.types.as_ref().map(|t| t.kind.as_str()) == Some(kind) => Some(o),
            _ => None,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ResourceObject::Pod(o) => &mut o.metadata,
            ResourceObject::ConfigMap(o) => &mut o.metadata,
            ResourceObject::Secret(o) => &mut o.metadata,
            ResourceObject::Namespace(o) => &mut o.metadata,
            ResourceObject::Node(o) => &mut o.metadata,
            ResourceObject::PersistentVolume(o) => &mut o.metadata,
            ResourceObject::PersistentVolumeClaim(o) => &mut o.metadata,
            ResourceObject::Deployment(o) => &mut o.metadata,
            ResourceObject::StatefulSet(o) => &mut o.metadata,
            ResourceObject::DaemonSet(o) => &mut o.metadata,
            ResourceObject::Job(o) => &mut o.metadata,
            ResourceObject::Unstructured(o) => &mut o.metadata,
        }
    }

    pub fn without_managed_fields(mut self) -> Self {
        self.meta_mut().managed_fields = None;
        self
    }

    pub fn replica_status(&self) -> Option<&dyn ReplicaStatus> {
        match self {
            ResourceObject::Deployment(o) => Some(&**o),
            ResourceObject::StatefulSet(o) => Some(&**o),
            ResourceObject::DaemonSet(o) => Some(&**o),
            _ => None,
        }
    }

    pub fn phase_status(&self) -> Option<&dyn PhaseStatus> {
        match self {
            ResourceObject::Pod(o) => Some(&**o),
            ResourceObject::PersistentVolumeClaim(o) => Some(&**o),
            ResourceObject::PersistentVolume(o) => Some(&**o),
            ResourceObject::Namespace(o) => Some(&**o),
            _ => None,
        }
    }

    pub fn condition_times(&self) -> Option<&dyn ConditionTimes> {
        match self {
            ResourceObject::Deployment(o) => Some(&**o),
            ResourceObject::Job(o) => Some(&**o),
            ResourceObject::Unstructured(o) => Some(&**o),
            _ => None,
        }
    }

    /// Latest condition timestamp; creation time when there are no conditions.
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        self.condition_times()
            .and_then(|c| c.latest_condition_time())
            .or_else(|| self.creation_timestamp())
    }
}

impl MetaObject for ResourceObject {
    fn meta(&self) -> &ObjectMeta {
        match self {
            ResourceObject::Pod(o) => &o.metadata,
            ResourceObject::ConfigMap(o) => &o.metadata,
            ResourceObject::Secret(o) => &o.metadata,
            ResourceObject::Namespace(o) => &o.metadata,
            ResourceObject::Node(o) => &o.metadata,
            ResourceObject::PersistentVolume(o) => &o.metadata,
            ResourceObject::PersistentVolumeClaim(o) => &o.metadata,
            ResourceObject::Deployment(o) => &o.metadata,
            ResourceObject::StatefulSet(o) => &o.metadata,
            ResourceObject::DaemonSet(o) => &o.metadata,
            ResourceObject::Job(o) => &o.metadata,
            ResourceObject::Unstructured(o) => &o.metadata,
        }
    }
}

macro_rules! from_kind {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for ResourceObject {
                fn from(o: $ty) -> Self {
                    ResourceObject::$ty(Box::new(o))
                }
            }
        )*
    };
}

from_kind!(
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
);

impl From<DynamicObject> for ResourceObject {
    fn from(o: DynamicObject) -> Self {
        ResourceObject::Unstructured(Box::new(o))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ManagedFieldsEntry;

    #[test]
    fn gvk_for_typed_and_unstructured() {
        let d = ResourceObject::from(Deployment::default());
        assert_eq!(d.gvk(), Gvk::new("apps", "v1", "Deployment"));
        assert_eq!(d.typed_kind(), Some(TypedKind::Deployment));

        let u: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "snapshot.storage.k8s.io/v1",
            "kind": "VolumeSnapshot",
            "metadata": {"name": "snap"}
        }))
        .unwrap();
        let u = ResourceObject::from(u);
        assert_eq!(u.gvk(), Gvk::new("snapshot.storage.k8s.io", "v1", "VolumeSnapshot"));
        assert!(u.unstructured_of_kind("VolumeSnapshot").is_some());
        assert!(u.unstructured_of_kind("VolumeSnapshotClass").is_none());
        assert_eq!(u.name(), "snap");
    }

    #[test]
    fn strips_managed_fields() {
        let mut cm = ConfigMap::default();
        cm.metadata.managed_fields = Some(vec![ManagedFieldsEntry::default()]);
        let o = ResourceObject::from(cm).without_managed_fields();
        assert!(o.meta().managed_fields.is_none());
    }

    #[test]
    fn serializes_as_the_inner_document() {
        let mut cm = ConfigMap::default();
        cm.metadata.name = Some("cfg".into());
        let v = serde_json::to_value(ResourceObject::from(cm)).unwrap();
        assert_eq!(v["kind"], "ConfigMap");
        assert_eq!(v["metadata"]["name"], "cfg");
    }
}
