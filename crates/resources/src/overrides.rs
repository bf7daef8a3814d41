//! Built-in per-kind filters, comparers and transforms.
//!
//! Every override handles its own fields and hands the rest to the generic
//! metadata filter or comparator. An object of the wrong shape (say an
//! unstructured document listed under the Deployment key) fails the
//! kind-specific predicates instead of panicking.

use std::sync::Arc;

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use ksq_core::{field, Field, Filter, Gvk, MetaObject};
use ksq_list::{default_object_meta_compare, default_object_meta_filter, TransformFunc};
use kube::core::DynamicObject;

use crate::object::ResourceObject;
use crate::registry::ListRegistry;
use crate::scheme::TypedKind;

/// Filter fields added by the built-in kinds.
pub mod fields {
    pub const STORAGE_CLASS_NAME: &str = "storageClassName";
    pub const DRIVER: &str = "driver";
    pub const DELETION_POLICY: &str = "deletionPolicy";
    pub const VOLUME_SNAPSHOT_CLASS_NAME: &str = "volumeSnapshotClassName";
    pub const PERSISTENT_VOLUME_CLAIM_NAME: &str = "persistentVolumeClaimName";
    pub const VOLUME_SNAPSHOT_NAME: &str = "volumeSnapshotName";
    pub const NODE_NAME: &str = "nodeName";
    pub const PVC_NAME: &str = "pvcName";

    pub const ALL: &[&str] = &[
        STORAGE_CLASS_NAME,
        DRIVER,
        DELETION_POLICY,
        VOLUME_SNAPSHOT_CLASS_NAME,
        PERSISTENT_VOLUME_CLAIM_NAME,
        VOLUME_SNAPSHOT_NAME,
        NODE_NAME,
        PVC_NAME,
        super::field::TYPE,
    ];
}

pub const SNAPSHOT_GROUP: &str = "snapshot.storage.k8s.io";
const STORAGE_CLASS_ANNOTATION: &str = "volume.beta.kubernetes.io/storage-class";

pub fn volume_snapshot_gvk() -> Gvk {
    Gvk::new(SNAPSHOT_GROUP, "v1", "VolumeSnapshot")
}

pub fn volume_snapshot_class_gvk() -> Gvk {
    Gvk::new(SNAPSHOT_GROUP, "v1", "VolumeSnapshotClass")
}

pub fn volume_snapshot_content_gvk() -> Gvk {
    Gvk::new(SNAPSHOT_GROUP, "v1", "VolumeSnapshotContent")
}

pub fn application_gvk() -> Gvk {
    Gvk::new("app.k8s.io", "v1beta1", "Application")
}

pub fn federated_application_gvk() -> Gvk {
    Gvk::new("types.kubefed.io", "v1beta1", "FederatedApplication")
}

pub fn register_builtin(r: &mut ListRegistry) {
    for f in fields::ALL {
        r.register_field(Field::from_static(*f));
    }

    let strip: TransformFunc<ResourceObject> = Arc::new(ResourceObject::without_managed_fields);
    for kind in TypedKind::ALL {
        r.register_transforms(kind.gvk(), vec![strip.clone()]);
    }

    for kind in [TypedKind::Deployment, TypedKind::StatefulSet, TypedKind::DaemonSet, TypedKind::Namespace] {
        r.register_filter(kind.gvk(), Arc::new(status_filter));
    }
    r.register_filter(TypedKind::Job.gvk(), Arc::new(job_filter));
    r.register_filter(TypedKind::Pod.gvk(), Arc::new(pod_filter));
    r.register_filter(TypedKind::PersistentVolumeClaim.gvk(), Arc::new(pvc_filter));
    r.register_filter(TypedKind::PersistentVolume.gvk(), Arc::new(pv_filter));
    r.register_filter(TypedKind::Secret.gvk(), Arc::new(secret_filter));
    r.register_filter(volume_snapshot_gvk(), Arc::new(volume_snapshot_filter));
    r.register_filter(volume_snapshot_class_gvk(), Arc::new(volume_snapshot_class_filter));
    r.register_filter(volume_snapshot_content_gvk(), Arc::new(volume_snapshot_content_filter));

    for gvk in [TypedKind::Deployment.gvk(), TypedKind::Job.gvk(), application_gvk(), federated_application_gvk()] {
        r.register_comparer(gvk, Arc::new(update_time_compare));
    }
}

/// `status` through whichever status capability the object has: workload
/// state for replicated workloads, phase (case-insensitive) otherwise.
pub fn status_matches(o: &ResourceObject, value: &str) -> bool {
    if let Some(r) = o.replica_status() {
        return r.workload_state().as_str() == value;
    }
    match o.phase_status().and_then(|p| p.phase()) {
        Some(phase) => phase.eq_ignore_ascii_case(value),
        None => false,
    }
}

pub fn status_filter(o: &ResourceObject, f: &Filter) -> bool {
    match f.field.as_str() {
        field::STATUS => status_matches(o, f.value.as_str()),
        _ => default_object_meta_filter(o, f),
    }
}

/// Sort by the latest condition update, ties broken by name. Other sort
/// fields go to the generic comparator.
pub fn update_time_compare(a: &ResourceObject, b: &ResourceObject, sort_by: &Field) -> bool {
    match sort_by.as_str() {
        field::UPDATE_TIME | field::LAST_UPDATE_TIMESTAMP => {
            let (l, r) = (a.last_update_time(), b.last_update_time());
            if l == r {
                a.name() > b.name()
            } else {
                l > r
            }
        }
        _ => default_object_meta_compare(a, b, sort_by),
    }
}

/// `failed` or `completed` once the matching condition is true; `running`
/// until then.
/// The first true `Failed` or `Complete` condition decides.
pub fn job_status(job: &Job) -> &'static str {
    for c in job.status.iter().flat_map(|s| s.conditions.iter().flatten()) {
        if c.status != "True" {
            continue;
        }
        match c.type_.as_str() {
            "Failed" => return "failed",
            "Complete" => return "completed",
            _ => {}
        }
    }
    "running"
}

fn job_filter(o: &ResourceObject, f: &Filter) -> bool {
    match (f.field.as_str(), o) {
        (field::STATUS, ResourceObject::Job(job)) => job_status(job) == f.value.as_str(),
        (field::STATUS, _) => false,
        _ => default_object_meta_filter(o, f),
    }
}

fn pod_uses_claim(pod: &Pod, claim: &str) -> bool {
    pod.spec
        .iter()
        .flat_map(|s| s.volumes.iter().flatten())
        .filter_map(|v| v.persistent_volume_claim.as_ref())
        .any(|c| c.claim_name == claim)
}

fn pod_filter(o: &ResourceObject, f: &Filter) -> bool {
    let value = f.value.as_str();
    match (f.field.as_str(), o) {
        (field::STATUS, _) => status_matches(o, value),
        (fields::NODE_NAME, ResourceObject::Pod(pod)) => {
            pod.spec.as_ref().and_then(|s| s.node_name.as_deref()) == Some(value)
        }
        (fields::PVC_NAME, ResourceObject::Pod(pod)) => pod_uses_claim(pod, value),
        (fields::NODE_NAME | fields::PVC_NAME, _) => false,
        _ => default_object_meta_filter(o, f),
    }
}

fn pvc_storage_class(pvc: &PersistentVolumeClaim) -> Option<&str> {
    pvc.spec
        .as_ref()
        .and_then(|s| s.storage_class_name.as_deref())
        .or_else(|| pvc.metadata.annotations.as_ref()?.get(STORAGE_CLASS_ANNOTATION).map(String::as_str))
}

fn pvc_filter(o: &ResourceObject, f: &Filter) -> bool {
    match (f.field.as_str(), o) {
        (field::STATUS, _) => status_matches(o, f.value.as_str()),
        (fields::STORAGE_CLASS_NAME, ResourceObject::PersistentVolumeClaim(pvc)) => {
            pvc_storage_class(pvc) == Some(f.value.as_str())
        }
        (fields::STORAGE_CLASS_NAME, _) => false,
        _ => default_object_meta_filter(o, f),
    }
}

fn pv_filter(o: &ResourceObject, f: &Filter) -> bool {
    match (f.field.as_str(), o) {
        (field::STATUS, _) => status_matches(o, f.value.as_str()),
        (fields::STORAGE_CLASS_NAME, ResourceObject::PersistentVolume(pv)) => {
            pv.spec.as_ref().and_then(|s| s.storage_class_name.as_deref()) == Some(f.value.as_str())
        }
        (fields::STORAGE_CLASS_NAME, _) => false,
        _ => default_object_meta_filter(o, f),
    }
}

fn secret_filter(o: &ResourceObject, f: &Filter) -> bool {
    match (f.field.as_str(), o) {
        (field::TYPE, ResourceObject::Secret(s)) => s.type_.as_deref() == Some(f.value.as_str()),
        (field::TYPE, _) => false,
        _ => default_object_meta_filter(o, f),
    }
}

fn str_at<'a>(o: &'a DynamicObject, pointer: &str) -> Option<&'a str> {
    o.data.pointer(pointer).and_then(|v| v.as_str())
}

/// `deleting` wins over everything, then `ready` once `status.readyToUse`
/// is true, `creating` before that.
pub fn snapshot_status(o: &DynamicObject) -> &'static str {
    if o.metadata.deletion_timestamp.is_some() {
        "deleting"
    } else if o.data.pointer("/status/readyToUse").and_then(|v| v.as_bool()) == Some(true) {
        "ready"
    } else {
        "creating"
    }
}

fn volume_snapshot_filter(o: &ResourceObject, f: &Filter) -> bool {
    let value = f.value.as_str();
    let snap = o.unstructured_of_kind("VolumeSnapshot");
    match f.field.as_str() {
        field::STATUS => snap.is_some_and(|s| snapshot_status(s) == value),
        fields::VOLUME_SNAPSHOT_CLASS_NAME => {
            snap.and_then(|s| str_at(s, "/spec/volumeSnapshotClassName")) == Some(value)
        }
        fields::PERSISTENT_VOLUME_CLAIM_NAME => {
            snap.and_then(|s| str_at(s, "/spec/source/persistentVolumeClaimName")) == Some(value)
        }
        _ => default_object_meta_filter(o, f),
    }
}

fn volume_snapshot_class_filter(o: &ResourceObject, f: &Filter) -> bool {
    let value = f.value.as_str();
    let class = o.unstructured_of_kind("VolumeSnapshotClass");
    match f.field.as_str() {
        fields::DELETION_POLICY => class
            .and_then(|c| str_at(c, "/deletionPolicy"))
            .is_some_and(|p| p.eq_ignore_ascii_case(value)),
        fields::DRIVER => class.and_then(|c| str_at(c, "/driver")) == Some(value),
        _ => default_object_meta_filter(o, f),
    }
}

fn volume_snapshot_content_filter(o: &ResourceObject, f: &Filter) -> bool {
    let value = f.value.as_str();
    let content = o.unstructured_of_kind("VolumeSnapshotContent");
    match f.field.as_str() {
        field::STATUS => content.is_some_and(|c| snapshot_status(c) == value),
        fields::VOLUME_SNAPSHOT_CLASS_NAME => {
            content.and_then(|c| str_at(c, "/spec/volumeSnapshotClassName")) == Some(value)
        }
        fields::VOLUME_SNAPSHOT_NAME => content.and_then(|c| str_at(c, "/spec/volumeSnapshotRef/name")) == Some(value),
        _ => default_object_meta_filter(o, f),
    }
}
