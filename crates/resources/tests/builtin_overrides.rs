#![forbid(unsafe_code)]

use chrono::{TimeZone, Utc};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition, DeploymentStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ManagedFieldsEntry, Time};
use ksq_core::{field, FieldSet, MetaObject, Pagination, Query};
use ksq_resources::overrides::{application_gvk, fields};
use ksq_resources::{ListRegistry, ResourceObject, TypedKind};

fn at(secs: i64) -> Time {
    Time(Utc.timestamp_opt(secs, 0).unwrap())
}

fn deployment(name: &str, created: i64, replicas: i32, ready: i32) -> ResourceObject {
    let mut d = Deployment::default();
    d.metadata.name = Some(name.to_string());
    d.metadata.namespace = Some("bar".to_string());
    d.metadata.creation_timestamp = Some(at(created));
    d.metadata.managed_fields = Some(vec![ManagedFieldsEntry::default()]);
    d.status = Some(DeploymentStatus { replicas: Some(replicas), ready_replicas: Some(ready), ..Default::default() });
    d.into()
}

fn names(items: &[ResourceObject]) -> Vec<&str> {
    items.iter().map(|o| o.name()).collect()
}

#[test]
fn deployments_by_name_substring_first_page() {
    let registry = ListRegistry::with_builtin_overrides();
    let objects = vec![deployment("foo-1", 1, 1, 1), deployment("foo-2", 2, 1, 1), deployment("bar-1", 3, 1, 1)];
    let q = Query::new()
        .with_filter(field::NAME, "foo")
        .with_sort(field::NAME, false)
        .with_pagination(Pagination::new(1, 0));

    let out = registry.list(&TypedKind::Deployment.gvk(), objects, &q);
    assert_eq!(out.total_items, 2);
    assert_eq!(names(&out.items), vec!["foo-2"]);
    assert!(out.items[0].meta().managed_fields.is_none(), "managed fields stripped before exposure");
}

#[test]
fn deployment_status_filter() {
    let registry = ListRegistry::with_builtin_overrides();
    let objects = vec![deployment("idle", 1, 0, 0), deployment("ok", 2, 3, 3), deployment("rolling", 3, 3, 1)];
    let gvk = TypedKind::Deployment.gvk();
    for (status, expected) in [("stopped", "idle"), ("running", "ok"), ("updating", "rolling")] {
        let out = registry.list(&gvk, objects.clone(), &Query::new().with_filter(field::STATUS, status));
        assert_eq!(names(&out.items), vec![expected], "status={status}");
    }
}

#[test]
fn deployment_update_time_uses_latest_condition() {
    let registry = ListRegistry::with_builtin_overrides();
    let with_condition = |name: &str, created: i64, updated: Option<i64>| -> ResourceObject {
        let mut d = Deployment::default();
        d.metadata.name = Some(name.to_string());
        d.metadata.creation_timestamp = Some(at(created));
        d.status = Some(DeploymentStatus {
            conditions: updated.map(|u| {
                vec![DeploymentCondition {
                    type_: "Progressing".into(),
                    status: "True".into(),
                    last_update_time: Some(at(u)),
                    ..Default::default()
                }]
            }),
            ..Default::default()
        });
        d.into()
    };
    let objects = vec![with_condition("a", 30, None), with_condition("b", 10, Some(50)), with_condition("c", 20, Some(40))];
    let out = registry.list(&TypedKind::Deployment.gvk(), objects, &Query::new().with_sort(field::UPDATE_TIME, false));
    assert_eq!(names(&out.items), vec!["b", "c", "a"]);
}

#[test]
fn application_update_time_from_unstructured_conditions() {
    let registry = ListRegistry::with_builtin_overrides();
    let app = |name: &str, updated: &str| -> ResourceObject {
        serde_json::from_value::<kube::core::DynamicObject>(serde_json::json!({
            "apiVersion": "app.k8s.io/v1beta1",
            "kind": "Application",
            "metadata": {"name": name, "creationTimestamp": "2020-01-01T00:00:00Z"},
            "status": {"conditions": [{"type": "Ready", "lastUpdateTime": updated}]}
        }))
        .unwrap()
        .into()
    };
    let objects = vec![app("old", "2021-01-01T00:00:00Z"), app("new", "2022-01-01T00:00:00Z")];
    let asc = registry.list(&application_gvk(), objects, &Query::new().with_sort(field::LAST_UPDATE_TIMESTAMP, true));
    assert_eq!(names(&asc.items), vec!["old", "new"]);
}

#[test]
fn parsed_parameters_reach_kind_fields() {
    let registry = ListRegistry::with_builtin_overrides();
    let params = [("storageClassName", "fast"), ("bogus", "x"), ("limit", "10")];
    let parsed = Query::parse(params, registry.comparable_fields());
    assert!(parsed.query.has_filter(fields::STORAGE_CLASS_NAME));
    assert!(!parsed.query.has_filter("bogus"));

    let plain = Query::parse([("storageClassName", "fast")], &FieldSet::default());
    assert!(!plain.query.has_filter(fields::STORAGE_CLASS_NAME));
}
