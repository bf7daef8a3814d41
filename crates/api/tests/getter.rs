#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ksq_api::{ApiError, Config, ResourceGetter};
use ksq_core::{field, Gvr, MetaObject, Pagination, Query};
use ksq_resources::{CacheError, CrdInfo, CrdLookup, ListRegistry, ResourceObject, Scheme};
use ksq_store::{load_documents, MemoryCache, StaticCrds};

const DUMP: &str = r#"
apiVersion: v1
kind: List
items:
  - apiVersion: apps/v1
    kind: Deployment
    metadata:
      name: foo-1
      namespace: bar
      creationTimestamp: "2024-01-01T00:00:01Z"
      labels: {kubesphere.io/workspace: ws1, app: foo}
      managedFields: [{manager: kubectl}]
  - apiVersion: apps/v1
    kind: Deployment
    metadata:
      name: foo-2
      namespace: bar
      creationTimestamp: "2024-01-01T00:00:02Z"
      labels: {kubesphere.io/workspace: ws1, app: foo}
  - apiVersion: apps/v1
    kind: Deployment
    metadata:
      name: bar-1
      namespace: bar
      creationTimestamp: "2024-01-01T00:00:03Z"
      labels: {kubesphere.io/workspace: ws2, app: bar}
  - apiVersion: apps/v1
    kind: Deployment
    metadata:
      name: foo-3
      namespace: other
      creationTimestamp: "2024-01-01T00:00:04Z"
      labels: {kubesphere.io/workspace: ws2, app: foo}
  - apiVersion: v1
    kind: Node
    metadata: {name: node-a, creationTimestamp: "2024-01-01T00:00:00Z"}
  - apiVersion: example.io/v1
    kind: Widget
    metadata: {name: w1, namespace: bar, creationTimestamp: "2024-01-01T00:00:00Z"}
  - apiVersion: example.io/v1
    kind: Gadget
    metadata: {name: g1, creationTimestamp: "2024-01-01T00:00:00Z"}
"#;

/// Counts lookups so tests can see what the served cache keeps.
struct Counting {
    inner: StaticCrds,
    calls: AtomicUsize,
}

#[async_trait]
impl CrdLookup for Counting {
    async fn find(&self, gvr: &Gvr) -> Result<Option<CrdInfo>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find(gvr).await
    }
}

fn widgets() -> Gvr {
    Gvr::new("example.io", "v1", "widgets")
}

fn gadgets() -> Gvr {
    Gvr::new("example.io", "v1", "gadgets")
}

fn deployments() -> Gvr {
    Gvr::new("apps", "v1", "deployments")
}

fn setup() -> (ResourceGetter, Arc<Counting>) {
    let scheme = Arc::new(Scheme::with_builtins());
    let objects = load_documents(&scheme, DUMP).unwrap();
    let crds = StaticCrds::new()
        .with(
            widgets(),
            CrdInfo { gvk: ksq_core::Gvk::new("example.io", "v1", "Widget"), namespaced: true, served: true },
        )
        .with(
            gadgets(),
            CrdInfo { gvk: ksq_core::Gvk::new("example.io", "v1", "Gadget"), namespaced: false, served: false },
        );
    let lookup = Arc::new(Counting { inner: crds, calls: AtomicUsize::new(0) });
    let getter = ResourceGetter::new(
        scheme,
        Arc::new(ListRegistry::with_builtin_overrides()),
        Arc::new(MemoryCache::from_objects(objects)),
        lookup.clone(),
        Config::default(),
    );
    (getter, lookup)
}

fn names(items: &[ResourceObject]) -> Vec<&str> {
    items.iter().map(|o| o.name()).collect()
}

#[tokio::test]
async fn end_to_end_deployment_page() {
    let (getter, lookup) = setup();
    let q = Query::new()
        .with_filter(field::NAME, "foo")
        .with_sort(field::NAME, false)
        .with_pagination(Pagination::new(1, 0));
    let out = getter.list(&deployments(), Some("bar"), &q).await.unwrap();
    assert_eq!(out.total_items, 2);
    assert_eq!(names(&out.items), vec!["foo-2"]);
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0, "typed kinds never consult CRDs");
}

#[tokio::test]
async fn get_strips_managed_fields() {
    let (getter, _) = setup();
    let obj = getter.get(&deployments(), Some("bar"), "foo-1").await.unwrap();
    assert!(obj.meta().managed_fields.is_none());

    let missing = getter.get(&deployments(), Some("bar"), "nope").await.unwrap_err();
    assert!(matches!(missing, ApiError::NotFound { .. }));
    assert_eq!(missing.status_code(), 404);
}

#[tokio::test]
async fn get_needs_a_namespace_for_namespaced_kinds() {
    let (getter, _) = setup();
    let err = getter.get(&deployments(), None, "foo-1").await.unwrap_err();
    assert!(matches!(err, ApiError::NamespaceRequired(_)));
    assert_eq!(err.status_code(), 400);

    let node = getter.get(&Gvr::new("", "v1", "nodes"), None, "node-a").await.unwrap();
    assert_eq!(node.name(), "node-a");
    let node = getter.get(&Gvr::new("", "v1", "nodes"), Some("bar"), "node-a").await.unwrap();
    assert_eq!(node.name(), "node-a");
}

#[tokio::test]
async fn cluster_scoped_ignores_namespace() {
    let (getter, _) = setup();
    let nodes = getter.list(&Gvr::new("", "v1", "nodes"), Some("bar"), &Query::new()).await.unwrap();
    assert_eq!(names(&nodes.items), vec!["node-a"]);
}

#[tokio::test]
async fn served_custom_resources_are_cached() {
    let (getter, lookup) = setup();
    for _ in 0..3 {
        let out = getter.list(&widgets(), None, &Query::new()).await.unwrap();
        assert_eq!(names(&out.items), vec!["w1"]);
        assert!(out.items[0].is_unstructured());
    }
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    assert_eq!(getter.served().len().await, 1);
}

#[tokio::test]
async fn unserved_and_unknown_resources_are_rejected() {
    let (getter, lookup) = setup();
    for _ in 0..2 {
        let err = getter.list(&gadgets(), None, &Query::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotServed(_)));
        assert_eq!(err.status_code(), 400);
    }
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 2, "unserved results are not cached");

    let err = getter.list(&Gvr::new("example.io", "v1", "gizmos"), None, &Query::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::NotSupported(_)));
    assert!(getter.served().is_empty().await);
}

#[tokio::test]
async fn workspace_listing_spans_namespaces() {
    let (getter, _) = setup();
    let ws2 = getter.list_in_workspace(&deployments(), "ws2", &Query::new().with_sort(field::NAME, true)).await.unwrap();
    assert_eq!(names(&ws2.items), vec!["bar-1", "foo-3"]);

    let q = Query::new().with_filter(field::LABEL, "app=foo");
    let foo_in_ws2 = getter.list_in_workspace(&deployments(), "ws2", &q).await.unwrap();
    assert_eq!(names(&foo_in_ws2.items), vec!["foo-3"], "both label constraints apply");
}

#[tokio::test]
async fn query_parsing_strictness() {
    let (getter, _) = setup();
    let lenient = getter.parse_query([("limit", "abc"), ("name", "foo")], false).unwrap();
    assert_eq!(lenient.pagination(), Pagination::NONE);
    assert!(lenient.has_filter(field::NAME));

    let err = getter.parse_query([("limit", "abc")], true).unwrap_err();
    assert!(matches!(err, ApiError::InvalidQuery(_)));
    assert_eq!(err.status_code(), 400);

    let err = getter.parse_query([("sortBy", "bogus")], true).unwrap_err();
    assert!(matches!(err, ApiError::InvalidQuery(_)));
    let lenient = getter.parse_query([("sortBy", "bogus")], false).unwrap();
    assert_eq!(lenient.sort_by.as_str(), "bogus");

    let q = getter.parse_query([("storageClassName", "fast"), ("page", "2"), ("limit", "5")], true).unwrap();
    assert_eq!(q.pagination(), Pagination::new(5, 1));
    assert!(q.has_filter("storageClassName"));
}
