#![forbid(unsafe_code)]

use chrono::{TimeZone, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use ksq_core::{field, ListResult, MetaObject, Pagination, Query};
use ksq_list::{default_list, default_object_meta_compare, default_object_meta_filter};

#[derive(Debug, Clone)]
struct Item(ObjectMeta);

impl MetaObject for Item {
    fn meta(&self) -> &ObjectMeta {
        &self.0
    }
}

fn item(name: &str, ns: &str, secs: i64, labels: &[(&str, &str)]) -> Item {
    Item(ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(ns.to_string()),
        creation_timestamp: Some(Time(Utc.timestamp_opt(secs, 0).unwrap())),
        labels: Some(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
        ..Default::default()
    })
}

fn list(objects: Vec<Item>, q: &Query) -> ListResult<Item> {
    default_list(objects, q, default_object_meta_compare::<Item>, default_object_meta_filter::<Item>, &[])
}

fn names(r: &ListResult<Item>) -> Vec<String> {
    r.items.iter().map(|o| o.name().to_string()).collect()
}

#[test]
fn filters_are_conjunctive() {
    let objects = vec![
        item("web-1", "prod", 1, &[("app", "web")]),
        item("web-2", "dev", 2, &[("app", "web")]),
        item("api-1", "prod", 3, &[("app", "api")]),
        item("web-3", "prod", 4, &[("app", "api")]),
    ];
    let q = Query::new()
        .with_filter(field::NAME, "web")
        .with_filter(field::NAMESPACE, "prod")
        .with_filter(field::LABEL, "app=web");
    let r = list(objects, &q);
    assert_eq!(names(&r), vec!["web-1"], "each excluded item fails exactly one filter");
    assert_eq!(r.total_items, 1);
}

#[test]
fn equal_timestamps_sort_by_name_deterministically() {
    let base = vec![
        item("c", "ns", 10, &[]),
        item("a", "ns", 10, &[]),
        item("b", "ns", 10, &[]),
        item("d", "ns", 5, &[]),
    ];
    let mut reversed = base.clone();
    reversed.reverse();
    let mut rotated = base.clone();
    rotated.rotate_left(2);

    let q = Query::new();
    let expected = names(&list(base.clone(), &q));
    assert_eq!(expected, vec!["c", "b", "a", "d"]);
    for input in [base.clone(), reversed, rotated] {
        assert_eq!(names(&list(input.clone(), &q)), expected);
        assert_eq!(names(&list(input, &q)), expected, "repeated runs agree");
    }
}

#[test]
fn ascending_is_the_exact_reversal_of_default() {
    let objects = vec![item("mid", "ns", 20, &[]), item("new", "ns", 30, &[]), item("old", "ns", 10, &[])];
    let desc = list(objects.clone(), &Query::new());
    assert_eq!(names(&desc), vec!["new", "mid", "old"]);

    let asc = list(objects, &Query::new().with_sort(field::CREATION_TIMESTAMP, true));
    let mut reversed = names(&desc);
    reversed.reverse();
    assert_eq!(names(&asc), reversed);
}

#[test]
fn total_items_counts_filtered_not_paged() {
    let objects: Vec<Item> = (0..7).map(|i| item(&format!("obj-{i}"), "ns", i, &[])).collect();
    let q = Query::new().with_filter(field::NAME, "obj").with_pagination(Pagination::new(3, 0));
    let first = list(objects.clone(), &q);
    assert_eq!(first.total_items, 7);
    assert_eq!(first.items.len(), 3);

    let last = list(objects.clone(), &q.clone().with_pagination(Pagination::new(3, 2)));
    assert_eq!(last.total_items, 7);
    assert_eq!(names(&last), vec!["obj-0"]);

    let beyond = list(objects, &q.with_pagination(Pagination::new(3, 9)));
    assert_eq!(beyond.total_items, 7);
    assert!(beyond.items.is_empty());
}

#[test]
fn name_substring_sorted_by_name_first_page() {
    let objects = vec![item("foo-1", "bar", 1, &[]), item("foo-2", "bar", 2, &[]), item("bar-1", "bar", 3, &[])];
    let q = Query::new()
        .with_filter(field::NAME, "foo")
        .with_sort(field::NAME, false)
        .with_pagination(Pagination::new(1, 0));
    let r = list(objects, &q);
    assert_eq!(r.total_items, 2);
    assert_eq!(names(&r), vec!["foo-2"]);
}

#[test]
fn unknown_filter_field_yields_empty_result() {
    let objects = vec![item("a", "ns", 1, &[]), item("b", "ns", 2, &[])];
    let r = list(objects, &Query::new().with_filter("nonexistent", "x"));
    assert_eq!(r.total_items, 0);
    assert!(r.items.is_empty());
}
