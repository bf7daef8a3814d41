//! Generic comparator and filter over standard object metadata.

use std::collections::BTreeMap;

use ksq_core::{field, Field, Filter, MetaObject};

/// Default "left greater than right".
///
/// `name` compares names; every other field (including the creation-time
/// fields) compares creation timestamps and falls back to the name when they
/// are equal, which keeps the order total and pagination stable.
pub fn default_object_meta_compare<T: MetaObject + ?Sized>(left: &T, right: &T, sort_by: &Field) -> bool {
    match sort_by.as_str() {
        field::NAME => left.name() > right.name(),
        _ => {
            let (l, r) = (left.creation_timestamp(), right.creation_timestamp());
            if l == r {
                left.name() > right.name()
            } else {
                l > r
            }
        }
    }
}

/// Default metadata filter. Unrecognized fields reject every object.
pub fn default_object_meta_filter<T: MetaObject + ?Sized>(item: &T, filter: &Filter) -> bool {
    let value = filter.value.as_str();
    match filter.field.as_str() {
        field::NAMES => value.split(',').any(|n| n == item.name()),
        field::NAME => item.name().contains(value),
        field::UID => item.uid() == value,
        field::NAMESPACE => item.namespace() == value,
        field::OWNER_REFERENCE => item.owner_references().iter().any(|o| o.uid == value),
        field::OWNER_KIND => item.owner_references().iter().any(|o| o.kind == value),
        field::ANNOTATION => label_match(item.annotations(), value),
        field::LABEL => label_match(item.labels(), value),
        _ => false,
    }
}

/// Match `key=value`, `key!=value` or a bare `key` against a label-style map.
///
/// `key!=value` needs the key to be present with a different value; an absent
/// key does not match. A bare key (or `key=*`) matches any value.
pub fn label_match(labels: Option<&BTreeMap<String, String>>, filter: &str) -> bool {
    let Some(labels) = labels else { return false };
    let (key, value, negated) = match filter.split_once('=') {
        Some((k, v)) => match k.strip_suffix('!') {
            Some(k) => (k, v, true),
            None => (k, v, false),
        },
        None => (filter, "*", false),
    };
    match labels.get(key) {
        None => false,
        Some(v) if negated => v != value,
        Some(v) => value == "*" || v == value,
    }
}
