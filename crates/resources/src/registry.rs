//! Per-kind list overrides.
//!
//! A [`ListRegistry`] is populated once at startup and then shared read-only.
//! Kinds without a registered function fall back to the generic metadata
//! comparator and filter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ksq_core::{Field, FieldSet, Filter, Gvk, ListResult, Query};
use ksq_list::{default_list, default_object_meta_compare, default_object_meta_filter, CompareFunc, FilterFunc, TransformFunc};
use tracing::debug;

use crate::object::ResourceObject;

#[derive(Default)]
pub struct ListRegistry {
    filters: HashMap<Gvk, FilterFunc<ResourceObject>>,
    comparers: HashMap<Gvk, CompareFunc<ResourceObject>>,
    transforms: HashMap<Gvk, Vec<TransformFunc<ResourceObject>>>,
    fields: FieldSet,
}

impl fmt::Debug for ListRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListRegistry")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .field("comparers", &self.comparers.keys().collect::<Vec<_>>())
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .field("fields", &self.fields)
            .finish()
    }
}

impl ListRegistry {
    /// Empty registry: generic behavior for every kind, base comparable fields.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_overrides() -> Self {
        let mut r = Self::new();
        crate::overrides::register_builtin(&mut r);
        r
    }

    pub fn register_filter(&mut self, gvk: Gvk, f: FilterFunc<ResourceObject>) {
        self.filters.insert(gvk, f);
    }

    pub fn register_comparer(&mut self, gvk: Gvk, f: CompareFunc<ResourceObject>) {
        self.comparers.insert(gvk, f);
    }

    /// Appends to any transforms already registered for `gvk`.
    pub fn register_transforms(&mut self, gvk: Gvk, fs: Vec<TransformFunc<ResourceObject>>) {
        self.transforms.entry(gvk).or_default().extend(fs);
    }

    /// Make `field` eligible as a filter when parsing query parameters.
    pub fn register_field(&mut self, field: impl Into<Field>) {
        self.fields.insert(field);
    }

    /// Make `field` accepted as `sortBy` without a diagnostic.
    pub fn register_sort_field(&mut self, field: impl Into<Field>) {
        self.fields.insert_sortable(field);
    }

    pub fn filter_for(&self, gvk: &Gvk) -> FilterFunc<ResourceObject> {
        self.filters
            .get(gvk)
            .cloned()
            .unwrap_or_else(|| Arc::new(default_object_meta_filter::<ResourceObject>))
    }

    pub fn comparer_for(&self, gvk: &Gvk) -> CompareFunc<ResourceObject> {
        self.comparers
            .get(gvk)
            .cloned()
            .unwrap_or_else(|| Arc::new(default_object_meta_compare::<ResourceObject>))
    }

    pub fn transforms_for(&self, gvk: &Gvk) -> &[TransformFunc<ResourceObject>] {
        self.transforms.get(gvk).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn comparable_fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Every kind with at least one override, sorted by key.
    pub fn registered(&self) -> Vec<Gvk> {
        let mut out: Vec<Gvk> = self
            .filters
            .keys()
            .chain(self.comparers.keys())
            .chain(self.transforms.keys())
            .cloned()
            .collect();
        out.sort_by_key(|g| g.key());
        out.dedup();
        out
    }

    /// Run the list pipeline for `gvk` with its resolved functions.
    pub fn list(&self, gvk: &Gvk, objects: Vec<ResourceObject>, q: &Query) -> ListResult<ResourceObject> {
        let filter = self.filter_for(gvk);
        let compare = self.comparer_for(gvk);
        debug!(gvk = %gvk, objects = objects.len(), "registry list");
        metrics::counter!("list_requests_total", 1u64, "gvk" => gvk.key());
        default_list(
            objects,
            q,
            |a: &ResourceObject, b: &ResourceObject, f: &Field| compare(a, b, f),
            |o: &ResourceObject, f: &Filter| filter(o, f),
            self.transforms_for(gvk),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use ksq_core::{field, MetaObject};

    fn cm(name: &str) -> ResourceObject {
        let mut c = ConfigMap::default();
        c.metadata.name = Some(name.to_string());
        c.into()
    }

    fn configmap_gvk() -> Gvk {
        Gvk::new("", "v1", "ConfigMap")
    }

    #[test]
    fn falls_back_to_generic_functions() {
        let r = ListRegistry::new();
        assert!(r.registered().is_empty());
        let out = r.list(&configmap_gvk(), vec![cm("a"), cm("b")], &Query::new().with_filter(field::NAME, "a"));
        assert_eq!(out.total_items, 1);
        assert_eq!(out.items[0].name(), "a");
    }

    #[test]
    fn override_chains_to_default() {
        let mut r = ListRegistry::new();
        r.register_filter(
            configmap_gvk(),
            Arc::new(|o: &ResourceObject, f: &Filter| match f.field.as_str() {
                "shout" => o.name().to_uppercase() == f.value.as_str(),
                _ => default_object_meta_filter(o, f),
            }),
        );
        r.register_field("shout");
        assert!(r.comparable_fields().contains("shout"));
        assert!(r.comparable_fields().contains(field::NAME));
        assert!(!r.comparable_fields().is_sortable("shout"));
        r.register_sort_field("shout");
        assert!(r.comparable_fields().is_sortable("shout"));
        assert!(r.comparable_fields().is_sortable(field::CREATION_TIMESTAMP));

        let q = Query::new().with_filter("shout", "AB").with_filter(field::NAME, "a");
        let out = r.list(&configmap_gvk(), vec![cm("ab"), cm("abc"), cm("b")], &q);
        assert_eq!(out.items.iter().map(|o| o.name()).collect::<Vec<_>>(), vec!["ab"]);
        assert_eq!(r.registered(), vec![configmap_gvk()]);
    }

    #[test]
    fn transforms_accumulate_in_registration_order() {
        let mut r = ListRegistry::new();
        let tag = |suffix: &'static str| -> TransformFunc<ResourceObject> {
            Arc::new(move |mut o: ResourceObject| {
                let name = format!("{}{suffix}", o.name());
                o.meta_mut().name = Some(name);
                o
            })
        };
        r.register_transforms(configmap_gvk(), vec![tag("-1")]);
        r.register_transforms(configmap_gvk(), vec![tag("-2")]);
        let out = r.list(&configmap_gvk(), vec![cm("x")], &Query::new());
        assert_eq!(out.items[0].name(), "x-1-2");
    }
}
