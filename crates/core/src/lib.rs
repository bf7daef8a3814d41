//! ksq core types: query model, object metadata capability and list results.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use serde::{Deserialize, Serialize};

pub mod query;
pub mod selector;

pub use query::{
    field, param, DiagnosticReason, Field, FieldSet, Filter, Pagination, ParamDiagnostic, ParsedQuery, Query,
    QueryError, Value,
};
pub use selector::{LabelSelector, Requirement, SelectorError};

pub mod prelude {
    pub use super::{
        field, Field, Filter, Gvk, Gvr, LabelSelector, ListResult, MetaObject, Pagination, Query, Value,
    };
}

/// Group/Version/Kind: identity of a schema type and the key of every per-kind registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), kind: kind.into() }
    }

    /// Split an `apiVersion` (`v1` or `group/v1`) and pair it with `kind`.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() { self.version.clone() } else { format!("{}/{}", self.group, self.version) }
    }

    /// `v1/Kind` for the core group, `group/v1/Kind` otherwise.
    pub fn key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.kind)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Group/Version/Resource: the REST collection name used in URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvr {
    pub fn new(group: impl Into<String>, version: impl Into<String>, resource: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), resource: resource.into() }
    }

    pub fn key(&self) -> String {
        if self.group.is_empty() {
            format!("{}/{}", self.version, self.resource)
        } else {
            format!("{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Standard object metadata every listed object exposes.
///
/// The list pipeline and the default comparator/filter only ever go through
/// this trait, so typed and unstructured objects are handled alike.
pub trait MetaObject {
    fn meta(&self) -> &ObjectMeta;

    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or("")
    }

    fn uid(&self) -> &str {
        self.meta().uid.as_deref().unwrap_or("")
    }

    fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or("")
    }

    fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.meta().labels.as_ref()
    }

    fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.meta().annotations.as_ref()
    }

    fn owner_references(&self) -> &[OwnerReference] {
        self.meta().owner_references.as_deref().unwrap_or(&[])
    }

    fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.meta().creation_timestamp.as_ref().map(|t| t.0)
    }

    fn deletion_timestamp(&self) -> Option<DateTime<Utc>> {
        self.meta().deletion_timestamp.as_ref().map(|t| t.0)
    }
}

impl MetaObject for ObjectMeta {
    fn meta(&self) -> &ObjectMeta {
        self
    }
}

/// Output envelope of every list call.
///
/// `total_items` counts the filtered collection before pagination so callers
/// can compute page counts; `items` is the current page only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub total_items: usize,
    pub items: Vec<T>,
}

impl<T> ListResult<T> {
    pub fn empty() -> Self {
        Self { total_items: 0, items: Vec::new() }
    }
}

impl<T> Default for ListResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gvk_keys_for_core_and_named_groups() {
        let core = Gvk::new("", "v1", "Pod");
        assert_eq!(core.key(), "v1/Pod");

        let apps = Gvk::from_api_version("apps/v1", "Deployment");
        assert_eq!(apps.key(), "apps/v1/Deployment");
        assert_eq!(apps.api_version(), "apps/v1");
        assert_eq!(apps.to_string(), apps.key());
    }

    #[test]
    fn meta_accessors_default_to_empty() {
        let meta = ObjectMeta::default();
        assert_eq!(meta.name(), "");
        assert_eq!(meta.namespace(), "");
        assert!(meta.owner_references().is_empty());
        assert!(meta.creation_timestamp().is_none());
    }

    #[test]
    fn list_result_serializes_camel_case() {
        let r = ListResult { total_items: 3, items: vec!["a"] };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v, serde_json::json!({"totalItems": 3, "items": ["a"]}));
    }
}
