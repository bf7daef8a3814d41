use async_trait::async_trait;
use ksq_core::{Gvk, Gvr, MetaObject};
use ksq_resources::{CacheError, CrdInfo, CrdLookup, ResourceObject};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Fixed set of custom resource definitions, keyed by GVR.
#[derive(Debug, Clone, Default)]
pub struct StaticCrds {
    by_gvr: FxHashMap<Gvr, CrdInfo>,
}

impl StaticCrds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, gvr: Gvr, info: CrdInfo) {
        self.by_gvr.insert(gvr, info);
    }

    pub fn with(mut self, gvr: Gvr, info: CrdInfo) -> Self {
        self.insert(gvr, info);
        self
    }

    pub fn len(&self) -> usize {
        self.by_gvr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_gvr.is_empty()
    }

    /// Collect every `CustomResourceDefinition` among `objects`, one entry per
    /// served version. `served_label` set to `"true"` on the definition marks
    /// it as served through the aggregation layer.
    pub fn from_objects<'a>(objects: impl IntoIterator<Item = &'a ResourceObject>, served_label: &str) -> Self {
        let mut out = Self::new();
        for o in objects {
            let Some(crd) = o.unstructured_of_kind("CustomResourceDefinition") else { continue };
            let spec = crd.data.get("spec");
            let field = |key: &str| spec.and_then(|s| s.get(key)).and_then(|v| v.as_str()).unwrap_or("");
            let group = field("group");
            let namespaced = field("scope") == "Namespaced";
            let names = spec.and_then(|s| s.get("names"));
            let names_field = |key: &str| names.and_then(|n| n.get(key)).and_then(|v| v.as_str()).unwrap_or("");
            let (plural, kind) = (names_field("plural"), names_field("kind"));
            if group.is_empty() || plural.is_empty() || kind.is_empty() {
                debug!(crd = o.name(), "skipping incomplete definition");
                continue;
            }
            let served = o.labels().and_then(|l| l.get(served_label)).is_some_and(|v| v == "true");
            let versions = spec.and_then(|s| s.get("versions")).and_then(|v| v.as_array());
            for v in versions.into_iter().flatten() {
                let Some(version) = v.get("name").and_then(|n| n.as_str()) else { continue };
                if v.get("served").and_then(|s| s.as_bool()) == Some(false) {
                    continue;
                }
                out.insert(
                    Gvr::new(group, version, plural),
                    CrdInfo { gvk: Gvk::new(group, version, kind), namespaced, served },
                );
            }
        }
        out
    }
}

#[async_trait]
impl CrdLookup for StaticCrds {
    async fn find(&self, gvr: &Gvr) -> Result<Option<CrdInfo>, CacheError> {
        Ok(self.by_gvr.get(gvr).cloned())
    }
}
