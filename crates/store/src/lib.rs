//! ksq store: in-memory object cache.
//!
//! Objects are grouped per GVK. Writers apply batches of deltas through a
//! [`WorldBuilder`] and publish frozen snapshots with `ArcSwap`, so readers
//! never wait on a writer.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use ksq_core::{Gvk, MetaObject, Query};
use ksq_resources::{CacheError, ObjectCache, ResolvedResource, ResourceObject};
use rustc_hash::FxHashMap;
use tracing::debug;

mod crds;
mod load;

pub use crds::StaticCrds;
pub use load::{load_documents, load_file, parse_documents};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Applied,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct Delta {
    pub kind: DeltaKind,
    pub object: ResourceObject,
}

impl Delta {
    pub fn applied(object: impl Into<ResourceObject>) -> Self {
        Self { kind: DeltaKind::Applied, object: object.into() }
    }

    pub fn deleted(object: impl Into<ResourceObject>) -> Self {
        Self { kind: DeltaKind::Deleted, object: object.into() }
    }

    /// Identity within a kind: the uid, or `namespace/name` for objects that
    /// were never persisted.
    pub fn key(&self) -> String {
        object_key(&self.object)
    }
}

fn object_key(o: &ResourceObject) -> String {
    match o.uid() {
        "" => format!("{}/{}", o.namespace(), o.name()),
        uid => uid.to_string(),
    }
}

/// Immutable view of one kind at a given epoch, ordered by namespace then name.
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    pub epoch: u64,
    pub items: Vec<ResourceObject>,
}

/// Accumulates deltas for a single kind.
#[derive(Debug, Default)]
pub struct WorldBuilder {
    epoch: u64,
    items: FxHashMap<String, ResourceObject>,
}

impl WorldBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch; later deltas for the same key win. Bumps the epoch once.
    pub fn apply(&mut self, batch: Vec<Delta>) {
        for d in batch {
            let key = d.key();
            match d.kind {
                DeltaKind::Applied => {
                    self.items.insert(key, d.object);
                }
                DeltaKind::Deleted => {
                    self.items.remove(&key);
                }
            }
        }
        self.epoch = self.epoch.saturating_add(1);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn freeze(&self) -> Arc<WorldSnapshot> {
        let mut items: Vec<ResourceObject> = self.items.values().cloned().collect();
        items.sort_by(|a, b| (a.namespace(), a.name()).cmp(&(b.namespace(), b.name())));
        Arc::new(WorldSnapshot { epoch: self.epoch, items })
    }
}

type Worlds = FxHashMap<Gvk, Arc<WorldSnapshot>>;

/// [`ObjectCache`] over published in-memory snapshots.
pub struct MemoryCache {
    worlds: ArcSwap<Worlds>,
    builders: Mutex<FxHashMap<Gvk, WorldBuilder>>,
    epoch: AtomicU64,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            worlds: ArcSwap::from_pointee(Worlds::default()),
            builders: Mutex::new(FxHashMap::default()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Build a cache holding `objects`, grouped by their own GVK.
    pub fn from_objects(objects: impl IntoIterator<Item = ResourceObject>) -> Self {
        let cache = Self::new();
        cache.apply(objects.into_iter().map(Delta::applied).collect());
        cache
    }

    /// Apply deltas and publish one new snapshot per touched kind.
    pub fn apply(&self, batch: Vec<Delta>) {
        if batch.is_empty() {
            return;
        }
        let mut by_gvk: FxHashMap<Gvk, Vec<Delta>> = FxHashMap::default();
        for d in batch {
            by_gvk.entry(d.object.gvk()).or_default().push(d);
        }

        // Builders stay consistent per kind even if a writer panicked.
        let mut builders = self.builders.lock().unwrap_or_else(|e| e.into_inner());
        let mut next: Worlds = (**self.worlds.load()).clone();
        for (gvk, deltas) in by_gvk {
            let builder = builders.entry(gvk.clone()).or_default();
            builder.apply(deltas);
            let snap = builder.freeze();
            debug!(gvk = %gvk, epoch = snap.epoch, items = snap.items.len(), "publish snapshot");
            metrics::gauge!("store_objects", snap.items.len() as f64, "gvk" => gvk.key());
            next.insert(gvk, snap);
        }
        self.worlds.store(Arc::new(next));
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub fn snapshot(&self, gvk: &Gvk) -> Option<Arc<WorldSnapshot>> {
        self.worlds.load().get(gvk).cloned()
    }

    /// Kinds with a published snapshot, sorted by key.
    pub fn gvks(&self) -> Vec<Gvk> {
        let mut out: Vec<Gvk> = self.worlds.load().keys().cloned().collect();
        out.sort_by_key(|g| g.key());
        out
    }

    /// Number of published batches.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }
}

fn in_namespace(o: &ResourceObject, namespace: Option<&str>) -> bool {
    namespace.map_or(true, |ns| o.namespace() == ns)
}

#[async_trait]
impl ObjectCache for MemoryCache {
    async fn get(
        &self,
        target: &ResolvedResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ResourceObject, CacheError> {
        self.snapshot(&target.gvk)
            .and_then(|snap| snap.items.iter().find(|o| o.name() == name && in_namespace(o, namespace)).cloned())
            .ok_or_else(|| CacheError::not_found(target.gvk.kind.as_str(), name))
    }

    async fn list(
        &self,
        target: &ResolvedResource,
        namespace: Option<&str>,
        query: &Query,
    ) -> Result<Vec<ResourceObject>, CacheError> {
        let Some(snap) = self.snapshot(&target.gvk) else {
            return Ok(Vec::new());
        };
        let selector = query.label_selector.as_ref();
        Ok(snap
            .items
            .iter()
            .filter(|o| in_namespace(o, namespace))
            .filter(|o| selector.map_or(true, |s| s.matches(o.labels())))
            .cloned()
            .collect())
    }
}
