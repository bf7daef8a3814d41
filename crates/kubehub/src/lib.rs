//! ksq kubehub: the live cluster behind the object cache and CRD lookup.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use kube::discovery::{Discovery, Scope};
use kube::Client;
use ksq_core::{Gvk, Gvr};
use ksq_resources::Scheme;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

mod cache;
mod crd;

pub use cache::KubeCache;
pub use crd::{crd_info, KubeCrdLookup};

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared client built from the ambient kubeconfig or in-cluster config.
pub async fn kube_client() -> Result<Client> {
    if let Some(c) = CLIENT.get() {
        return Ok(c.clone());
    }
    let client = Client::try_default().await.context("building kube client")?;
    // Concurrent callers may race here; the first stored client is kept.
    let _ = CLIENT.set(client.clone());
    debug!("kube client ready");
    Ok(client)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredResource {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
    /// Handled through the typed scheme rather than as unstructured.
    pub typed: bool,
}

impl DiscoveredResource {
    pub fn gvk(&self) -> Gvk {
        Gvk::new(&self.group, &self.version, &self.kind)
    }

    pub fn gvr(&self) -> Gvr {
        Gvr::new(&self.group, &self.version, &self.plural)
    }
}

/// Discover served resources (incl. CRDs), sorted by group, version, kind.
pub async fn discover(client: Client, scheme: &Scheme) -> Result<Vec<DiscoveredResource>> {
    let discovery = Discovery::new(client).run().await.context("running discovery")?;
    let mut out = Vec::new();
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            let gvk = Gvk::new(&ar.group, &ar.version, &ar.kind);
            out.push(DiscoveredResource {
                typed: scheme.recognizes(&gvk).is_some(),
                group: ar.group,
                version: ar.version,
                kind: ar.kind,
                plural: ar.plural,
                namespaced: matches!(caps.scope, Scope::Namespaced),
            });
        }
    }
    out.sort_by(|a, b| a.group.cmp(&b.group).then(a.version.cmp(&b.version)).then(a.kind.cmp(&b.kind)));
    info!(resources = out.len(), "discovery complete");
    Ok(out)
}
