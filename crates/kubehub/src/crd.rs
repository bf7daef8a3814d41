use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::Api;
use kube::Client;
use ksq_core::{Gvk, Gvr};
use ksq_resources::{CacheError, CrdInfo, CrdLookup};
use tracing::debug;

/// [`CrdLookup`] against `apiextensions.k8s.io/v1`.
#[derive(Clone)]
pub struct KubeCrdLookup {
    client: Client,
    served_label: String,
}

impl KubeCrdLookup {
    pub fn new(client: Client, served_label: impl Into<String>) -> Self {
        Self { client, served_label: served_label.into() }
    }
}

/// Describe `gvr` from its definition. `None` when the definition does not
/// serve that version.
pub fn crd_info(crd: &CustomResourceDefinition, gvr: &Gvr, served_label: &str) -> Option<CrdInfo> {
    crd.spec.versions.iter().find(|v| v.name == gvr.version && v.served)?;
    let served = crd
        .metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(served_label))
        .is_some_and(|v| v == "true");
    Some(CrdInfo {
        gvk: Gvk::new(&crd.spec.group, &gvr.version, &crd.spec.names.kind),
        namespaced: crd.spec.scope == "Namespaced",
        served,
    })
}

#[async_trait]
impl CrdLookup for KubeCrdLookup {
    async fn find(&self, gvr: &Gvr) -> Result<Option<CrdInfo>, CacheError> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let name = format!("{}.{}", gvr.resource, gvr.group);
        let crd = api
            .get_opt(&name)
            .await
            .map_err(|e| CacheError::Upstream(anyhow::Error::new(e).context(format!("get crd {name}"))))?;
        debug!(crd = %name, found = crd.is_some(), "crd lookup");
        Ok(crd.and_then(|c| crd_info(&c, gvr, &self.served_label)))
    }
}
