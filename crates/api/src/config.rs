pub const DEFAULT_WORKSPACE_LABEL: &str = "kubesphere.io/workspace";
pub const DEFAULT_SERVED_LABEL: &str = "kubesphere.io/resource-served";

/// Runtime settings, read from `KSQ_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Label carrying an object's workspace.
    pub workspace_label: String,
    /// CRD label that marks a custom resource as served (value `"true"`).
    pub served_label: String,
    /// Prometheus listen address; metrics are off when unset.
    pub metrics_addr: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_label: DEFAULT_WORKSPACE_LABEL.to_string(),
            served_label: DEFAULT_SERVED_LABEL.to_string(),
            metrics_addr: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Empty values count as unset.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        let d = Self::default();
        Self {
            workspace_label: get("KSQ_WORKSPACE_LABEL").unwrap_or(d.workspace_label),
            served_label: get("KSQ_SERVED_LABEL").unwrap_or(d.served_label),
            metrics_addr: get("KSQ_METRICS_ADDR"),
        }
    }
}
