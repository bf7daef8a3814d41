use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use ksq_api::{ApiError, Config, ResourceGetter};
use ksq_core::{Gvr, ListResult, MetaObject};
use ksq_resources::{ListRegistry, ResourceObject, Scheme, TypedKind};
use ksq_store::{load_file, MemoryCache, StaticCrds};
use tracing::{error, info};

const DEFAULT_VERSION: &str = "v1";

#[derive(Parser, Debug)]
#[command(name = "ksqctl", version, about = "Query Kubernetes resources with filters, sorting and paging")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: all namespaces)
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    /// Serve from a YAML/JSON dump instead of the live cluster
    #[arg(long = "file", global = true, env = "KSQ_FILE")]
    file: Option<PathBuf>,

    /// Label key carrying an object's workspace
    #[arg(long = "workspace-label", global = true, env = "KSQ_WORKSPACE_LABEL")]
    workspace_label: Option<String>,

    /// CRD label key marking a custom resource as served
    #[arg(long = "served-label", global = true, env = "KSQ_SERVED_LABEL")]
    served_label: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
    Yaml,
}

#[derive(Args, Debug, Clone)]
struct Target {
    /// Plural resource name, optionally qualified: "deployments" or "widgets.example.io"
    resource: String,
    /// API group (overrides the qualified form)
    #[arg(long = "group")]
    group: Option<String>,
    /// API version (default: the built-in kind's version, else v1)
    #[arg(long = "version")]
    version: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover served resources (incl. CRDs)
    Discover,
    /// List a resource; trailing key=value pairs are query parameters
    List {
        #[command(flatten)]
        target: Target,
        /// Restrict to objects of this workspace, across namespaces
        #[arg(long = "workspace")]
        workspace: Option<String>,
        /// Reject unknown or malformed query parameters
        #[arg(long = "strict", action = ArgAction::SetTrue)]
        strict: bool,
        /// Query parameters, e.g. name=foo sortBy=name ascending=true limit=10 page=1
        params: Vec<String>,
    },
    /// Get one object by name
    Get {
        #[command(flatten)]
        target: Target,
        name: String,
    },
}

fn init_tracing() {
    let env = std::env::var("KSQ_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics(config: &Config) {
    if let Some(addr) = config.metrics_addr.as_deref() {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid KSQ_METRICS_ADDR; expected host:port");
        }
    }
}

/// Turn a resource argument into a GVR. Built-in kinds fill in their own
/// group and version when none is given.
fn resolve_gvr(target: &Target) -> Gvr {
    let (resource, group) = match (target.group.as_deref(), target.resource.split_once('.')) {
        (Some(g), _) => (target.resource.as_str(), Some(g)),
        (None, Some((r, g))) => (r, Some(g)),
        (None, None) => (target.resource.as_str(), None),
    };
    let resource = resource.to_ascii_lowercase();
    let builtin = TypedKind::ALL
        .iter()
        .map(|k| k.gvr())
        .find(|gvr| gvr.resource == resource && group.map_or(true, |g| gvr.group == g));
    let group = group.map(str::to_string).or_else(|| builtin.as_ref().map(|b| b.group.clone())).unwrap_or_default();
    let version = target
        .version
        .clone()
        .or_else(|| builtin.map(|b| b.version))
        .unwrap_or_else(|| DEFAULT_VERSION.to_string());
    Gvr::new(group, version, resource)
}

fn parse_params(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|p| match p.split_once('=') {
            Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
            _ => bail!("query parameter {p:?} must look like key=value"),
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum ListScope<'a> {
    Namespace(Option<&'a str>),
    Workspace(&'a str),
}

/// A workspace already spans namespaces, so it cannot be combined with `--ns`.
fn list_scope<'a>(ns: Option<&'a str>, workspace: Option<&'a str>) -> Result<ListScope<'a>> {
    match (ns, workspace) {
        (Some(ns), Some(ws)) => bail!("--ns {ns} cannot be combined with --workspace {ws}"),
        (_, Some(ws)) => Ok(ListScope::Workspace(ws)),
        (ns, None) => Ok(ListScope::Namespace(ns)),
    }
}

fn render_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else { return "-".to_string() };
    let mut secs = (now - created).num_seconds().max(0) as u64;
    let days = secs / 86_400; secs %= 86_400;
    let hours = secs / 3600; secs %= 3600;
    let mins = secs / 60; secs %= 60;
    if days > 0 { format!("{}d{}h", days, hours) }
    else if hours > 0 { format!("{}h{}m", hours, mins) }
    else if mins > 0 { format!("{}m", mins) }
    else { format!("{}s", secs) }
}

fn render_table(result: &ListResult<ResourceObject>, now: DateTime<Utc>) -> String {
    let mut out = String::from("NAMESPACE   NAME                 AGE\n");
    for item in &result.items {
        let ns = if item.namespace().is_empty() { "-" } else { item.namespace() };
        out.push_str(&format!("{:<11} {:<20} {}\n", ns, item.name(), render_age(item.creation_timestamp(), now)));
    }
    out.push_str(&format!("({} of {} items)\n", result.items.len(), result.total_items));
    out
}

fn print_value<T: serde::Serialize>(output: Output, value: &T) -> Result<()> {
    match output {
        Output::Yaml => print!("{}", serde_yaml::to_string(value)?),
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn api_failure(op: &str, e: ApiError) -> anyhow::Error {
    error!(status = e.status_code(), error = %e, "{op} failed");
    anyhow!("{op}: {e} (status {})", e.status_code())
}

/// Getter over a loaded dump; CRDs in the dump decide which custom resources are served.
fn offline_getter(path: &Path, config: Config) -> Result<(ResourceGetter, Arc<MemoryCache>)> {
    let scheme = Arc::new(Scheme::with_builtins());
    let objects = load_file(&scheme, path)?;
    let crds = StaticCrds::from_objects(objects.iter(), &config.served_label);
    info!(path = %path.display(), objects = objects.len(), crds = crds.len(), "loaded dump");
    let cache = Arc::new(MemoryCache::from_objects(objects));
    let getter = ResourceGetter::new(
        scheme,
        Arc::new(ListRegistry::with_builtin_overrides()),
        cache.clone(),
        Arc::new(crds),
        config,
    );
    Ok((getter, cache))
}

async fn cluster_getter(config: Config) -> Result<ResourceGetter> {
    let client = ksq_kubehub::kube_client().await?;
    let crds = ksq_kubehub::KubeCrdLookup::new(client.clone(), config.served_label.clone());
    Ok(ResourceGetter::new(
        Arc::new(Scheme::with_builtins()),
        Arc::new(ListRegistry::with_builtin_overrides()),
        Arc::new(ksq_kubehub::KubeCache::new(client)),
        Arc::new(crds),
        config,
    ))
}

async fn build_getter(file: Option<&Path>, config: Config) -> Result<ResourceGetter> {
    match file {
        Some(path) => Ok(offline_getter(path, config)?.0),
        None => cluster_getter(config).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(label) = cli.workspace_label.clone().filter(|l| !l.trim().is_empty()) {
        config.workspace_label = label;
    }
    if let Some(label) = cli.served_label.clone().filter(|l| !l.trim().is_empty()) {
        config.served_label = label;
    }
    init_metrics(&config);
    let ns = cli.namespace.as_deref();

    match cli.command {
        Commands::Discover => {
            info!(offline = cli.file.is_some(), "discover invoked");
            if let Some(path) = cli.file.as_deref() {
                let (_, cache) = offline_getter(path, config)?;
                for gvk in cache.gvks() {
                    println!("{}", gvk.key());
                }
                return Ok(());
            }
            let client = ksq_kubehub::kube_client().await?;
            let resources = ksq_kubehub::discover(client, &Scheme::with_builtins()).await?;
            match cli.output {
                Output::Human => {
                    for r in resources {
                        let scope = if r.namespaced { "namespaced" } else { "cluster" };
                        let access = if r.typed { "typed" } else { "unstructured" };
                        println!("{} • {} • {} • {}", r.gvr(), r.kind, scope, access);
                    }
                }
                other => print_value(other, &resources)?,
            }
        }
        Commands::List { target, workspace, strict, params } => {
            let gvr = resolve_gvr(&target);
            let params = parse_params(&params)?;
            let scope = list_scope(ns, workspace.as_deref())?;
            info!(gvr = %gvr, ns = ?ns, workspace = ?workspace, "list invoked");
            let getter = build_getter(cli.file.as_deref(), config).await?;
            let query = getter.parse_query(params, strict).map_err(|e| api_failure("list", e))?;
            let result = match scope {
                ListScope::Workspace(ws) => getter.list_in_workspace(&gvr, ws, &query).await,
                ListScope::Namespace(ns) => getter.list(&gvr, ns, &query).await,
            }
            .map_err(|e| api_failure("list", e))?;
            match cli.output {
                Output::Human => print!("{}", render_table(&result, Utc::now())),
                other => print_value(other, &result)?,
            }
        }
        Commands::Get { target, name } => {
            let gvr = resolve_gvr(&target);
            info!(gvr = %gvr, ns = ?ns, obj = %name, "get invoked");
            let getter = build_getter(cli.file.as_deref(), config).await?;
            let obj = getter.get(&gvr, ns, &name).await.map_err(|e| api_failure("get", e))?;
            match cli.output {
                Output::Yaml => print_value(Output::Yaml, &obj)?,
                _ => print_value(Output::Json, &obj)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn target(resource: &str, group: Option<&str>, version: Option<&str>) -> Target {
        Target { resource: resource.into(), group: group.map(Into::into), version: version.map(Into::into) }
    }

    #[test]
    fn builtin_resources_fill_group_and_version() {
        assert_eq!(resolve_gvr(&target("deployments", None, None)), Gvr::new("apps", "v1", "deployments"));
        assert_eq!(resolve_gvr(&target("Pods", None, None)), Gvr::new("", "v1", "pods"));
        assert_eq!(resolve_gvr(&target("jobs.batch", None, None)), Gvr::new("batch", "v1", "jobs"));
    }

    #[test]
    fn custom_resources_default_to_v1() {
        assert_eq!(resolve_gvr(&target("widgets.example.io", None, None)), Gvr::new("example.io", "v1", "widgets"));
        assert_eq!(
            resolve_gvr(&target("widgets", Some("example.io"), Some("v1beta1"))),
            Gvr::new("example.io", "v1beta1", "widgets")
        );
        assert_eq!(resolve_gvr(&target("gizmos", None, None)), Gvr::new("", "v1", "gizmos"));
    }

    #[test]
    fn params_split_on_first_equals() {
        let raw = vec!["name=foo".to_string(), "label=app=web".to_string(), "ascending=".to_string()];
        let parsed = parse_params(&raw).unwrap();
        assert_eq!(parsed[1], ("label".to_string(), "app=web".to_string()));
        assert_eq!(parsed[2], ("ascending".to_string(), String::new()));
        assert!(parse_params(&["oops".to_string()]).is_err());
        assert!(parse_params(&["=x".to_string()]).is_err());
    }

    #[test]
    fn workspace_and_namespace_are_exclusive() {
        assert_eq!(list_scope(None, Some("ws1")).unwrap(), ListScope::Workspace("ws1"));
        assert_eq!(list_scope(Some("bar"), None).unwrap(), ListScope::Namespace(Some("bar")));
        assert_eq!(list_scope(None, None).unwrap(), ListScope::Namespace(None));
        let err = list_scope(Some("bar"), Some("ws1")).unwrap_err();
        assert!(err.to_string().contains("--workspace"));
    }

    #[test]
    fn ages_render_coarsely() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();
        assert_eq!(render_age(None, now), "-");
        assert_eq!(render_age(Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()), now), "1d3h");
        assert_eq!(render_age(Some(Utc.with_ymd_and_hms(2024, 1, 2, 2, 30, 0).unwrap()), now), "30m");
        assert_eq!(render_age(Some(now + chrono::Duration::seconds(5)), now), "0s");
    }

    #[test]
    fn table_reports_page_and_total() {
        let scheme = Scheme::with_builtins();
        let objects = ksq_store::load_documents(
            &scheme,
            "apiVersion: v1\nkind: Node\nmetadata: {name: node-a}\n",
        )
        .unwrap();
        let result = ListResult { total_items: 3, items: objects };
        let table = render_table(&result, Utc::now());
        assert!(table.contains("-           node-a"));
        assert!(table.ends_with("(1 of 3 items)\n"));
    }
}
