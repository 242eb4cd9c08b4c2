use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fetchsync_core::{HttpRequest, ProviderConfig};
use fetchsync_kubehub::{get_kube_client, KubeProviderConfigs, KubeStore};
use fetchsync_reconcile::{Connector, ControllerSettings};
use fetchsync_request::SkippedEntry;
use kube::CustomResourceExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fetchsyncctl", version, about = "Sync HTTP responses into ConfigMaps")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HttpRequest controller
    Run(RunArgs),
    /// Print the HttpRequest and ProviderConfig CRDs as YAML
    Crd,
    /// Resolve and perform the request of a manifest without touching its sink
    Fetch {
        /// HttpRequest manifest (YAML)
        #[arg(short = 'f', long = "file")]
        file: PathBuf,
        /// Client timeout in seconds
        #[arg(long = "http-timeout-secs", env = "FETCHSYNC_HTTP_TIMEOUT_SECS", default_value_t = 30)]
        http_timeout_secs: u64,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Requeue delay once a sink is current
    #[arg(long = "poll-secs", env = "FETCHSYNC_POLL_SECS", default_value_t = 60)]
    poll_secs: u64,
    /// Requeue delay after a failed pass
    #[arg(long = "error-requeue-secs", env = "FETCHSYNC_ERROR_REQUEUE_SECS", default_value_t = 15)]
    error_requeue_secs: u64,
    /// Deadline for a single pass
    #[arg(long = "pass-timeout-secs", env = "FETCHSYNC_PASS_TIMEOUT_SECS", default_value_t = 60)]
    pass_timeout_secs: u64,
    /// Client timeout for outbound requests
    #[arg(long = "http-timeout-secs", env = "FETCHSYNC_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    http_timeout_secs: u64,
    /// ProviderConfig used by resources without providerConfigRef
    #[arg(long = "default-provider-config", env = "FETCHSYNC_PROVIDER_CONFIG", default_value = "default")]
    default_provider_config: String,
}

impl RunArgs {
    fn settings(&self) -> ControllerSettings {
        ControllerSettings {
            poll_interval: Duration::from_secs(self.poll_secs),
            error_requeue: Duration::from_secs(self.error_requeue_secs),
            pass_timeout: Duration::from_secs(self.pass_timeout_secs),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            default_provider_config: self.default_provider_config.clone(),
            ..ControllerSettings::default()
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchSummary<'a> {
    url: String,
    method: &'a str,
    status: &'static str,
    bytes: usize,
    content_type: &'static str,
    digest: String,
    skipped: &'a [SkippedEntry],
}

fn log_filter(raw: Option<&str>) -> EnvFilter {
    raw.and_then(|s| EnvFilter::try_new(s).ok()).unwrap_or_else(|| EnvFilter::new("info"))
}

fn init_tracing() {
    let raw = std::env::var("FETCHSYNC_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(raw.as_deref()))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn metrics_listen_addr(raw: Option<&str>) -> Result<Option<SocketAddr>> {
    raw.map(|a| a.parse::<SocketAddr>().with_context(|| format!("FETCHSYNC_METRICS_ADDR {:?} is not host:port", a)))
        .transpose()
}

/// Prometheus exporter, only when `FETCHSYNC_METRICS_ADDR` is set.
fn init_metrics() -> Result<()> {
    let raw = std::env::var("FETCHSYNC_METRICS_ADDR").ok();
    let Some(addr) = metrics_listen_addr(raw.as_deref())? else { return Ok(()) };
    PrometheusBuilder::new().with_http_listener(addr).install().context("installing Prometheus exporter")?;
    info!(%addr, "metrics exporter listening");
    Ok(())
}

fn crds_yaml() -> Result<String> {
    let hr = serde_yaml::to_string(&HttpRequest::crd())?;
    let pc = serde_yaml::to_string(&ProviderConfig::crd())?;
    Ok(format!("{}---\n{}", hr, pc))
}

fn read_manifest(file: &PathBuf) -> Result<HttpRequest> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing HttpRequest manifest {}", file.display()))
}

async fn fetch(file: PathBuf, http_timeout: Duration, output: Output) -> Result<()> {
    let mr = read_manifest(&file)?;
    let client = get_kube_client().await?;
    let connector = Connector::new(
        KubeStore::new(client.clone()),
        Arc::new(KubeProviderConfigs::new(client, http_timeout)),
        ControllerSettings::default().default_provider_config,
        http_timeout,
    );
    let external = connector.connect(&mr).await?;
    let cancel = CancellationToken::new();
    let fetched = external.fetch_remote(&mr.spec.for_provider, &cancel).await?;
    info!(url = %fetched.url, bytes = fetched.body.len(), skipped = fetched.skipped.len(), "fetched");

    match output {
        Output::Human => {
            for s in &fetched.skipped {
                eprintln!("skipped {} {:?}: {}", s.section.as_str(), s.name, s.reason);
            }
            println!("{}", String::from_utf8_lossy(&fetched.body));
        }
        Output::Json => {
            let summary = FetchSummary {
                url: fetched.url.to_string(),
                method: &fetched.method,
                status: "2xx",
                bytes: fetched.body.len(),
                content_type: fetched.content_type(),
                digest: fetched.digest().to_string(),
                skipped: &fetched.skipped,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            init_metrics()?;
            let client = get_kube_client().await?;
            fetchsync_reconcile::run(client, args.settings()).await?;
        }
        Commands::Crd => print!("{}", crds_yaml()?),
        Commands::Fetch { file, http_timeout_secs } => {
            fetch(file, Duration::from_secs(http_timeout_secs), cli.output).await?;
        }
    }
    Ok(())
}
