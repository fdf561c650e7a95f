//! Command-line surface for the `sitemap-sync` binary.

pub mod output;
pub mod publish_cmd;

use crate::config::{DEFAULT_PROBE_CONCURRENCY, DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_UPSTREAM_SITEMAP};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "sitemap-sync", version, about = "Publish a reconciled, link-checked sitemap.xml")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print the run summary as JSON on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "SITEMAP_SYNC_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build the sitemap and upload it to storage.
    Publish(PublishArgs),
    /// Build the sitemap and print it without uploading.
    Preview(PublishArgs),
}

#[derive(Debug, Clone, Args)]
pub struct PublishArgs {
    /// Deploy environment: dev or prod.
    #[arg(long = "env", env = "SITEMAP_SYNC_ENV")]
    pub deploy_env: String,

    /// Container URL including its SAS query string.
    #[arg(long, env = "SITEMAP_SYNC_CONTAINER_URL", hide_env_values = true)]
    pub container_url: Option<String>,

    /// Prefix the storage listing is restricted to.
    #[arg(long, env = "SITEMAP_SYNC_SOURCE_PREFIX", default_value = "")]
    pub source_prefix: String,

    /// Prefix the sitemap is written under.
    #[arg(long, env = "SITEMAP_SYNC_TARGET_PREFIX", default_value = "")]
    pub target_prefix: String,

    /// Upstream sitemap to merge.
    #[arg(long, env = "SITEMAP_SYNC_UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_SITEMAP)]
    pub upstream_url: String,

    /// Override the environment's canonical origin.
    #[arg(long, env = "SITEMAP_SYNC_SITE_ORIGIN")]
    pub site_origin: Option<String>,

    /// Maximum liveness probes in flight.
    #[arg(long, default_value_t = DEFAULT_PROBE_CONCURRENCY)]
    pub concurrency: usize,

    /// Per-probe timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT_MS)]
    pub probe_timeout_ms: u64,

    /// Publish without probing candidates.
    #[arg(long)]
    pub skip_liveness: bool,

    /// Render without uploading.
    #[arg(long)]
    pub dry_run: bool,

    /// Create the container or reset its access policy to public blob read.
    #[arg(long)]
    pub ensure_container: bool,

    /// Enable static website hosting before publishing.
    #[arg(long)]
    pub enable_static_website: bool,
}

/// Install the global tracing subscriber.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sitemap_sync=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
