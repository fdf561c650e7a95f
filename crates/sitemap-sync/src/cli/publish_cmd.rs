//! `sitemap-sync publish` / `sitemap-sync preview`.

use crate::cli::output::{self, Styled};
use crate::cli::PublishArgs;
use crate::config::{DeployEnv, SyncConfig};
use crate::errors::SyncError;
use crate::pipeline::{self, RunSummary, SyncPipeline};
use crate::storage::{AzureBlobStore, BlobStore, MemoryBlobStore, PublicAccess};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::warn;

/// Build a run configuration from CLI arguments.
///
/// Fails on an unknown environment before anything touches the network.
pub fn build_config(args: &PublishArgs) -> Result<SyncConfig, SyncError> {
    let env: DeployEnv = args.deploy_env.parse()?;
    let mut config = SyncConfig::for_env(env)?
        .with_upstream(&args.upstream_url)?
        .with_source_prefix(&args.source_prefix)
        .with_target_prefix(&args.target_prefix);
    if let Some(origin) = &args.site_origin {
        config = config.with_site_origin(origin)?;
    }
    config.probe_concurrency = args.concurrency;
    config.probe_timeout = Duration::from_millis(args.probe_timeout_ms);
    config.skip_liveness = args.skip_liveness;
    config.validate()?;
    Ok(config)
}

/// Run the pipeline. `preview` implies a dry run and prints the XML.
pub async fn run(args: PublishArgs, preview: bool) -> Result<()> {
    let start = Instant::now();
    let config = build_config(&args)?;
    let dry_run = preview || args.dry_run;

    let store = open_store(args.container_url.as_deref(), preview)?;

    if args.enable_static_website && !dry_run {
        pipeline::enable_static_website(store.as_ref())
            .await
            .context("enabling static website hosting")?;
    }
    if args.ensure_container && !dry_run {
        pipeline::prepare_container(store.as_ref(), PublicAccess::Blob)
            .await
            .context("preparing container")?;
    }

    let sync = SyncPipeline::new(config, store.as_ref())?;
    let (summary, xml) = sync.run(dry_run).await.context("sitemap sync failed")?;

    if preview {
        print!("{xml}");
    }
    if output::is_json() {
        output::print_json(&serde_json::to_value(&summary)?);
    } else if !output::is_quiet() {
        print_summary(&Styled::new(), &summary, start.elapsed());
    }
    Ok(())
}

/// Pick the storage backend. A preview without a container URL runs against
/// an empty in-memory store, so the output carries no storage pages.
fn open_store(
    container_url: Option<&str>,
    preview: bool,
) -> Result<Box<dyn BlobStore>, SyncError> {
    match container_url {
        Some(url) => Ok(Box::new(AzureBlobStore::from_container_url(url)?)),
        None if preview => {
            warn!(
                "no container url; storage inventory skipped, preview lists upstream pages only"
            );
            Ok(Box::new(MemoryBlobStore::new()))
        }
        None => Err(SyncError::Configuration(
            "--container-url (or SITEMAP_SYNC_CONTAINER_URL) is required".into(),
        )),
    }
}

fn print_summary(s: &Styled, summary: &RunSummary, elapsed: Duration) {
    output::print_header(s);
    output::print_check(s.ok_sym(), "Environment", &summary.env);
    output::print_check(
        s.ok_sym(),
        "Upstream",
        &format!("{} pages", summary.external_count),
    );
    output::print_check(
        s.ok_sym(),
        "Storage",
        &format!("{} pages", summary.inventory_count),
    );

    let dropped = summary.dropped_dead + summary.dropped_unreachable;
    let sym = if dropped > 0 { s.warn_sym() } else { s.ok_sym() };
    output::print_check(
        sym,
        "Liveness",
        &format!(
            "{} dead, {} unreachable",
            summary.dropped_dead, summary.dropped_unreachable
        ),
    );
    if summary.duplicate_locs > 0 {
        output::print_check(
            s.warn_sym(),
            "Duplicates",
            &format!("{} repeated locations", summary.duplicate_locs),
        );
    }

    let target = if summary.publish.uploaded {
        s.green(&summary.publish.object_path)
    } else {
        s.dim(&format!("{} (dry run)", summary.publish.object_path))
    };
    output::print_check(
        s.ok_sym(),
        "Sitemap",
        &format!(
            "{target}  {} urls, {}",
            summary.publish.records,
            output::format_size(summary.publish.bytes as u64)
        ),
    );
    eprintln!();
    eprintln!("  Done in {:.1}s", elapsed.as_secs_f64());
}
