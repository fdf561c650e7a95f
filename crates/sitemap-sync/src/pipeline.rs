//! End-to-end run: fetch + scan, liveness filter, render, publish.

use crate::acquisition::http_client::HttpClient;
use crate::acquisition::liveness::{filter_live, LivenessStats};
use crate::acquisition::sitemap_fetch::fetch_external_sitemap;
use crate::cartography::exclusions::{ExcludedSiteSet, ExclusionSet};
use crate::cartography::inventory::{InventoryScanner, ScanStats};
use crate::cartography::sitemap::{render_sitemap, sitemap_object_path, SITEMAP_CONTENT_TYPE};
use crate::config::SyncConfig;
use crate::errors::{Result, SyncError};
use crate::record::PageRecord;
use crate::storage::{BlobListing, BlobStore, PublicAccess};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

/// Index document served by static website hosting.
pub const INDEX_DOCUMENT: &str = "index.html";

/// Error document served by static website hosting.
pub const ERROR_DOCUMENT: &str = "404/index.html";

/// Outcome of a render-and-publish step.
#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub object_path: String,
    pub records: usize,
    pub bytes: usize,
    /// False for dry runs.
    pub uploaded: bool,
}

/// Summary of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub env: String,
    pub external_count: usize,
    pub inventory_count: usize,
    pub dropped_dead: usize,
    pub dropped_unreachable: usize,
    pub duplicate_locs: usize,
    #[serde(flatten)]
    pub publish: PublishResult,
}

/// Render `records` and write them to `{target_prefix}/sitemap.xml`.
///
/// The upload replaces any existing object. With `dry_run` nothing is
/// written. Returns the rendered document alongside the result.
pub async fn render_and_publish(
    store: &dyn BlobStore,
    records: &[PageRecord],
    target_prefix: &str,
    dry_run: bool,
) -> Result<(PublishResult, String)> {
    let xml = render_sitemap(records)?;
    let object_path = sitemap_object_path(target_prefix);

    if !dry_run {
        store
            .upload(&object_path, xml.clone().into_bytes(), SITEMAP_CONTENT_TYPE)
            .await
            .map_err(|e| SyncError::Publish {
                path: object_path.clone(),
                reason: e.to_string(),
            })?;
        info!(path = %object_path, records = records.len(), bytes = xml.len(), "sitemap published");
    }

    let result = PublishResult {
        object_path,
        records: records.len(),
        bytes: xml.len(),
        uploaded: !dry_run,
    };
    Ok((result, xml))
}

/// Create the container with `access`, or reset the policy of an existing one.
pub async fn prepare_container(store: &dyn BlobStore, access: PublicAccess) -> Result<()> {
    if store.container_exists().await? {
        info!(?access, "setting container access policy");
        store.set_access_policy(access).await
    } else {
        info!(?access, "creating container");
        store.create_container(access).await
    }
}

/// Enable static website hosting with the site's index and error documents.
pub async fn enable_static_website(store: &dyn BlobStore) -> Result<()> {
    info!(index = INDEX_DOCUMENT, error = ERROR_DOCUMENT, "enabling static website");
    store
        .enable_static_website(INDEX_DOCUMENT, ERROR_DOCUMENT)
        .await
}

/// Number of `loc` values that appear more than once.
pub fn count_duplicate_locs(records: &[PageRecord]) -> usize {
    let mut seen = HashSet::new();
    records.iter().filter(|r| !seen.insert(r.loc.as_str())).count()
}

/// Wires the stages together for one run.
pub struct SyncPipeline<'a> {
    config: SyncConfig,
    client: HttpClient,
    store: &'a dyn BlobStore,
    exclusions: ExclusionSet,
    excluded_sites: ExcludedSiteSet,
}

impl<'a> SyncPipeline<'a> {
    /// Pipeline with the compiled-in exclusion tables for `config.env`.
    pub fn new(config: SyncConfig, store: &'a dyn BlobStore) -> Result<Self> {
        let exclusions = ExclusionSet::external(config.env)?;
        Self::with_rules(config, store, exclusions, ExcludedSiteSet::builtin())
    }

    pub fn with_rules(
        config: SyncConfig,
        store: &'a dyn BlobStore,
        exclusions: ExclusionSet,
        excluded_sites: ExcludedSiteSet,
    ) -> Result<Self> {
        config.validate()?;
        let client = HttpClient::new(config.probe_timeout)?;
        Ok(Self {
            config,
            client,
            store,
            exclusions,
            excluded_sites,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Fetch the upstream sitemap and scan storage concurrently.
    ///
    /// External records come first, then inventory records.
    pub async fn collect_candidates(&self) -> Result<(Vec<PageRecord>, Vec<PageRecord>, ScanStats)> {
        let scanner = InventoryScanner::new(
            self.config.site_origin.clone(),
            self.excluded_sites.clone(),
        )
        .with_source_prefix(&self.config.source_prefix);
        let mut listing = BlobListing::new(self.store, scanner.listing_prefix());

        let fetch = fetch_external_sitemap(
            &self.client,
            &self.config.upstream_url,
            &self.config.site_origin,
            &self.exclusions,
        );
        let scan = scanner.scan(&mut listing);

        let (external, (inventory, stats)) = tokio::try_join!(fetch, scan)?;
        Ok((external, inventory, stats))
    }

    /// Run every stage and publish unless `dry_run`.
    pub async fn run(&self, dry_run: bool) -> Result<(RunSummary, String)> {
        info!(env = %self.config.env, origin = self.config.site_origin.as_str(), "starting sitemap sync");

        let (external, inventory, _) = self.collect_candidates().await?;
        let external_count = external.len();
        let inventory_count = inventory.len();

        let mut candidates = external;
        candidates.extend(inventory);

        let (records, liveness) = if self.config.skip_liveness {
            let stats = LivenessStats {
                probed: 0,
                live: candidates.len(),
                ..Default::default()
            };
            (candidates, stats)
        } else {
            filter_live(candidates, &self.client, self.config.probe_concurrency).await
        };

        let duplicate_locs = count_duplicate_locs(&records);
        if duplicate_locs > 0 {
            info!(duplicate_locs, "sitemap contains repeated locations");
        }

        let (publish, xml) =
            render_and_publish(self.store, &records, &self.config.target_prefix, dry_run).await?;

        let summary = RunSummary {
            env: self.config.env.to_string(),
            external_count,
            inventory_count,
            dropped_dead: liveness.dead,
            dropped_unreachable: liveness.unreachable,
            duplicate_locs,
            publish,
        };
        Ok((summary, xml))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;

    fn rec(loc: &str) -> PageRecord {
        PageRecord::new(loc, Some("2024-01-01".into()))
    }

    #[tokio::test]
    async fn test_publish_writes_xml_at_prefix() {
        let store = MemoryBlobStore::new();
        let (result, xml) = render_and_publish(&store, &[rec("https://site.example/a")], "/blog/", false)
            .await
            .unwrap();
        assert_eq!(result.object_path, "blog/sitemap.xml");
        assert!(result.uploaded);
        let blob = store.get("blog/sitemap.xml").unwrap();
        assert_eq!(blob.content_type, "application/xml");
        assert_eq!(blob.body, xml.into_bytes());
    }

    #[tokio::test]
    async fn test_publish_twice_is_byte_identical() {
        let store = MemoryBlobStore::new();
        let records = vec![rec("https://site.example/a"), rec("https://site.example/b")];
        render_and_publish(&store, &records, "", false).await.unwrap();
        let first = store.get("sitemap.xml").unwrap().body;
        render_and_publish(&store, &records, "/", false).await.unwrap();
        let second = store.get("sitemap.xml").unwrap().body;
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.upload_count(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = MemoryBlobStore::new();
        let (result, _) = render_and_publish(&store, &[rec("https://site.example/a")], "", true)
            .await
            .unwrap();
        assert!(!result.uploaded);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_is_publish_error() {
        let store = MemoryBlobStore::new();
        store.fail_uploads(true);
        let err = render_and_publish(&store, &[rec("https://site.example/a")], "", false)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Publish { ref path, .. } if path == "sitemap.xml"));
    }

    #[tokio::test]
    async fn test_prepare_container_creates_then_updates() {
        let store = MemoryBlobStore::new();
        prepare_container(&store, PublicAccess::Blob).await.unwrap();
        assert_eq!(store.access(), Some(PublicAccess::Blob));
        prepare_container(&store, PublicAccess::Container).await.unwrap();
        assert_eq!(store.access(), Some(PublicAccess::Container));
    }

    #[tokio::test]
    async fn test_enable_static_website_documents() {
        let store = MemoryBlobStore::new();
        enable_static_website(&store).await.unwrap();
        assert_eq!(
            store.static_website(),
            Some(("index.html".to_string(), "404/index.html".to_string()))
        );
    }

    #[test]
    fn test_duplicates_counted_not_removed() {
        let records = vec![
            rec("https://site.example/a"),
            rec("https://site.example/b"),
            rec("https://site.example/a"),
        ];
        assert_eq!(count_duplicate_locs(&records), 1);
        assert_eq!(records.len(), 3);
    }
}
