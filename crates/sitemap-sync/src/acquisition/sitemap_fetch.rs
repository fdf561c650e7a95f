//! Fetch the edge site's sitemap and map it onto the canonical origin.

use crate::acquisition::http_client::HttpClient;
use crate::cartography::exclusions::ExclusionSet;
use crate::cartography::sitemap::{parse_urlset, SitemapEntry};
use crate::config::SiteOrigin;
use crate::errors::{Result, SyncError};
use crate::record::PageRecord;
use tracing::{debug, info, warn};
use url::Url;

const FETCH_TIMEOUT_MS: u64 = 30_000;

/// Download and filter the upstream sitemap.
///
/// Transport failures, non-success statuses and documents without `url`
/// entries end the run. Individual malformed URLs are logged and dropped.
pub async fn fetch_external_sitemap(
    client: &HttpClient,
    source_url: &Url,
    origin: &SiteOrigin,
    exclusions: &ExclusionSet,
) -> Result<Vec<PageRecord>> {
    info!(url = %source_url, "fetching upstream sitemap");
    let resp = client.get(source_url.as_str(), FETCH_TIMEOUT_MS).await?;
    if !(200..300).contains(&resp.status) {
        return Err(SyncError::Fetch {
            url: source_url.to_string(),
            reason: format!("status {}", resp.status),
        });
    }

    let entries = parse_urlset(&resp.body)?;
    let total = entries.len();
    let records = map_entries(entries, origin, exclusions);
    info!(
        upstream = total,
        kept = records.len(),
        "upstream sitemap filtered"
    );
    Ok(records)
}

/// Apply exclusions and rewrite surviving entries onto `origin`.
pub fn map_entries(
    entries: Vec<SitemapEntry>,
    origin: &SiteOrigin,
    exclusions: &ExclusionSet,
) -> Vec<PageRecord> {
    entries
        .into_iter()
        .filter_map(|entry| match map_entry(entry, origin, exclusions) {
            Ok(record) => record,
            Err(e) => {
                warn!("dropping upstream entry: {e}");
                None
            }
        })
        .collect()
}

fn map_entry(
    entry: SitemapEntry,
    origin: &SiteOrigin,
    exclusions: &ExclusionSet,
) -> Result<Option<PageRecord>> {
    let url = Url::parse(&entry.loc).map_err(|e| SyncError::MalformedRecord {
        url: entry.loc.clone(),
        reason: e.to_string(),
    })?;
    if !exclusions.should_include(&entry.loc)? {
        let pattern = exclusions.matching(url.path()).map(|p| p.as_str());
        debug!(url = %entry.loc, ?pattern, "excluded");
        return Ok(None);
    }
    Ok(Some(PageRecord::new(origin.rewrite(&url)?, entry.lastmod)))
}
