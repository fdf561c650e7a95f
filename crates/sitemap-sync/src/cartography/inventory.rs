//! Derive page records from a blob-storage listing.
//!
//! Only directory-index objects (`.../index.html`) are pages. The route is the
//! object name with that suffix removed, relative to the listing prefix.

use crate::cartography::exclusions::ExcludedSiteSet;
use crate::config::SiteOrigin;
use crate::errors::Result;
use crate::record::{BlobDescriptor, PageRecord};
use crate::storage::BlobListing;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

const INDEX_SUFFIX: &str = "index.html";
const ERROR_PAGE_SUFFIX: &str = "404/";

/// Nine or more consecutive digits: timestamp-named temp folders.
fn temp_segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]{9,}").expect("temp segment regex is valid"))
}

/// Why a listed object did not become a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotIndex,
    ErrorPage,
    ExcludedSite,
    TempFolder,
}

/// Counters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub listed: usize,
    pub emitted: usize,
    pub not_index: usize,
    pub error_pages: usize,
    pub excluded_sites: usize,
    pub temp_folders: usize,
}

impl ScanStats {
    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::NotIndex => self.not_index += 1,
            SkipReason::ErrorPage => self.error_pages += 1,
            SkipReason::ExcludedSite => self.excluded_sites += 1,
            SkipReason::TempFolder => self.temp_folders += 1,
        }
    }
}

/// Turns storage objects into page records.
pub struct InventoryScanner {
    origin: SiteOrigin,
    excluded_sites: ExcludedSiteSet,
    /// Normalized listing prefix stripped from object names.
    source_prefix: String,
}

impl InventoryScanner {
    pub fn new(origin: SiteOrigin, excluded_sites: ExcludedSiteSet) -> Self {
        Self {
            origin,
            excluded_sites,
            source_prefix: String::new(),
        }
    }

    pub fn with_source_prefix(mut self, prefix: &str) -> Self {
        self.source_prefix = crate::config::normalize_prefix(prefix);
        self
    }

    /// Prefix to list under, with a trailing slash when non-empty.
    pub fn listing_prefix(&self) -> String {
        if self.source_prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.source_prefix)
        }
    }

    /// Route for an object name, or the reason it is skipped.
    pub fn route_for(&self, name: &str) -> std::result::Result<String, SkipReason> {
        let listing_prefix = self.listing_prefix();
        let relative = name.strip_prefix(listing_prefix.as_str()).unwrap_or(name);

        let route = relative
            .strip_suffix(INDEX_SUFFIX)
            .ok_or(SkipReason::NotIndex)?;
        if route.ends_with(ERROR_PAGE_SUFFIX) {
            return Err(SkipReason::ErrorPage);
        }
        if self.excluded_sites.contains_route(route) {
            return Err(SkipReason::ExcludedSite);
        }
        if has_temp_segment(route) {
            return Err(SkipReason::TempFolder);
        }
        Ok(route.to_string())
    }

    /// Record for one descriptor, if it is a publishable page.
    pub fn record_for(&self, blob: &BlobDescriptor) -> std::result::Result<PageRecord, SkipReason> {
        let route = self.route_for(&blob.name)?;
        Ok(PageRecord::new(
            self.origin.page_url(&route),
            Some(blob.lastmod_date()),
        ))
    }

    /// Drain the listing and collect records in listing order.
    pub async fn scan(&self, listing: &mut BlobListing<'_>) -> Result<(Vec<PageRecord>, ScanStats)> {
        let mut records = Vec::new();
        let mut stats = ScanStats::default();

        while let Some(blob) = listing.next().await? {
            stats.listed += 1;
            match self.record_for(&blob) {
                Ok(record) => {
                    debug!(name = %blob.name, loc = %record.loc, "inventory page");
                    records.push(record);
                }
                Err(reason) => {
                    if reason != SkipReason::NotIndex {
                        debug!(name = %blob.name, ?reason, "skipping object");
                    }
                    stats.record_skip(reason);
                }
            }
        }

        stats.emitted = records.len();
        info!(
            listed = stats.listed,
            pages = stats.emitted,
            pages_fetched = listing.pages_fetched(),
            "storage inventory scanned"
        );
        Ok((records, stats))
    }
}

/// Whether any single path segment holds a run of nine or more digits.
pub fn has_temp_segment(route: &str) -> bool {
    route
        .split('/')
        .any(|segment| temp_segment_regex().is_match(segment))
}
