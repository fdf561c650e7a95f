//! Liveness filter: HEAD every candidate and drop dead or redirected pages.

use crate::acquisition::http_client::{HeadResponse, HttpClient};
use crate::errors::Result;
use crate::record::PageRecord;
use tracing::{info, warn};

/// Statuses that keep a page out of the sitemap.
pub const DEAD_STATUSES: &[u16] = &[404, 301, 302];

/// Outcome of probing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Live(u16),
    Dead(u16),
    Unreachable(String),
}

impl ProbeOutcome {
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }
}

/// Classify a probe result.
pub fn classify(result: &Result<HeadResponse>) -> ProbeOutcome {
    match result {
        Ok(resp) if DEAD_STATUSES.contains(&resp.status) => ProbeOutcome::Dead(resp.status),
        Ok(resp) => ProbeOutcome::Live(resp.status),
        Err(e) => ProbeOutcome::Unreachable(e.to_string()),
    }
}

/// Counters for one liveness pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivenessStats {
    pub probed: usize,
    pub live: usize,
    pub dead: usize,
    pub unreachable: usize,
}

/// Keep only records whose probe succeeded with a live status.
///
/// Probes run with at most `concurrency` in flight. A failed probe drops its
/// record and never affects siblings. Surviving records keep input order.
pub async fn filter_live(
    records: Vec<PageRecord>,
    client: &HttpClient,
    concurrency: usize,
) -> (Vec<PageRecord>, LivenessStats) {
    let urls: Vec<String> = records.iter().map(|r| r.loc.clone()).collect();
    let results = client.head_many(&urls, concurrency).await;

    let mut stats = LivenessStats {
        probed: records.len(),
        ..Default::default()
    };
    let mut live = Vec::with_capacity(records.len());

    for (record, result) in records.into_iter().zip(results) {
        match classify(&result) {
            ProbeOutcome::Live(_) => {
                stats.live += 1;
                live.push(record);
            }
            ProbeOutcome::Dead(status) => {
                stats.dead += 1;
                warn!("{status}: {}", record.loc);
            }
            ProbeOutcome::Unreachable(reason) => {
                stats.unreachable += 1;
                warn!("{reason}");
            }
        }
    }

    info!(
        probed = stats.probed,
        live = stats.live,
        dead = stats.dead,
        unreachable = stats.unreachable,
        "liveness check complete"
    );
    (live, stats)
}
