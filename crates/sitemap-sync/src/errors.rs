//! Error taxonomy for a sitemap sync run.
//!
//! Per-record errors (`MalformedRecord`, `Probe`) are recovered by the stage
//! that raises them. Every other variant is fatal and ends the run.

use thiserror::Error;

/// Errors raised by the sync pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid setting; raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Upstream sitemap unreachable or answered with a non-success status.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Upstream XML is missing the expected `urlset`/`url` structure.
    #[error("failed to parse sitemap: {0}")]
    Parse(String),

    /// A single URL could not be parsed.
    #[error("malformed url {url:?}: {reason}")]
    MalformedRecord { url: String, reason: String },

    /// A liveness probe failed at the transport level.
    #[error("probe failed for {url}: {reason}")]
    Probe { url: String, reason: String },

    /// Object storage rejected a listing or container operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialising the sitemap document failed.
    #[error("failed to render sitemap: {0}")]
    Render(String),

    /// The final sitemap upload failed.
    #[error("failed to publish {path}: {reason}")]
    Publish { path: String, reason: String },
}

impl SyncError {
    /// Whether the error only affects one record and the run may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. } | Self::Probe { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
