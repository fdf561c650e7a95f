//! Record types passed between pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page advertised in the sitemap.
///
/// `loc` is an absolute URL under the canonical site origin. `lastmod` is a
/// date-only `YYYY-MM-DD` string when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub loc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
}

impl PageRecord {
    pub fn new(loc: impl Into<String>, lastmod: Option<String>) -> Self {
        Self {
            loc: loc.into(),
            lastmod,
        }
    }
}

/// An object returned by a storage listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobDescriptor {
    /// Full object name, e.g. `docs/a/index.html`.
    pub name: String,
    /// Last-modified timestamp reported by the store.
    pub last_modified: DateTime<Utc>,
}

impl BlobDescriptor {
    pub fn new(name: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            last_modified,
        }
    }

    /// Date portion of the ISO-8601 last-modified timestamp.
    pub fn lastmod_date(&self) -> String {
        self.last_modified.date_naive().format("%Y-%m-%d").to_string()
    }
}
