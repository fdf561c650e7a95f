//! Run configuration: deploy environment, canonical origin, path prefixes.

use crate::errors::{Result, SyncError};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Sitemap served by the edge site.
pub const DEFAULT_UPSTREAM_SITEMAP: &str = "https://edge.site.example.net/sitemap.xml";

/// Canonical origin for the dev deployment.
pub const DEV_SITE_ORIGIN: &str = "https://dev.site.example.com";

/// Canonical origin for the prod deployment.
pub const PROD_SITE_ORIGIN: &str = "https://site.example.com";

/// Default size of the liveness worker pool.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 16;

/// Default per-probe timeout in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Deploy environment selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployEnv {
    Dev,
    Prod,
}

impl DeployEnv {
    /// Canonical published origin for this environment.
    pub fn site_origin(self) -> &'static str {
        match self {
            Self::Dev => DEV_SITE_ORIGIN,
            Self::Prod => PROD_SITE_ORIGIN,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }
}

impl FromStr for DeployEnv {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(SyncError::Configuration(format!(
                "unrecognized deploy environment {other:?} (expected \"dev\" or \"prod\")"
            ))),
        }
    }
}

impl fmt::Display for DeployEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheme, host and port every published URL is rewritten onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteOrigin {
    url: Url,
    origin: String,
}

impl SiteOrigin {
    /// Parse an absolute http(s) origin. Any path on the input is ignored.
    pub fn parse(origin: &str) -> Result<Self> {
        let url = Url::parse(origin).map_err(|e| {
            SyncError::Configuration(format!("invalid site origin {origin:?}: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(SyncError::Configuration(format!(
                "site origin {origin:?} must be an absolute http(s) URL"
            )));
        }
        let origin = url.origin().ascii_serialization();
        Ok(Self { url, origin })
    }

    /// `scheme://host[:port]` with no trailing slash.
    pub fn as_str(&self) -> &str {
        &self.origin
    }

    /// Absolute URL for a site-relative route such as `docs/a/`.
    ///
    /// Each segment is percent-encoded, so spaces and reserved characters
    /// in object names yield a valid `<loc>`.
    pub fn page_url(&self, route: &str) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .clear()
                .extend(route.trim_start_matches('/').split('/'));
        }
        url.into()
    }

    /// Move `url` onto this origin, keeping path, query and fragment verbatim.
    pub fn rewrite(&self, url: &Url) -> Result<String> {
        let mut rewritten = url.clone();
        let malformed = |reason: &str| SyncError::MalformedRecord {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        rewritten
            .set_scheme(self.url.scheme())
            .map_err(|_| malformed("cannot change scheme"))?;
        rewritten
            .set_host(self.url.host_str())
            .map_err(|e| malformed(&e.to_string()))?;
        rewritten
            .set_port(self.url.port())
            .map_err(|_| malformed("cannot change port"))?;
        Ok(rewritten.to_string())
    }
}

/// Strip leading and trailing slashes; `/` and blank become empty.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_matches('/').to_string()
}

/// Everything the pipeline needs for one run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub env: DeployEnv,
    pub site_origin: SiteOrigin,
    pub upstream_url: Url,
    /// Normalized prefix the storage listing is restricted to.
    pub source_prefix: String,
    /// Normalized prefix the sitemap is written under.
    pub target_prefix: String,
    pub probe_concurrency: usize,
    pub probe_timeout: Duration,
    pub skip_liveness: bool,
}

impl SyncConfig {
    /// Defaults for an environment: env-selected origin and the fixed upstream.
    pub fn for_env(env: DeployEnv) -> Result<Self> {
        let upstream_url = Url::parse(DEFAULT_UPSTREAM_SITEMAP).map_err(|e| {
            SyncError::Configuration(format!("invalid upstream sitemap url: {e}"))
        })?;
        Ok(Self {
            env,
            site_origin: SiteOrigin::parse(env.site_origin())?,
            upstream_url,
            source_prefix: String::new(),
            target_prefix: String::new(),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            skip_liveness: false,
        })
    }

    pub fn with_upstream(mut self, upstream: &str) -> Result<Self> {
        self.upstream_url = Url::parse(upstream).map_err(|e| {
            SyncError::Configuration(format!("invalid upstream sitemap url {upstream:?}: {e}"))
        })?;
        Ok(self)
    }

    pub fn with_site_origin(mut self, origin: &str) -> Result<Self> {
        self.site_origin = SiteOrigin::parse(origin)?;
        Ok(self)
    }

    pub fn with_source_prefix(mut self, prefix: &str) -> Self {
        self.source_prefix = normalize_prefix(prefix);
        self
    }

    pub fn with_target_prefix(mut self, prefix: &str) -> Self {
        self.target_prefix = normalize_prefix(prefix);
        self
    }

    /// Validate values that cannot be expressed in types.
    pub fn validate(&self) -> Result<()> {
        if self.probe_concurrency == 0 {
            return Err(SyncError::Configuration(
                "probe concurrency must be at least 1".into(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(SyncError::Configuration(
                "probe timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}
