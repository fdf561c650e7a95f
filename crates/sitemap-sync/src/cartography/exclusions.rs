//! Path-based exclusion rules for sitemap candidates.
//!
//! Rules only ever see the path component of a URL. Hosts and query strings
//! never influence the decision.

use crate::config::DeployEnv;
use crate::errors::{Result, SyncError};
use regex::Regex;
use std::collections::BTreeSet;
use url::Url;

/// Test, tooling and internal paths that never belong in the sitemap.
pub const EXTERNAL_EXCLUSIONS: &[&str] = &[
    r"^/test/",
    r"^/tests/",
    r"^/internal/",
    r"^/tools/",
    r"^/_",
    r"/nav$",
    r"/config/?$",
    r"/drafts?/",
];

/// Reference docs published for the other environment.
pub const DEV_REFERENCE_EXCLUSIONS: &[&str] = &[r"^/reference/prod/"];
pub const PROD_REFERENCE_EXCLUSIONS: &[&str] = &[r"^/reference/dev/", r"^/reference/preview/"];

/// Top-level folders belonging to other properties in the same account.
pub const EXCLUDED_SITES: &[&str] = &["secured", "admin-portal", "status", "labs"];

/// One compiled path rule.
#[derive(Debug, Clone)]
pub struct ExclusionPattern {
    regex: Regex,
}

impl ExclusionPattern {
    /// Compile a regular expression matched against the URL path.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            SyncError::Configuration(format!("invalid exclusion pattern {pattern:?}: {e}"))
        })?;
        Ok(Self { regex })
    }

    /// Matches paths starting with `prefix`.
    pub fn prefix(prefix: &str) -> Result<Self> {
        Self::new(&format!("^{}", regex::escape(prefix)))
    }

    /// Matches paths ending with `suffix`, with or without a trailing slash.
    pub fn suffix(suffix: &str) -> Result<Self> {
        Self::new(&format!("{}/?$", regex::escape(suffix.trim_end_matches('/'))))
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Ordered, immutable list of exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    patterns: Vec<ExclusionPattern>,
}

impl ExclusionSet {
    pub fn new(patterns: Vec<ExclusionPattern>) -> Self {
        Self { patterns }
    }

    /// Compile a table of regular expressions.
    pub fn from_table(table: &[&str]) -> Result<Self> {
        let patterns = table
            .iter()
            .map(|p| ExclusionPattern::new(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Rules applied to the upstream sitemap for a deploy environment.
    pub fn external(env: DeployEnv) -> Result<Self> {
        let env_table = match env {
            DeployEnv::Dev => DEV_REFERENCE_EXCLUSIONS,
            DeployEnv::Prod => PROD_REFERENCE_EXCLUSIONS,
        };
        let mut set = Self::from_table(EXTERNAL_EXCLUSIONS)?;
        set.patterns.extend(Self::from_table(env_table)?.patterns);
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First pattern matching `path`, if any.
    pub fn matching(&self, path: &str) -> Option<&ExclusionPattern> {
        self.patterns.iter().find(|p| p.is_match(path))
    }

    /// Whether `url` survives every rule.
    ///
    /// An unparseable URL is an error, never an implicit include or exclude.
    pub fn should_include(&self, url: &str) -> Result<bool> {
        let parsed = Url::parse(url).map_err(|e| SyncError::MalformedRecord {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.matching(parsed.path()).is_none())
    }
}

/// Top-level path segments of sibling properties.
#[derive(Debug, Clone, Default)]
pub struct ExcludedSiteSet {
    sites: BTreeSet<String>,
}

impl ExcludedSiteSet {
    pub fn new<I, S>(sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sites = sites
            .into_iter()
            .map(|s| s.as_ref().trim_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { sites }
    }

    /// The compiled-in table.
    pub fn builtin() -> Self {
        Self::new(EXCLUDED_SITES)
    }

    /// Whether the route's first segment names an excluded site.
    pub fn contains_route(&self, route: &str) -> bool {
        let route = route.trim_start_matches('/');
        self.sites
            .iter()
            .any(|site| route.strip_prefix(site.as_str()).is_some_and(|r| r.starts_with('/')))
    }
}
