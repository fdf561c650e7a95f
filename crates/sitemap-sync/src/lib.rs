//! Reconciles an edge site's sitemap with a blob-storage listing of published
//! pages, probes every candidate for liveness, and publishes one
//! `sitemap.xml` back to storage.

pub mod acquisition;
pub mod cartography;
pub mod cli;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod record;
pub mod storage;

pub use config::{DeployEnv, SiteOrigin, SyncConfig};
pub use errors::{Result, SyncError};
pub use pipeline::{render_and_publish, PublishResult, RunSummary, SyncPipeline};
pub use record::{BlobDescriptor, PageRecord};
