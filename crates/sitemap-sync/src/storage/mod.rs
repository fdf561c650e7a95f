//! Object-storage collaborators: paginated listing and whole-object writes.

pub mod azure;
pub mod memory;

use crate::errors::Result;
use crate::record::BlobDescriptor;
use async_trait::async_trait;
use std::collections::VecDeque;

pub use azure::AzureBlobStore;
pub use memory::MemoryBlobStore;

/// One page of a listing plus the continuation marker for the next.
#[derive(Debug, Clone, Default)]
pub struct BlobPage {
    pub blobs: Vec<BlobDescriptor>,
    pub next_marker: Option<String>,
}

/// Anonymous read access level of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicAccess {
    /// Private container.
    None,
    /// Anonymous read for blobs only.
    Blob,
    /// Anonymous read for blobs and container listing.
    Container,
}

impl PublicAccess {
    /// Value of the `x-ms-blob-public-access` header, if any.
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Blob => Some("blob"),
            Self::Container => Some("container"),
        }
    }
}

/// Operations the pipeline needs from a blob container.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch one listing page of objects under `prefix`, resuming at `marker`.
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<BlobPage>;

    async fn container_exists(&self) -> Result<bool>;

    async fn create_container(&self, access: PublicAccess) -> Result<()>;

    async fn set_access_policy(&self, access: PublicAccess) -> Result<()>;

    /// Replace the object at `path` with `body` in a single write.
    async fn upload(&self, path: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Turn on static website hosting for the account.
    async fn enable_static_website(&self, index_document: &str, error_document: &str)
        -> Result<()>;
}

/// Pull-based cursor over a paginated listing.
///
/// Pages are fetched lazily as the buffered page drains.
pub struct BlobListing<'a> {
    store: &'a dyn BlobStore,
    prefix: String,
    marker: Option<String>,
    buffer: VecDeque<BlobDescriptor>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a> BlobListing<'a> {
    pub fn new(store: &'a dyn BlobStore, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            marker: None,
            buffer: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
        }
    }

    /// Next descriptor, fetching further pages as needed.
    pub async fn next(&mut self) -> Result<Option<BlobDescriptor>> {
        loop {
            if let Some(blob) = self.buffer.pop_front() {
                return Ok(Some(blob));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self
                .store
                .list_page(&self.prefix, self.marker.as_deref())
                .await?;
            self.pages_fetched += 1;
            self.buffer.extend(page.blobs);
            self.marker = page.next_marker.filter(|m| !m.is_empty());
            self.exhausted = self.marker.is_none();
        }
    }

    /// Number of listing pages requested so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}
