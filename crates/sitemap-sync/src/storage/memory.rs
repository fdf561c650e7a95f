//! In-process blob container used for dry runs and tests.

use super::{BlobPage, BlobStore, PublicAccess};
use crate::errors::{Result, SyncError};
use crate::record::BlobDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// A stored object.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub body: Vec<u8>,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

/// Container held in memory, listed in lexicographic name order.
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, StoredBlob>>,
    page_size: usize,
    access: Mutex<Option<PublicAccess>>,
    static_website: Mutex<Option<(String, String)>>,
    uploads: AtomicUsize,
    fail_uploads: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_page_size(5000)
    }

    /// Store whose listing pages hold at most `page_size` entries.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            blobs: Mutex::new(BTreeMap::new()),
            page_size: page_size.max(1),
            access: Mutex::new(None),
            static_website: Mutex::new(None),
            uploads: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
        }
    }

    /// Add an empty HTML object with the given timestamp.
    pub fn insert(&self, name: &str, last_modified: DateTime<Utc>) {
        let blob = StoredBlob {
            body: Vec::new(),
            content_type: "text/html".to_string(),
            last_modified,
        };
        self.lock_blobs().insert(name.to_string(), blob);
    }

    pub fn get(&self, name: &str) -> Option<StoredBlob> {
        self.lock_blobs().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_blobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful uploads.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Make every following upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn access(&self) -> Option<PublicAccess> {
        *self.access.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn static_website(&self) -> Option<(String, String)> {
        self.static_website
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock_blobs(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredBlob>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<BlobPage> {
        let blobs = self.lock_blobs();
        let start = marker.unwrap_or("");
        let mut matching = blobs
            .range(start.to_string()..)
            .filter(|(name, _)| name.starts_with(prefix));

        let page: Vec<BlobDescriptor> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(name, blob)| BlobDescriptor::new(name.clone(), blob.last_modified))
            .collect();
        let next_marker = matching.next().map(|(name, _)| name.clone());

        Ok(BlobPage {
            blobs: page,
            next_marker,
        })
    }

    async fn container_exists(&self) -> Result<bool> {
        Ok(self.access().is_some())
    }

    async fn create_container(&self, access: PublicAccess) -> Result<()> {
        let mut current = self.access.lock().unwrap_or_else(|e| e.into_inner());
        if current.is_some() {
            return Err(SyncError::Storage("container already exists".into()));
        }
        *current = Some(access);
        Ok(())
    }

    async fn set_access_policy(&self, access: PublicAccess) -> Result<()> {
        let mut current = self.access.lock().unwrap_or_else(|e| e.into_inner());
        if current.is_none() {
            return Err(SyncError::Storage("container does not exist".into()));
        }
        *current = Some(access);
        Ok(())
    }

    async fn upload(&self, path: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(SyncError::Storage(format!("upload of {path} rejected")));
        }
        let blob = StoredBlob {
            body,
            content_type: content_type.to_string(),
            last_modified: Utc::now(),
        };
        self.lock_blobs().insert(path.to_string(), blob);
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn enable_static_website(
        &self,
        index_document: &str,
        error_document: &str,
    ) -> Result<()> {
        *self.static_website.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((index_document.to_string(), error_document.to_string()));
        Ok(())
    }
}
