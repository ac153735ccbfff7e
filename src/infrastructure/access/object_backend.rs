//! Object-storage backend for runs in `s3` mode.
//!
//! Content is read through a configured mirror root (a bucket mount or sync
//! target); download URLs are constructed from the configured endpoint and
//! bucket so callers can fetch directly from object storage.

use std::path::PathBuf;

use crate::domain::{ContentItem, ContentSource, ExportError, Result};
use crate::infrastructure::access::fs_backend;

/// Object-store-backed content for runs in `s3` mode.
pub struct ObjectBackend {
    mirror_root: Option<PathBuf>,
    endpoint: String,
    bucket: String,
}

impl ObjectBackend {
    #[must_use]
    pub const fn new(mirror_root: Option<PathBuf>, endpoint: String, bucket: String) -> Self {
        Self {
            mirror_root,
            endpoint,
            bucket,
        }
    }

    fn mirror(&self) -> Result<&PathBuf> {
        let root = self.mirror_root.as_ref().ok_or_else(|| {
            ExportError::unavailable("s3 mirror root is not configured")
        })?;
        if !root.exists() {
            return Err(ExportError::unavailable(format!(
                "s3 mirror root is not reachable: {}",
                root.display()
            )));
        }
        Ok(root)
    }

    /// List entries directly under `prefix` of the run's bucket prefix.
    pub fn list(&self, address: &str, prefix: &str) -> Result<Vec<ContentItem>> {
        let root = self.mirror()?;
        fs_backend::list_dir(&root.join(address), prefix, ContentSource::S3)
    }

    /// Load an object's bytes; `None` when the object does not exist.
    pub fn load(&self, address: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let root = self.mirror()?;
        fs_backend::load_file(&root.join(address), path)
    }

    /// Bucket-addressed download URL.
    #[must_use]
    pub fn url(&self, address: &str, path: &str) -> String {
        format!("{}/{}/{address}/{path}", self.endpoint, self.bucket)
    }
}
