//! Unified access to run content across storage backends.
//!
//! A run's artifacts live in object storage, on local disk, or inside
//! database columns depending on its `storage_mode`. The [`RunAccess`] trait
//! answers "what exists" and "give me the bytes" for a virtual path
//! regardless of backend; [`HybridAccessLayer`] dispatches per run.

pub mod db_backend;
pub mod fs_backend;
pub mod object_backend;

use crate::domain::{ContentItem, ExportError, Result, Run, StorageInfo, StorageMode};
use crate::infrastructure::config::ExportConfig;
use crate::infrastructure::metadata_store::MetadataStore;

pub use db_backend::DbBackend;
pub use fs_backend::FsBackend;
pub use object_backend::ObjectBackend;

/// Backend-agnostic content access for one run at a time.
///
/// Contract requirement on implementors: listings form a tree-shaped
/// namespace. Callers recurse into directory entries without cycle
/// detection, so a listing that reintroduces an ancestor path never
/// terminates.
pub trait RunAccess {
    /// List entries directly under `prefix` within the run's namespace.
    ///
    /// Directory paths are slash-terminated. Fails with `NotFound` for an
    /// unknown run and `Unavailable` when the backend cannot be reached.
    fn list_contents(&self, run_id: i64, prefix: &str) -> Result<Vec<ContentItem>>;

    /// Load the bytes behind a virtual path.
    ///
    /// `Ok(None)` means the path resolves but has no retrievable content.
    fn load_content(&self, run_id: i64, path: &str) -> Result<Option<Vec<u8>>>;

    /// Resolve a download URL for a virtual path.
    fn download_url(&self, run_id: i64, path: &str) -> Result<String>;

    /// Describe the backend holding the run and summarize its namespace.
    fn storage_info(&self, run_id: i64) -> Result<StorageInfo>;
}

/// Reject virtual paths that escape the run's namespace.
pub(crate) fn validate_virtual_path(path: &str) -> Result<()> {
    if path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
        return Err(ExportError::validation(format!("invalid virtual path: {path}")));
    }
    Ok(())
}

/// Dispatches content access to the backend matching each run's storage mode.
pub struct HybridAccessLayer<'a> {
    store: &'a MetadataStore,
    fs: FsBackend,
    object: ObjectBackend,
}

impl<'a> HybridAccessLayer<'a> {
    /// Build the layer from the store and backend roots in the config.
    #[must_use]
    pub fn new(store: &'a MetadataStore, config: &ExportConfig) -> Self {
        Self {
            store,
            fs: FsBackend::new(config.data_root()),
            object: ObjectBackend::new(
                config.mirror_root(),
                config.s3.endpoint.clone(),
                config.s3.bucket.clone(),
            ),
        }
    }

    fn resolve_run(&self, run_id: i64) -> Result<Run> {
        self.store
            .run(run_id)?
            .ok_or_else(|| ExportError::not_found(format!("Run {run_id} not found")))
    }

    fn address(run: &Run) -> String {
        run.storage_address
            .clone()
            .unwrap_or_else(|| format!("run_{}", run.id))
    }
}

impl RunAccess for HybridAccessLayer<'_> {
    fn list_contents(&self, run_id: i64, prefix: &str) -> Result<Vec<ContentItem>> {
        validate_virtual_path(prefix)?;
        let run = self.resolve_run(run_id)?;
        let address = Self::address(&run);
        let db = DbBackend::new(self.store);

        match run.storage_mode {
            StorageMode::Local => self.fs.list(&address, prefix),
            StorageMode::S3 => self.object.list(&address, prefix),
            StorageMode::Hybrid => {
                let mut items = self.fs.list(&address, prefix)?;
                merge_items(&mut items, db.list(run_id, prefix)?);
                Ok(items)
            }
            StorageMode::Unknown => Err(ExportError::unavailable(format!(
                "Run {run_id} has no resolvable storage backend"
            ))),
        }
    }

    fn load_content(&self, run_id: i64, path: &str) -> Result<Option<Vec<u8>>> {
        validate_virtual_path(path)?;
        let run = self.resolve_run(run_id)?;
        let address = Self::address(&run);
        let db = DbBackend::new(self.store);

        match run.storage_mode {
            StorageMode::Local => self.fs.load(&address, path),
            StorageMode::S3 => self.object.load(&address, path),
            StorageMode::Hybrid => {
                // Disk wins over the inline-log view of the same path
                match self.fs.load(&address, path)? {
                    Some(bytes) => Ok(Some(bytes)),
                    None => db.load(run_id, path),
                }
            }
            StorageMode::Unknown => Err(ExportError::unavailable(format!(
                "Run {run_id} has no resolvable storage backend"
            ))),
        }
    }

    fn download_url(&self, run_id: i64, path: &str) -> Result<String> {
        validate_virtual_path(path)?;
        let run = self.resolve_run(run_id)?;
        let address = Self::address(&run);
        let db = DbBackend::new(self.store);

        match run.storage_mode {
            StorageMode::Local => self.fs.url(&address, path),
            StorageMode::S3 => Ok(self.object.url(&address, path)),
            StorageMode::Hybrid => {
                if self.fs.load(&address, path)?.is_some() {
                    self.fs.url(&address, path)
                } else {
                    Ok(db.url(run_id, path))
                }
            }
            StorageMode::Unknown => Err(ExportError::unavailable(format!(
                "Run {run_id} has no resolvable storage backend"
            ))),
        }
    }

    fn storage_info(&self, run_id: i64) -> Result<StorageInfo> {
        let run = self.resolve_run(run_id)?;
        let entry_count = match run.storage_mode {
            StorageMode::Unknown => 0,
            _ => self.list_contents(run_id, "")?.len(),
        };

        Ok(StorageInfo {
            run_id: run.id,
            storage_mode: run.storage_mode,
            storage_address: run.storage_address,
            entry_count,
        })
    }
}

/// Merge extra items into a listing, first occurrence of a path wins.
fn merge_items(items: &mut Vec<ContentItem>, extra: Vec<ContentItem>) {
    for item in extra {
        if !items.iter().any(|existing| existing.path == item.path) {
            items.push(item);
        }
    }
    items.sort_by(|a, b| a.path.cmp(&b.path));
}
