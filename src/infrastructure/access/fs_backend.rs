//! Local-disk backend: run content stored under a data root directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{ContentItem, ContentSource, ExportError, Result};

/// Filesystem-backed content for runs in `local` mode.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Backend rooted at the configured data root.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// List entries directly under `prefix` of the run's directory.
    ///
    /// A missing run directory is an empty namespace, not an error; IO
    /// failures beyond that propagate.
    pub fn list(&self, address: &str, prefix: &str) -> Result<Vec<ContentItem>> {
        list_dir(&self.root.join(address), prefix, ContentSource::Local)
    }

    /// Load a file's bytes; `None` when the file does not exist.
    pub fn load(&self, address: &str, path: &str) -> Result<Option<Vec<u8>>> {
        load_file(&self.root.join(address), path)
    }

    /// A `file://` URL for direct local access.
    pub fn url(&self, address: &str, path: &str) -> Result<String> {
        let full = self.root.join(address).join(path);
        Ok(format!("file://{}", full.display()))
    }
}

/// Shared directory-listing walk used by the fs and object backends.
pub(crate) fn list_dir(
    run_root: &Path,
    prefix: &str,
    source: ContentSource,
) -> Result<Vec<ContentItem>> {
    // Callers pass slash-terminated prefixes; normalize CLI-supplied ones
    let prefix = if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    };
    let prefix = prefix.as_str();

    let dir = if prefix.is_empty() {
        run_root.to_path_buf()
    } else {
        run_root.join(prefix)
    };

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&dir)
        .map_err(|e| ExportError::io(format!("Failed to read directory {}", dir.display()), e))?;

    let mut items = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| ExportError::io("Failed to read directory entry", e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let virtual_path = format!("{prefix}{name}");

        let metadata = entry
            .metadata()
            .map_err(|e| ExportError::io(format!("Failed to read metadata for {name}"), e))?;

        if metadata.is_dir() {
            items.push(ContentItem::directory(virtual_path, source));
        } else {
            items.push(ContentItem::file(virtual_path, Some(metadata.len()), source));
        }
    }

    items.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(items)
}

/// Shared file load used by the fs and object backends.
pub(crate) fn load_file(run_root: &Path, path: &str) -> Result<Option<Vec<u8>>> {
    let full = run_root.join(path);
    if !full.is_file() {
        return Ok(None);
    }

    fs::read(&full)
        .map(Some)
        .map_err(|e| ExportError::io(format!("Failed to read {}", full.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContentKind;
    use tempfile::tempdir;

    fn seed(root: &Path) {
        fs::create_dir_all(root.join("run_1/results")).unwrap();
        fs::write(root.join("run_1/protocol.yaml"), b"steps: []").unwrap();
        fs::write(root.join("run_1/results/out.csv"), b"a,b\n1,2\n").unwrap();
    }

    #[test]
    fn test_list_root_and_subdir() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        let backend = FsBackend::new(dir.path().to_path_buf());

        let items = backend.list("run_1", "").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, "protocol.yaml");
        assert_eq!(items[0].kind, ContentKind::File);
        assert_eq!(items[0].size, Some(9));
        assert_eq!(items[1].path, "results/");
        assert_eq!(items[1].kind, ContentKind::Directory);

        let nested = backend.list("run_1", "results/").unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].path, "results/out.csv");
    }

    #[test]
    fn test_missing_run_dir_is_empty() {
        let dir = tempdir().unwrap();
        let backend = FsBackend::new(dir.path().to_path_buf());
        assert!(backend.list("run_9", "").unwrap().is_empty());
    }

    #[test]
    fn test_load_present_and_absent() {
        let dir = tempdir().unwrap();
        seed(dir.path());
        let backend = FsBackend::new(dir.path().to_path_buf());

        let bytes = backend.load("run_1", "protocol.yaml").unwrap().unwrap();
        assert_eq!(bytes, b"steps: []");

        assert!(backend.load("run_1", "nope.txt").unwrap().is_none());
    }
}
