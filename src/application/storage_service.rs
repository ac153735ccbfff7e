//! Single-run passthrough operations.
//!
//! Thin wrapper over the access layer for browse/preview/download-link/info
//! requests, translating failures into the response taxonomy: unexpected
//! errors are logged in full and surfaced as a short internal-error message.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::domain::{ContentItem, ExportError, Preview, PreviewEncoding, Result, StorageInfo};
use crate::infrastructure::RunAccess;

/// Resolved download link for one virtual path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadUrl {
    pub url: String,
    pub run_id: i64,
    pub path: String,
}

/// Request-facing operations for a single run.
pub struct StorageService<'a> {
    access: &'a dyn RunAccess,
}

impl<'a> StorageService<'a> {
    #[must_use]
    pub const fn new(access: &'a dyn RunAccess) -> Self {
        Self { access }
    }

    /// List a run's content under a virtual-path prefix.
    pub fn list(&self, run_id: i64, prefix: &str) -> Result<Vec<ContentItem>> {
        self.access
            .list_contents(run_id, prefix)
            .map_err(translate)
    }

    /// Previewable content for a run/path.
    ///
    /// Valid UTF-8 is returned as text; anything else falls back to base64,
    /// and the response always declares which encoding was used.
    pub fn preview(&self, run_id: i64, path: &str) -> Result<Preview> {
        let content = self
            .access
            .load_content(run_id, path)
            .map_err(translate)?
            .ok_or_else(|| ExportError::not_found("Content not found"))?;

        Ok(match String::from_utf8(content) {
            Ok(text) => Preview {
                content: text,
                encoding: PreviewEncoding::Utf8,
            },
            Err(e) => Preview {
                content: STANDARD.encode(e.as_bytes()),
                encoding: PreviewEncoding::Base64,
            },
        })
    }

    /// Download URL for a run/path.
    pub fn download_url(&self, run_id: i64, path: &str) -> Result<DownloadUrl> {
        let url = self
            .access
            .download_url(run_id, path)
            .map_err(translate)?;
        Ok(DownloadUrl {
            url,
            run_id,
            path: path.to_string(),
        })
    }

    /// Storage backend summary for a run.
    pub fn info(&self, run_id: i64) -> Result<StorageInfo> {
        self.access.storage_info(run_id).map_err(translate)
    }
}

/// Map unexpected failures to a generic internal error; caller-facing
/// categories pass through unchanged.
fn translate(err: ExportError) -> ExportError {
    match err {
        ExportError::Validation { .. }
        | ExportError::NotFound { .. }
        | ExportError::Unavailable { .. } => err,
        other => {
            tracing::error!(error = %other, "Unexpected error in storage operation");
            ExportError::internal("Internal server error")
        }
    }
}
