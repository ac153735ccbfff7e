//! Manifest and estimate types embedded in export artifacts.
//!
//! The batch archive and batch dump both carry a trailing `manifest.json`
//! whose field names are a stable format consumed outside this service; serde
//! renames below are load-bearing.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::StorageMode;

/// Hard cap the estimator advises against; the builder never enforces it.
pub const MAX_BATCH_SIZE: u64 = 500 * 1024 * 1024;

/// Per-run statistics recorded for a successfully processed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub run_id: i64,
    pub storage_mode: StorageMode,
    pub file_count: usize,
    pub total_size: u64,
}

/// Per-run failure recorded without aborting the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub run_id: i64,
    pub error: String,
}

/// Summary embedded as the final member of a batch archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    /// ISO-8601 UTC timestamp with trailing `Z`.
    pub generated_at: String,
    pub runs: Vec<RunStats>,
    /// Count of archive members actually written, including partial runs.
    pub total_files: usize,
    /// Bytes actually written, including partial runs.
    pub total_size: u64,
    pub errors: Vec<RunError>,
}

impl BatchManifest {
    /// Start an empty manifest stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generated_at: utc_now_iso(),
            runs: Vec::new(),
            total_files: 0,
            total_size: 0,
            errors: Vec::new(),
        }
    }
}

impl Default for BatchManifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run entry of a metadata-only dump manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpStats {
    pub run_id: i64,
    pub storage_mode: StorageMode,
    pub dump_size: usize,
}

/// Summary embedded as the final member of a batch metadata dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpManifest {
    pub generated_at: String,
    #[serde(rename = "type")]
    pub manifest_type: String,
    pub runs: Vec<DumpStats>,
    pub errors: Vec<RunError>,
}

impl DumpManifest {
    #[must_use]
    pub fn new() -> Self {
        Self {
            generated_at: utc_now_iso(),
            manifest_type: "metadata_dumps".to_string(),
            runs: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl Default for DumpManifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Detail entry of a batch size estimate: either per-run totals or the error
/// that prevented them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunEstimateDetail {
    Stats {
        run_id: i64,
        storage_mode: StorageMode,
        file_count: usize,
        estimated_size: u64,
    },
    Error {
        run_id: i64,
        error: String,
    },
}

/// Advisory size estimate for a batch download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEstimate {
    pub run_count: usize,
    pub total_files: usize,
    pub estimated_size_bytes: u64,
    pub estimated_size_mb: f64,
    pub can_download: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub runs_detail: Vec<RunEstimateDetail>,
}

impl BatchEstimate {
    /// Short-circuit result for an empty or unresolvable request.
    #[must_use]
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            run_count: 0,
            total_files: 0,
            estimated_size_bytes: 0,
            estimated_size_mb: 0.0,
            can_download: false,
            message: Some(message.into()),
            runs_detail: Vec::new(),
        }
    }
}

/// Encoding declared by a content preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreviewEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

/// Previewable content with its declared encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preview {
    pub content: String,
    pub encoding: PreviewEncoding,
}

/// Current UTC time as an ISO-8601 string with trailing `Z`.
#[must_use]
pub fn utc_now_iso() -> String {
    format!("{}Z", Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_field_names() {
        let mut manifest = BatchManifest::new();
        manifest.runs.push(RunStats {
            run_id: 1,
            storage_mode: StorageMode::Local,
            file_count: 3,
            total_size: 150,
        });
        manifest.total_files = 3;
        manifest.total_size = 150;

        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json["generated_at"].as_str().unwrap().ends_with('Z'));
        assert_eq!(json["runs"][0]["run_id"], 1);
        assert_eq!(json["runs"][0]["storage_mode"], "local");
        assert_eq!(json["runs"][0]["file_count"], 3);
        assert_eq!(json["total_files"], 3);
        assert_eq!(json["total_size"], 150);
        assert_eq!(json["errors"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_dump_manifest_type_field() {
        let manifest = DumpManifest::new();
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["type"], "metadata_dumps");
    }

    #[test]
    fn test_estimate_detail_untagged() {
        let detail = RunEstimateDetail::Error {
            run_id: 9,
            error: "listing failed".to_string(),
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["run_id"], 9);
        assert_eq!(json["error"], "listing failed");
        assert!(json.get("file_count").is_none());
    }

    #[test]
    fn test_preview_encoding_names() {
        let p = Preview {
            content: "hi".to_string(),
            encoding: PreviewEncoding::Utf8,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["encoding"], "utf-8");
    }
}
