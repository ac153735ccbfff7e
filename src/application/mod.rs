//! Application layer - use cases and orchestration.
//!
//! This layer contains the export subsystem proper: collection, estimation,
//! archive assembly, metadata snapshots, and the single-run passthrough
//! operations.

pub mod archive;
pub mod collector;
pub mod estimator;
pub mod snapshot;
pub mod storage_service;

pub use archive::{build_batch_archive, build_batch_dump, BatchArchive};
pub use collector::collect_files;
pub use estimator::estimate_batch;
pub use snapshot::{snapshot_bytes, snapshot_to_file, write_snapshot, SnapshotStats};
pub use storage_service::{DownloadUrl, StorageService};

use crate::domain::{ExportError, Result};

/// Upper bound on run ids per batch request.
pub const MAX_BATCH_RUN_IDS: usize = 100;

/// Reject batch requests carrying more than [`MAX_BATCH_RUN_IDS`] ids.
pub(crate) fn validate_run_id_count(run_ids: &[i64]) -> Result<()> {
    if run_ids.len() > MAX_BATCH_RUN_IDS {
        return Err(ExportError::validation(format!(
            "run_ids accepts at most {MAX_BATCH_RUN_IDS} entries, got {}",
            run_ids.len()
        )));
    }
    Ok(())
}
