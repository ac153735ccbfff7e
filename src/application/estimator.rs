//! Batch size estimation.
//!
//! Metadata-only variant of the collector: walks listings for their sizes
//! without ever loading file bytes, and advises callers against downloads
//! that would exceed the 500 MiB cap. The archive builder itself never
//! enforces the cap.

use crate::application::collector::collect_files;
use crate::domain::{BatchEstimate, Result, RunEstimateDetail, MAX_BATCH_SIZE};
use crate::infrastructure::{MetadataStore, RunAccess};

use super::validate_run_id_count;

/// Estimate the aggregate size of a batch download.
///
/// Empty `run_ids` or zero resolved runs short-circuit to a
/// `can_download = false` result without raising. A per-run failure records
/// an error detail, contributes zero to the aggregate, and never aborts the
/// remaining runs. Never mutates state; repeated calls over unchanged data
/// yield identical totals.
///
/// # Errors
/// Returns a validation error when more than 100 ids are requested, or a
/// database error if run resolution fails.
pub fn estimate_batch(
    store: &MetadataStore,
    access: &dyn RunAccess,
    run_ids: &[i64],
) -> Result<BatchEstimate> {
    if run_ids.is_empty() {
        return Ok(BatchEstimate::empty("run_ids is required"));
    }
    validate_run_id_count(run_ids)?;

    let runs = store.runs_by_ids(run_ids)?;
    if runs.is_empty() {
        return Ok(BatchEstimate::empty("No runs found"));
    }

    let mut total_size = 0u64;
    let mut total_files = 0usize;
    let mut runs_detail = Vec::with_capacity(runs.len());

    for run in &runs {
        match collect_files(access, run.id, "") {
            Ok(files) => {
                let run_size: u64 = files.iter().map(|f| f.size).sum();
                let run_files = files.len();

                total_size += run_size;
                total_files += run_files;

                runs_detail.push(RunEstimateDetail::Stats {
                    run_id: run.id,
                    storage_mode: run.storage_mode,
                    file_count: run_files,
                    estimated_size: run_size,
                });
            }
            Err(e) => {
                tracing::warn!(run_id = run.id, error = %e, "Error estimating run");
                runs_detail.push(RunEstimateDetail::Error {
                    run_id: run.id,
                    error: e.to_string(),
                });
            }
        }
    }

    let can_download = total_size <= MAX_BATCH_SIZE;
    let message = if can_download {
        None
    } else {
        Some(format!(
            "Estimated size ({}MB) exceeds limit (500MB)",
            total_size / (1024 * 1024)
        ))
    };

    Ok(BatchEstimate {
        run_count: runs.len(),
        total_files,
        estimated_size_bytes: total_size,
        estimated_size_mb: round2(total_size as f64 / (1024.0 * 1024.0)),
        can_download,
        message,
        runs_detail,
    })
}

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::collector::fake::FakeAccess;
    use crate::domain::{test_fixtures, StorageMode};

    fn store_with_runs(ids: &[i64]) -> MetadataStore {
        let store = MetadataStore::open_in_memory().unwrap();
        for id in ids {
            store
                .insert_run(&test_fixtures::run(*id, StorageMode::Local))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_empty_request_short_circuits() {
        let store = store_with_runs(&[]);
        let access = FakeAccess::default();

        let estimate = estimate_batch(&store, &access, &[]).unwrap();
        assert!(!estimate.can_download);
        assert_eq!(estimate.run_count, 0);
        assert_eq!(estimate.message.as_deref(), Some("run_ids is required"));
    }

    #[test]
    fn test_no_resolved_runs_short_circuits() {
        let store = store_with_runs(&[]);
        let access = FakeAccess::default();

        let estimate = estimate_batch(&store, &access, &[7, 8]).unwrap();
        assert!(!estimate.can_download);
        assert_eq!(estimate.message.as_deref(), Some("No runs found"));
    }

    #[test]
    fn test_totals_across_runs() {
        let store = store_with_runs(&[1, 2]);
        let access = FakeAccess::default()
            .with_run(1, &[("a.txt", b"12345".as_slice()), ("d/b.txt", b"123")])
            .with_run(2, &[("c.txt", b"12".as_slice())]);

        let estimate = estimate_batch(&store, &access, &[1, 2]).unwrap();
        assert_eq!(estimate.run_count, 2);
        assert_eq!(estimate.total_files, 3);
        assert_eq!(estimate.estimated_size_bytes, 10);
        assert!(estimate.can_download);
        assert!(estimate.message.is_none());
    }

    #[test]
    fn test_per_run_error_contributes_zero() {
        let store = store_with_runs(&[1, 2]);
        let access = FakeAccess::default()
            .with_run(1, &[("a.txt", b"1234".as_slice())])
            .fail_run(2);

        let estimate = estimate_batch(&store, &access, &[1, 2]).unwrap();
        assert_eq!(estimate.run_count, 2);
        assert_eq!(estimate.total_files, 1);
        assert_eq!(estimate.estimated_size_bytes, 4);

        let has_error_detail = estimate.runs_detail.iter().any(|d| {
            matches!(d, RunEstimateDetail::Error { run_id: 2, .. })
        });
        assert!(has_error_detail);
    }

    #[test]
    fn test_boundary_exactly_at_cap_is_downloadable() {
        let store = store_with_runs(&[1]);
        let access =
            FakeAccess::default().with_declared_size(1, "big.bin", MAX_BATCH_SIZE);

        let estimate = estimate_batch(&store, &access, &[1]).unwrap();
        assert_eq!(estimate.estimated_size_bytes, MAX_BATCH_SIZE);
        assert!(estimate.can_download);
        assert!(estimate.message.is_none());
    }

    #[test]
    fn test_over_cap_message() {
        let store = store_with_runs(&[1]);
        let access =
            FakeAccess::default().with_declared_size(1, "big.bin", MAX_BATCH_SIZE + 1);

        let estimate = estimate_batch(&store, &access, &[1]).unwrap();
        assert!(!estimate.can_download);
        assert_eq!(
            estimate.message.as_deref(),
            Some("Estimated size (500MB) exceeds limit (500MB)")
        );
    }

    #[test]
    fn test_idempotent_for_unchanged_data() {
        let store = store_with_runs(&[1]);
        let access =
            FakeAccess::default().with_run(1, &[("a.txt", b"abcdef".as_slice())]);

        let first = estimate_batch(&store, &access, &[1]).unwrap();
        let second = estimate_batch(&store, &access, &[1]).unwrap();
        assert_eq!(first.estimated_size_bytes, second.estimated_size_bytes);
        assert_eq!(first.total_files, second.total_files);
    }

    #[test]
    fn test_round2() {
        assert!((round2(1.005 * 1024.0 / 1024.0) - 1.0).abs() < 0.01);
        assert!((round2(1.2345) - 1.23).abs() < f64::EPSILON);
    }

    #[test]
    fn test_over_100_ids_is_validation_error() {
        let store = store_with_runs(&[1]);
        let access = FakeAccess::default();
        let ids: Vec<i64> = (1..=101).collect();

        let err = estimate_batch(&store, &access, &ids).unwrap_err();
        assert!(matches!(err, crate::domain::ExportError::Validation { .. }));
    }
}
