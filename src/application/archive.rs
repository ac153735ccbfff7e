//! Batch archive assembly.
//!
//! Builds the multi-run ZIP in memory: one `run_<id>/` tree per run, a
//! best-effort `_metadata.db` snapshot per run, and a trailing
//! `manifest.json`. Runs are processed one at a time with a partial-success
//! policy: a run's failure lands in the manifest's error list and the batch
//! completes, possibly with only a manifest inside.

use std::io::{Cursor, Write};

use chrono::Utc;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::application::collector::collect_files;
use crate::application::snapshot::snapshot_bytes;
use crate::domain::{
    BatchManifest, DumpManifest, DumpStats, ExportError, Result, RunError, RunStats,
};
use crate::infrastructure::{MetadataStore, RunAccess};

use super::validate_run_id_count;

/// A fully assembled archive with its content-disposition filename.
#[derive(Debug)]
pub struct BatchArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// What one run's per-file loop managed to write before finishing or failing.
struct RunWriteOutcome {
    file_count: usize,
    total_size: u64,
    error: Option<String>,
}

/// Build a batch download archive for a set of run ids.
///
/// Unresolvable ids are silently omitted; zero resolved runs is a hard
/// `NotFound`. Partially written runs stay in the archive: their members are
/// counted into the manifest totals even when the run ends in an error
/// entry, so `total_files` always equals the number of members written.
/// The 500 MiB cap is advisory only and never enforced here.
///
/// # Errors
/// `Validation` for an empty or oversized id list, `NotFound` when no run
/// resolves, and archive-level IO errors.
pub fn build_batch_archive(
    store: &MetadataStore,
    access: &dyn RunAccess,
    run_ids: &[i64],
) -> Result<BatchArchive> {
    if run_ids.is_empty() {
        return Err(ExportError::validation("run_ids is required"));
    }
    validate_run_id_count(run_ids)?;

    let runs = store.runs_by_ids(run_ids)?;
    if runs.is_empty() {
        return Err(ExportError::not_found("No runs found"));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut manifest = BatchManifest::new();

    for run in &runs {
        let run_prefix = format!("run_{}/", run.id);
        let outcome = write_run_files(&mut writer, options, access, run.id, &run_prefix);

        manifest.total_files += outcome.file_count;
        manifest.total_size += outcome.total_size;

        match outcome.error {
            None => {
                // Best-effort snapshot; failure never fails the run
                match snapshot_bytes(store, run.id) {
                    Ok(dump) => {
                        if let Err(e) = write_member(
                            &mut writer,
                            options,
                            &format!("{run_prefix}_metadata.db"),
                            &dump,
                        ) {
                            tracing::warn!(
                                run_id = run.id,
                                error = %e,
                                "Failed to add metadata dump to archive"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            run_id = run.id,
                            error = %e,
                            "Failed to generate metadata dump"
                        );
                    }
                }

                manifest.runs.push(RunStats {
                    run_id: run.id,
                    storage_mode: run.storage_mode,
                    file_count: outcome.file_count,
                    total_size: outcome.total_size,
                });
            }
            Some(error) => {
                tracing::error!(run_id = run.id, error = %error, "Error processing run");
                manifest.errors.push(RunError {
                    run_id: run.id,
                    error,
                });
            }
        }
    }

    let manifest_json =
        serde_json::to_string_pretty(&manifest).map_err(ExportError::json)?;
    write_member(&mut writer, options, "manifest.json", manifest_json.as_bytes())?;

    let bytes = finish(writer)?;
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");

    Ok(BatchArchive {
        filename: format!("labcode_runs_{timestamp}.zip"),
        bytes,
    })
}

/// Build a metadata-only dump archive: one `run_<id>_dump.db` per run plus
/// the manifest, no file content.
///
/// # Errors
/// Same validation and resolution failures as [`build_batch_archive`].
pub fn build_batch_dump(store: &MetadataStore, run_ids: &[i64]) -> Result<BatchArchive> {
    if run_ids.is_empty() {
        return Err(ExportError::validation("run_ids is required"));
    }
    validate_run_id_count(run_ids)?;

    let runs = store.runs_by_ids(run_ids)?;
    if runs.is_empty() {
        return Err(ExportError::not_found("No runs found"));
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut manifest = DumpManifest::new();

    for run in &runs {
        match snapshot_bytes(store, run.id) {
            Ok(dump) => {
                write_member(
                    &mut writer,
                    options,
                    &format!("run_{}_dump.db", run.id),
                    &dump,
                )?;
                manifest.runs.push(DumpStats {
                    run_id: run.id,
                    storage_mode: run.storage_mode,
                    dump_size: dump.len(),
                });
            }
            Err(e) => {
                tracing::error!(run_id = run.id, error = %e, "Error generating dump");
                manifest.errors.push(RunError {
                    run_id: run.id,
                    error: e.to_string(),
                });
            }
        }
    }

    let manifest_json =
        serde_json::to_string_pretty(&manifest).map_err(ExportError::json)?;
    write_member(&mut writer, options, "manifest.json", manifest_json.as_bytes())?;

    let bytes = finish(writer)?;
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");

    Ok(BatchArchive {
        filename: format!("labcode_metadata_dumps_{timestamp}.zip"),
        bytes,
    })
}

/// Collect and write one run's files under `prefix`.
///
/// Catches every error after the point of first write, so already-written
/// members survive alongside the error record (the per-run unit is not
/// atomic).
fn write_run_files(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    access: &dyn RunAccess,
    run_id: i64,
    prefix: &str,
) -> RunWriteOutcome {
    let mut outcome = RunWriteOutcome {
        file_count: 0,
        total_size: 0,
        error: None,
    };

    let files = match collect_files(access, run_id, "") {
        Ok(files) => files,
        Err(e) => {
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };

    for file in &files {
        let content = match access.load_content(run_id, &file.path) {
            Ok(content) => content,
            Err(e) => {
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };

        let Some(bytes) = content else { continue };
        if bytes.is_empty() {
            continue;
        }

        let member = format!("{prefix}{}", file.path);
        if let Err(e) = write_member(writer, options, &member, &bytes) {
            outcome.error = Some(e.to_string());
            return outcome;
        }

        outcome.file_count += 1;
        outcome.total_size += bytes.len() as u64;
    }

    outcome
}

/// Write one archive member.
fn write_member(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    name: &str,
    bytes: &[u8],
) -> Result<()> {
    writer
        .start_file(name, options)
        .map_err(|e| ExportError::internal(format!("Failed to add archive member {name}: {e}")))?;
    writer
        .write_all(bytes)
        .map_err(|e| ExportError::io(format!("Failed to write archive member {name}"), e))?;
    Ok(())
}

/// Finalize the archive and take the buffer.
fn finish(mut writer: ZipWriter<Cursor<Vec<u8>>>) -> Result<Vec<u8>> {
    let cursor = writer
        .finish()
        .map_err(|e| ExportError::internal(format!("Failed to finalize archive: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::collector::fake::FakeAccess;
    use crate::domain::{test_fixtures, StorageMode};
    use std::io::Read;
    use zip::ZipArchive;

    fn store_with_runs(ids: &[i64]) -> MetadataStore {
        let store = MetadataStore::open_in_memory().unwrap();
        for id in ids {
            store
                .insert_run(&test_fixtures::run(*id, StorageMode::Local))
                .unwrap();
        }
        store
    }

    fn open_archive(bytes: Vec<u8>) -> ZipArchive<Cursor<Vec<u8>>> {
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    fn read_manifest(archive: &mut ZipArchive<Cursor<Vec<u8>>>) -> serde_json::Value {
        let mut raw = String::new();
        archive
            .by_name("manifest.json")
            .unwrap()
            .read_to_string(&mut raw)
            .unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_empty_run_ids_is_validation_error() {
        let store = store_with_runs(&[]);
        let access = FakeAccess::default();

        let err = build_batch_archive(&store, &access, &[]).unwrap_err();
        assert!(matches!(err, ExportError::Validation { .. }));

        let err = build_batch_dump(&store, &[]).unwrap_err();
        assert!(matches!(err, ExportError::Validation { .. }));
    }

    #[test]
    fn test_no_resolved_runs_is_not_found() {
        let store = store_with_runs(&[]);
        let access = FakeAccess::default();

        let err = build_batch_archive(&store, &access, &[7]).unwrap_err();
        assert!(matches!(err, ExportError::NotFound { .. }));
    }

    #[test]
    fn test_unresolvable_id_silently_omitted() {
        // Run 1 has 3 files over two directories, run 2 does not exist
        let store = store_with_runs(&[1]);
        let access = FakeAccess::default().with_run(
            1,
            &[
                ("a/one.txt", b"0123456789".as_slice()),
                ("a/two.txt", b"0123456789012345678901234567890123456789"),
                ("b/three.txt", &[7u8; 100]),
            ],
        );

        let archive = build_batch_archive(&store, &access, &[1, 2]).unwrap();
        let mut zip = open_archive(archive.bytes);
        let manifest = read_manifest(&mut zip);

        assert_eq!(manifest["runs"].as_array().unwrap().len(), 1);
        assert_eq!(manifest["runs"][0]["run_id"], 1);
        assert_eq!(manifest["runs"][0]["file_count"], 3);
        assert_eq!(manifest["runs"][0]["total_size"], 150);
        assert_eq!(manifest["total_files"], 3);
        assert_eq!(manifest["errors"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_members_written_under_run_prefix() {
        let store = store_with_runs(&[1]);
        let access = FakeAccess::default()
            .with_run(1, &[("protocol.yaml", b"steps: []".as_slice())]);

        let archive = build_batch_archive(&store, &access, &[1]).unwrap();
        let mut zip = open_archive(archive.bytes);

        let mut content = Vec::new();
        zip.by_name("run_1/protocol.yaml")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, b"steps: []");

        // Best-effort snapshot member exists for a resolvable run
        assert!(zip.by_name("run_1/_metadata.db").is_ok());
    }

    #[test]
    fn test_partial_run_keeps_written_members() {
        // Loading the second of three files fails; the first stays in the
        // archive and is counted, the run gets an error entry
        let store = store_with_runs(&[5]);
        let access = FakeAccess::default()
            .with_run(
                5,
                &[
                    ("a.txt", b"aaaa".as_slice()),
                    ("b.txt", b"bbbb"),
                    ("c.txt", b"cccc"),
                ],
            )
            .fail_load(5, "b.txt");

        let archive = build_batch_archive(&store, &access, &[5]).unwrap();
        let mut zip = open_archive(archive.bytes);

        assert!(zip.by_name("run_5/a.txt").is_ok());
        assert!(zip.by_name("run_5/b.txt").is_err());
        assert!(zip.by_name("run_5/c.txt").is_err());

        let manifest = read_manifest(&mut zip);
        assert_eq!(manifest["errors"].as_array().unwrap().len(), 1);
        assert_eq!(manifest["errors"][0]["run_id"], 5);
        assert_eq!(manifest["runs"].as_array().unwrap().len(), 0);
        assert_eq!(manifest["total_files"], 1);
        assert_eq!(manifest["total_size"], 4);
    }

    #[test]
    fn test_failed_run_does_not_abort_batch() {
        let store = store_with_runs(&[1, 2]);
        let access = FakeAccess::default()
            .with_run(1, &[("ok.txt", b"fine".as_slice())])
            .fail_run(2);

        let archive = build_batch_archive(&store, &access, &[1, 2]).unwrap();
        let mut zip = open_archive(archive.bytes);
        let manifest = read_manifest(&mut zip);

        assert_eq!(manifest["runs"].as_array().unwrap().len(), 1);
        assert_eq!(manifest["runs"][0]["run_id"], 1);
        assert_eq!(manifest["errors"][0]["run_id"], 2);
    }

    #[test]
    fn test_empty_content_skipped() {
        let store = store_with_runs(&[1]);
        let access = FakeAccess::default()
            .with_run(1, &[("empty.txt", b"".as_slice()), ("full.txt", b"x")]);

        let archive = build_batch_archive(&store, &access, &[1]).unwrap();
        let mut zip = open_archive(archive.bytes);

        assert!(zip.by_name("run_1/empty.txt").is_err());
        assert!(zip.by_name("run_1/full.txt").is_ok());

        let manifest = read_manifest(&mut zip);
        assert_eq!(manifest["runs"][0]["file_count"], 1);
    }

    #[test]
    fn test_archive_filename_shape() {
        let store = store_with_runs(&[1]);
        let access = FakeAccess::default().with_run(1, &[("a", b"x".as_slice())]);

        let archive = build_batch_archive(&store, &access, &[1]).unwrap();
        assert!(archive.filename.starts_with("labcode_runs_"));
        assert!(archive.filename.ends_with(".zip"));
    }

    #[test]
    fn test_batch_dump_members_and_manifest() {
        let store = store_with_runs(&[1, 2]);

        let archive = build_batch_dump(&store, &[1, 2]).unwrap();
        assert!(archive.filename.starts_with("labcode_metadata_dumps_"));

        let mut zip = open_archive(archive.bytes);
        assert!(zip.by_name("run_1_dump.db").is_ok());
        assert!(zip.by_name("run_2_dump.db").is_ok());

        let manifest = read_manifest(&mut zip);
        assert_eq!(manifest["type"], "metadata_dumps");
        assert_eq!(manifest["runs"].as_array().unwrap().len(), 2);
        assert!(manifest["runs"][0]["dump_size"].as_u64().unwrap() > 0);
    }
}
