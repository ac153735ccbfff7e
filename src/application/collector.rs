//! Recursive content collection.
//!
//! Flattens a run's virtual namespace into a file list by walking directory
//! entries depth-first through the access layer.

use crate::domain::{CollectedFile, ContentKind, Result};
use crate::infrastructure::RunAccess;

/// Collect every file reachable under `prefix` of the run's namespace.
///
/// Depth-first and unbounded: directories are traversed, never emitted.
/// Correctness relies on the access-layer contract that listings are
/// tree-shaped (see [`RunAccess`]); no cycle detection happens here. Errors
/// from listing propagate untouched - failure isolation is the caller's
/// concern, handled per run by the batch builder and estimator.
///
/// # Errors
/// Returns any error raised while listing.
pub fn collect_files(
    access: &dyn RunAccess,
    run_id: i64,
    prefix: &str,
) -> Result<Vec<CollectedFile>> {
    let mut files = Vec::new();

    for item in access.list_contents(run_id, prefix)? {
        match item.kind {
            ContentKind::File => files.push(CollectedFile {
                path: item.path,
                size: item.size.unwrap_or(0),
                source: item.source,
            }),
            ContentKind::Directory => {
                let sub_prefix = if item.path.ends_with('/') {
                    item.path
                } else {
                    format!("{}/", item.path)
                };
                files.extend(collect_files(access, run_id, &sub_prefix)?);
            }
        }
    }

    Ok(files)
}


#[cfg(test)]
mod tests {
    use super::fake::FakeAccess;
    use super::*;
    use crate::domain::ExportError;

    #[test]
    fn test_collect_flattens_depth_first() {
        let access = FakeAccess::default().with_run(
            1,
            &[
                ("a.txt", b"aaa".as_slice()),
                ("dir/b.txt", b"bb"),
                ("dir/sub/c.txt", b"c"),
            ],
        );

        let files = collect_files(&access, 1, "").unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "dir/b.txt", "dir/sub/c.txt"]);
        assert_eq!(files[0].size, 3);
        assert_eq!(files[2].size, 1);
    }

    #[test]
    fn test_directories_never_emitted() {
        let access = FakeAccess::default().with_run(1, &[("only/dir/entry.txt", b"x".as_slice())]);

        let files = collect_files(&access, 1, "").unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "only/dir/entry.txt");
    }

    #[test]
    fn test_listing_error_propagates() {
        let access = FakeAccess::default().fail_run(5);
        let err = collect_files(&access, 5, "").unwrap_err();
        assert!(matches!(err, ExportError::Unavailable { .. }));
    }

    #[test]
    fn test_unknown_run_propagates_not_found() {
        let access = FakeAccess::default();
        let err = collect_files(&access, 9, "").unwrap_err();
        assert!(matches!(err, ExportError::NotFound { .. }));
    }
}
