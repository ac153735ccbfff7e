//! Relational-field backend: inline operation logs exposed as virtual files.
//!
//! Runs in `hybrid` mode keep operation log text in the `operations.log`
//! column. This backend projects those rows into the virtual namespace as
//! `processes/<name>/operations/<id>/log.txt`, so the export subsystem can
//! treat them like any other file.

use crate::domain::{ContentItem, ContentSource, OperationArena, Result};
use crate::infrastructure::metadata_store::MetadataStore;

/// Database-backed virtual content for a run.
pub struct DbBackend<'a> {
    store: &'a MetadataStore,
}

impl<'a> DbBackend<'a> {
    #[must_use]
    pub const fn new(store: &'a MetadataStore) -> Self {
        Self { store }
    }

    /// All virtual files of the run: (path, log text), in process order and
    /// arena depth-first order within each process.
    fn virtual_files(&self, run_id: i64) -> Result<Vec<(String, String)>> {
        let mut files = Vec::new();

        for process in self.store.processes_for_run(run_id)? {
            let operations = self.store.operations_for_processes(&[process.id])?;
            let arena = OperationArena::build(operations);

            for op_id in arena.depth_first() {
                let Some(op) = arena.get(op_id) else { continue };
                if !op.has_log() {
                    continue;
                }
                let Some(log) = op.log.clone() else { continue };
                files.push((
                    format!("processes/{}/operations/{}/log.txt", process.name, op.id),
                    log,
                ));
            }
        }

        Ok(files)
    }

    /// List immediate children of `prefix` in the virtual namespace.
    pub fn list(&self, run_id: i64, prefix: &str) -> Result<Vec<ContentItem>> {
        let files = self.virtual_files(run_id)?;

        let prefix = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };
        let prefix = prefix.as_str();

        let mut items: Vec<ContentItem> = Vec::new();
        for (path, log) in &files {
            let Some(rest) = path.strip_prefix(prefix) else {
                continue;
            };

            match rest.find('/') {
                Some(slash) => {
                    let dir_path = format!("{prefix}{}/", &rest[..slash]);
                    if !items.iter().any(|item| item.path == dir_path) {
                        items.push(ContentItem::directory(dir_path, ContentSource::Database));
                    }
                }
                None => items.push(ContentItem::file(
                    path.clone(),
                    Some(log.len() as u64),
                    ContentSource::Database,
                )),
            }
        }

        Ok(items)
    }

    /// Load the log text behind a virtual path.
    pub fn load(&self, run_id: i64, path: &str) -> Result<Option<Vec<u8>>> {
        let files = self.virtual_files(run_id)?;
        Ok(files
            .into_iter()
            .find(|(p, _)| p == path)
            .map(|(_, log)| log.into_bytes()))
    }

    /// Service-relative URL for database-held content.
    #[must_use]
    pub fn url(&self, run_id: i64, path: &str) -> String {
        format!("/api/v2/storage/db-content/{run_id}?path={path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{test_fixtures, ContentKind, StorageMode};

    fn seeded_store() -> MetadataStore {
        let store = MetadataStore::open_in_memory().unwrap();
        store
            .insert_run(&test_fixtures::run(1, StorageMode::Hybrid))
            .unwrap();
        store
            .insert_process(&test_fixtures::process(10, 1, "dispense"))
            .unwrap();
        store
            .insert_process(&test_fixtures::process(11, 1, "measure"))
            .unwrap();
        store
            .insert_operation(&test_fixtures::operation(100, 10, Some("dispensing 5ul")))
            .unwrap();
        store
            .insert_operation(&test_fixtures::operation(101, 10, None))
            .unwrap();
        store
            .insert_operation(&test_fixtures::operation(200, 11, Some("od600 0.42")))
            .unwrap();
        store
    }

    #[test]
    fn test_list_top_level() {
        let store = seeded_store();
        let backend = DbBackend::new(&store);

        let items = backend.list(1, "").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path, "processes/");
        assert_eq!(items[0].kind, ContentKind::Directory);
    }

    #[test]
    fn test_list_leaf_directory() {
        let store = seeded_store();
        let backend = DbBackend::new(&store);

        let items = backend
            .list(1, "processes/dispense/operations/100/")
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path, "processes/dispense/operations/100/log.txt");
        assert_eq!(items[0].size, Some("dispensing 5ul".len() as u64));
        assert_eq!(items[0].source, ContentSource::Database);
    }

    #[test]
    fn test_logless_operation_not_listed() {
        let store = seeded_store();
        let backend = DbBackend::new(&store);

        let items = backend.list(1, "processes/dispense/operations/").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].path, "processes/dispense/operations/100/");
    }

    #[test]
    fn test_load_roundtrip() {
        let store = seeded_store();
        let backend = DbBackend::new(&store);

        let bytes = backend
            .load(1, "processes/measure/operations/200/log.txt")
            .unwrap()
            .unwrap();
        assert_eq!(bytes, b"od600 0.42");

        assert!(backend.load(1, "processes/measure/nope").unwrap().is_none());
    }
}
