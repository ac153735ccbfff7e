//! Domain models for laboratory run data.
//!
//! These models mirror the entities of the relational store (read-only from
//! this crate) plus the ephemeral types introduced by the export subsystem.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage backend holding a run's artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Object storage (bucket-addressed).
    S3,
    /// Local disk under the configured data root.
    Local,
    /// Local disk plus inline database fields.
    Hybrid,
    /// Mode column missing or unrecognized.
    Unknown,
}

impl StorageMode {
    /// Parse from the string column value; anything unrecognized is `Unknown`.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("s3") => Self::S3,
            Some("local") => Self::Local,
            Some("hybrid") => Self::Hybrid,
            _ => Self::Unknown,
        }
    }

    /// String form as stored in the `runs.storage_mode` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Local => "local",
            Self::Hybrid => "hybrid",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a process port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Input,
    Output,
}

impl PortType {
    /// Parse from the string column value.
    pub fn parse(value: &str) -> std::result::Result<Self, String> {
        match value {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            other => Err(format!("unknown port type: {other}")),
        }
    }

    /// String form as stored in the `ports.port_type` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// One top-level tracked experiment execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub project_id: Option<i64>,
    pub file_name: Option<String>,
    pub checksum: Option<String>,
    pub user_id: Option<i64>,
    pub added_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    /// Backend-specific address (bucket prefix or directory name).
    pub storage_address: Option<String>,
    pub storage_mode: StorageMode,
    /// Soft-delete marker; set runs are excluded from routine listing but
    /// remain exportable.
    pub deleted_at: Option<DateTime<Utc>>,
    pub display_visible: bool,
}

/// A named unit of work within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub id: i64,
    /// Unique within a run (used for connection resolution).
    pub name: String,
    pub run_id: i64,
    pub storage_address: Option<String>,
    pub process_type: Option<String>,
}

/// A step within a process; `parent_id` forms a tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: i64,
    pub process_id: i64,
    pub name: Option<String>,
    pub parent_id: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub storage_address: Option<String>,
    pub is_transport: bool,
    pub is_data: bool,
    /// Inline log text; may be large, exposed as a synthetic virtual file.
    pub log: Option<String>,
}

impl Operation {
    /// Whether this operation carries inline log text worth exposing.
    #[must_use]
    pub fn has_log(&self) -> bool {
        self.log.as_ref().is_some_and(|l| !l.is_empty())
    }
}

/// A directed connection between two processes of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub run_id: i64,
    pub from_id: i64,
    pub to_id: i64,
}

/// An input or output port on a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: i64,
    pub process_id: i64,
    pub port_name: String,
    pub port_type: PortType,
    pub data_type: Option<String>,
    pub position: Option<i64>,
    pub is_required: bool,
    pub default_value: Option<String>,
    pub description: Option<String>,
}

/// Kind of entry in a virtual-path listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Directory,
}

/// Backend that services a given content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    S3,
    Local,
    Database,
    Unknown,
}

impl ContentSource {
    /// String tag used in listings and collector output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Local => "local",
            Self::Database => "database",
            Self::Unknown => "unknown",
        }
    }
}

/// One entry of a virtual-path listing.
///
/// Directory paths always terminate with `/`. Path uniqueness within one
/// listing is guaranteed by the access layer, not re-validated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Virtual forward-slash path relative to the run root.
    pub path: String,
    /// Size in bytes where the backend knows it.
    pub size: Option<u64>,
    pub source: ContentSource,
}

impl ContentItem {
    /// Create a file entry.
    #[must_use]
    pub fn file(path: impl Into<String>, size: Option<u64>, source: ContentSource) -> Self {
        Self {
            kind: ContentKind::File,
            path: path.into(),
            size,
            source,
        }
    }

    /// Create a directory entry, ensuring the trailing slash.
    #[must_use]
    pub fn directory(path: impl Into<String>, source: ContentSource) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            kind: ContentKind::Directory,
            path,
            size: None,
            source,
        }
    }
}

/// Flat collector output: one file reachable under a run's virtual namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    pub path: String,
    /// Unknown sizes count as zero for estimation.
    pub size: u64,
    pub source: ContentSource,
}

/// Backend summary returned by the storage-info operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    pub run_id: i64,
    pub storage_mode: StorageMode,
    pub storage_address: Option<String>,
    /// Top-level entry count of the run's virtual namespace.
    pub entry_count: usize,
}

/// Arena-style index over a process's operation tree.
///
/// Operations self-reference through `parent_id`; traversal walks by repeated
/// id lookup rather than pointer-following, so the tree never materializes as
/// in-memory cycles.
#[derive(Debug, Default)]
pub struct OperationArena {
    by_id: HashMap<i64, Operation>,
    children: HashMap<i64, Vec<i64>>,
    roots: Vec<i64>,
}

impl OperationArena {
    /// Build the arena from a flat operation list.
    ///
    /// An operation whose parent id does not resolve within the list is
    /// treated as a root.
    #[must_use]
    pub fn build(operations: Vec<Operation>) -> Self {
        let ids: std::collections::HashSet<i64> = operations.iter().map(|op| op.id).collect();

        let mut arena = Self::default();
        for op in operations {
            match op.parent_id {
                Some(parent) if ids.contains(&parent) => {
                    arena.children.entry(parent).or_default().push(op.id);
                }
                _ => arena.roots.push(op.id),
            }
            arena.by_id.insert(op.id, op);
        }
        arena.roots.sort_unstable();
        for siblings in arena.children.values_mut() {
            siblings.sort_unstable();
        }
        arena
    }

    /// Look up an operation by id.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Operation> {
        self.by_id.get(&id)
    }

    /// Root operation ids in ascending order.
    #[must_use]
    pub fn roots(&self) -> &[i64] {
        &self.roots
    }

    /// Direct children of an operation, ascending by id.
    #[must_use]
    pub fn children(&self, id: i64) -> &[i64] {
        self.children.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Depth-first traversal order over all operations.
    #[must_use]
    pub fn depth_first(&self) -> Vec<i64> {
        let mut order = Vec::with_capacity(self.by_id.len());
        let mut stack: Vec<i64> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.children(id).iter().rev() {
                stack.push(*child);
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(id: i64, parent: Option<i64>) -> Operation {
        Operation {
            id,
            process_id: 1,
            name: Some(format!("op{id}")),
            parent_id: parent,
            started_at: None,
            finished_at: None,
            status: None,
            storage_address: None,
            is_transport: false,
            is_data: false,
            log: None,
        }
    }

    #[test]
    fn test_storage_mode_parse() {
        assert_eq!(StorageMode::parse(Some("s3")), StorageMode::S3);
        assert_eq!(StorageMode::parse(Some("local")), StorageMode::Local);
        assert_eq!(StorageMode::parse(Some("hybrid")), StorageMode::Hybrid);
        assert_eq!(StorageMode::parse(Some("weird")), StorageMode::Unknown);
        assert_eq!(StorageMode::parse(None), StorageMode::Unknown);
    }

    #[test]
    fn test_directory_item_slash_terminated() {
        let item = ContentItem::directory("processes", ContentSource::Local);
        assert_eq!(item.path, "processes/");

        let already = ContentItem::directory("processes/", ContentSource::Local);
        assert_eq!(already.path, "processes/");
    }

    #[test]
    fn test_arena_depth_first_order() {
        // 1 -> (2 -> 4, 3), 5 standalone
        let arena = OperationArena::build(vec![
            op(5, None),
            op(1, None),
            op(3, Some(1)),
            op(2, Some(1)),
            op(4, Some(2)),
        ]);

        assert_eq!(arena.roots(), &[1, 5]);
        assert_eq!(arena.depth_first(), vec![1, 2, 4, 3, 5]);
    }

    #[test]
    fn test_arena_dangling_parent_is_root() {
        let arena = OperationArena::build(vec![op(7, Some(99))]);
        assert_eq!(arena.roots(), &[7]);
        assert!(arena.get(7).is_some());
    }
}
