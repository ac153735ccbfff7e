//! Metadata snapshot exporter.
//!
//! Serializes one run's relational subgraph (run, processes, operations,
//! edges, ports) into a self-contained SQLite file that opens without any
//! reference to the live service. Booleans are encoded 0/1, timestamps as
//! ISO-8601 strings or NULL, foreign keys as plain integer columns.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tempfile::Builder;

use crate::domain::{ExportError, Result};
use crate::infrastructure::MetadataStore;

/// Row counts written to a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotStats {
    pub process_count: usize,
    pub operation_count: usize,
    pub edge_count: usize,
    pub port_count: usize,
}

/// Write a run's metadata snapshot to `dest`.
///
/// Scope: exactly one `runs` row, the run's processes, operations and ports
/// of those processes, and the run's edges.
///
/// # Errors
/// Returns `NotFound` if the run does not exist, or a database error if
/// reading or writing fails.
pub fn write_snapshot(store: &MetadataStore, run_id: i64, dest: &Path) -> Result<SnapshotStats> {
    let run = store
        .run(run_id)?
        .ok_or_else(|| ExportError::not_found(format!("Run {run_id} not found")))?;

    let conn = Connection::open(dest).map_err(ExportError::database)?;

    conn.execute_batch(
        r"
        CREATE TABLE runs (
            id INTEGER PRIMARY KEY,
            project_id INTEGER,
            file_name TEXT,
            checksum TEXT,
            user_id INTEGER,
            added_at TEXT,
            started_at TEXT,
            finished_at TEXT,
            status TEXT,
            storage_address TEXT,
            storage_mode TEXT,
            deleted_at TEXT,
            display_visible INTEGER
        );

        CREATE TABLE processes (
            id INTEGER PRIMARY KEY,
            name TEXT,
            run_id INTEGER,
            storage_address TEXT,
            process_type TEXT,
            FOREIGN KEY (run_id) REFERENCES runs(id)
        );

        CREATE TABLE operations (
            id INTEGER PRIMARY KEY,
            process_id INTEGER,
            name TEXT,
            parent_id INTEGER,
            started_at TEXT,
            finished_at TEXT,
            status TEXT,
            storage_address TEXT,
            is_transport INTEGER,
            is_data INTEGER,
            log TEXT,
            FOREIGN KEY (process_id) REFERENCES processes(id)
        );

        CREATE TABLE edges (
            id INTEGER PRIMARY KEY,
            run_id INTEGER,
            from_id INTEGER,
            to_id INTEGER,
            FOREIGN KEY (run_id) REFERENCES runs(id)
        );

        CREATE TABLE ports (
            id INTEGER PRIMARY KEY,
            process_id INTEGER,
            port_name TEXT,
            port_type TEXT,
            data_type TEXT,
            position INTEGER,
            is_required INTEGER,
            default_value TEXT,
            description TEXT,
            FOREIGN KEY (process_id) REFERENCES processes(id)
        );
        ",
    )
    .map_err(ExportError::database)?;

    conn.execute(
        "INSERT INTO runs VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            run.id,
            run.project_id,
            run.file_name,
            run.checksum,
            run.user_id,
            run.added_at.map(|dt| dt.to_rfc3339()),
            run.started_at.map(|dt| dt.to_rfc3339()),
            run.finished_at.map(|dt| dt.to_rfc3339()),
            run.status,
            run.storage_address,
            run.storage_mode.as_str(),
            run.deleted_at.map(|dt| dt.to_rfc3339()),
            i64::from(run.display_visible),
        ],
    )
    .map_err(ExportError::database)?;

    let processes = store.processes_for_run(run_id)?;
    let process_ids: Vec<i64> = processes.iter().map(|p| p.id).collect();

    for p in &processes {
        conn.execute(
            "INSERT INTO processes VALUES (?1, ?2, ?3, ?4, ?5)",
            params![p.id, p.name, p.run_id, p.storage_address, p.process_type],
        )
        .map_err(ExportError::database)?;
    }

    let operations = store.operations_for_processes(&process_ids)?;
    for op in &operations {
        conn.execute(
            "INSERT INTO operations VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                op.id,
                op.process_id,
                op.name,
                op.parent_id,
                op.started_at.map(|dt| dt.to_rfc3339()),
                op.finished_at.map(|dt| dt.to_rfc3339()),
                op.status,
                op.storage_address,
                i64::from(op.is_transport),
                i64::from(op.is_data),
                op.log,
            ],
        )
        .map_err(ExportError::database)?;
    }

    let ports = store.ports_for_processes(&process_ids)?;
    for port in &ports {
        conn.execute(
            "INSERT INTO ports VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                port.id,
                port.process_id,
                port.port_name,
                port.port_type.as_str(),
                port.data_type,
                port.position,
                i64::from(port.is_required),
                port.default_value,
                port.description,
            ],
        )
        .map_err(ExportError::database)?;
    }

    let edges = store.edges_for_run(run_id)?;
    for e in &edges {
        conn.execute(
            "INSERT INTO edges VALUES (?1, ?2, ?3, ?4)",
            params![e.id, e.run_id, e.from_id, e.to_id],
        )
        .map_err(ExportError::database)?;
    }

    Ok(SnapshotStats {
        process_count: processes.len(),
        operation_count: operations.len(),
        edge_count: edges.len(),
        port_count: ports.len(),
    })
}

/// Produce a snapshot as in-memory bytes (batch path).
///
/// The temporary file backing the snapshot is released on every exit path,
/// success or failure, before the bytes are returned.
///
/// # Errors
/// Returns `NotFound` for an unknown run, or database/IO errors.
pub fn snapshot_bytes(store: &MetadataStore, run_id: i64) -> Result<Vec<u8>> {
    let temp = Builder::new()
        .prefix(&format!("run_{run_id}_"))
        .suffix(".db")
        .tempfile()
        .map_err(|e| ExportError::io("Failed to create snapshot temp file", e))?;

    // Drop of `temp` deletes the file even if the snapshot write fails
    write_snapshot(store, run_id, temp.path())?;

    let bytes = std::fs::read(temp.path())
        .map_err(|e| ExportError::io("Failed to read snapshot bytes", e))?;

    tracing::info!(run_id, size = bytes.len(), "Created metadata snapshot");

    Ok(bytes)
}

/// Produce a snapshot file and hand its path to the caller (single-run path).
///
/// Ownership of the uniquely named file transfers to the caller, who is
/// responsible for deleting or persisting it. The original service leaked
/// this file silently after responding; the explicit handoff here is the
/// deliberate replacement for that behavior.
///
/// # Errors
/// Returns `NotFound` for an unknown run, or database/IO errors.
pub fn snapshot_to_file(store: &MetadataStore, run_id: i64) -> Result<PathBuf> {
    let temp = Builder::new()
        .prefix(&format!("run_{run_id}_"))
        .suffix(".db")
        .tempfile()
        .map_err(|e| ExportError::io("Failed to create snapshot temp file", e))?;

    write_snapshot(store, run_id, temp.path())?;

    let (_, path) = temp
        .keep()
        .map_err(|e| ExportError::io("Failed to persist snapshot file", e.error))?;

    tracing::info!(run_id, path = %path.display(), "Created metadata snapshot file");

    Ok(path)
}
