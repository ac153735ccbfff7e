//! Read access to the service database.
//!
//! The export subsystem consumes run metadata strictly read-only; schema
//! creation below only makes a fresh database readable (create-if-missing,
//! no data migration).

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params_from_iter, Connection};

use crate::domain::{
    Edge, ExportError, Operation, Port, PortType, Process, Result, Run, StorageMode,
};

/// Repository over the `runs`/`processes`/`operations`/`edges`/`ports` tables.
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    /// Opens or creates the service database.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or schema creation fails.
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ExportError::io("Failed to create database directory", e))?;
        }

        let conn = Connection::open(path).map_err(ExportError::database)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(ExportError::database)?;

        let store = Self { conn };
        store.init_schema()?;

        Ok(store)
    }

    /// Opens an in-memory database (fixtures and tests).
    ///
    /// # Errors
    /// Returns error if schema creation fails.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(ExportError::database)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create missing tables; existing tables and data are untouched.
    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            CREATE TABLE IF NOT EXISTS runs (
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
                display_visible INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS processes (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                run_id INTEGER NOT NULL REFERENCES runs(id),
                storage_address TEXT,
                process_type TEXT
            );

            CREATE TABLE IF NOT EXISTS operations (
                id INTEGER PRIMARY KEY,
                process_id INTEGER NOT NULL REFERENCES processes(id),
                name TEXT,
                parent_id INTEGER,
                started_at TEXT,
                finished_at TEXT,
                status TEXT,
                storage_address TEXT,
                is_transport INTEGER NOT NULL DEFAULT 0,
                is_data INTEGER NOT NULL DEFAULT 0,
                log TEXT
            );

            CREATE TABLE IF NOT EXISTS edges (
                id INTEGER PRIMARY KEY,
                run_id INTEGER NOT NULL REFERENCES runs(id),
                from_id INTEGER NOT NULL,
                to_id INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ports (
                id INTEGER PRIMARY KEY,
                process_id INTEGER NOT NULL REFERENCES processes(id),
                port_name TEXT NOT NULL,
                port_type TEXT NOT NULL,
                data_type TEXT,
                position INTEGER,
                is_required INTEGER NOT NULL DEFAULT 0,
                default_value TEXT,
                description TEXT,
                UNIQUE (process_id, port_type, port_name)
            );

            CREATE INDEX IF NOT EXISTS idx_processes_run
                ON processes(run_id);
            CREATE INDEX IF NOT EXISTS idx_operations_process
                ON operations(process_id);
            CREATE INDEX IF NOT EXISTS idx_edges_run
                ON edges(run_id);
            CREATE INDEX IF NOT EXISTS idx_ports_process
                ON ports(process_id);
            ",
            )
            .map_err(ExportError::database)?;

        Ok(())
    }

    /// Fetch a single run by id.
    pub fn run(&self, run_id: i64) -> Result<Option<Run>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
            SELECT id, project_id, file_name, checksum, user_id, added_at,
                   started_at, finished_at, status, storage_address,
                   storage_mode, deleted_at, display_visible
            FROM runs WHERE id = ?1
            ",
            )
            .map_err(ExportError::database)?;

        let mut rows = stmt
            .query_map([run_id], Self::row_to_run)
            .map_err(ExportError::database)?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(ExportError::database)?)),
            None => Ok(None),
        }
    }

    /// Fetch runs whose id is in the given set.
    ///
    /// One batched `IN` lookup: duplicate ids collapse to a single row, and
    /// ids that do not resolve are silently absent from the result.
    pub fn runs_by_ids(&self, run_ids: &[i64]) -> Result<Vec<Run>> {
        if run_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; run_ids.len()].join(", ");
        let query = format!(
            r"
            SELECT id, project_id, file_name, checksum, user_id, added_at,
                   started_at, finished_at, status, storage_address,
                   storage_mode, deleted_at, display_visible
            FROM runs WHERE id IN ({placeholders})
            ORDER BY id
            "
        );

        let mut stmt = self.conn.prepare(&query).map_err(ExportError::database)?;
        let rows = stmt
            .query_map(params_from_iter(run_ids.iter()), Self::row_to_run)
            .map_err(ExportError::database)?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row.map_err(ExportError::database)?);
        }

        tracing::debug!(requested = run_ids.len(), resolved = runs.len(), "Resolved runs");

        Ok(runs)
    }

    /// Fetch processes belonging to a run, ordered by id.
    pub fn processes_for_run(&self, run_id: i64) -> Result<Vec<Process>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
            SELECT id, name, run_id, storage_address, process_type
            FROM processes WHERE run_id = ?1
            ORDER BY id
            ",
            )
            .map_err(ExportError::database)?;

        let rows = stmt
            .query_map([run_id], |row| {
                Ok(Process {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    run_id: row.get(2)?,
                    storage_address: row.get(3)?,
                    process_type: row.get(4)?,
                })
            })
            .map_err(ExportError::database)?;

        let mut processes = Vec::new();
        for row in rows {
            processes.push(row.map_err(ExportError::database)?);
        }

        Ok(processes)
    }

    /// Fetch operations belonging to any of the given processes, ordered by id.
    pub fn operations_for_processes(&self, process_ids: &[i64]) -> Result<Vec<Operation>> {
        if process_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; process_ids.len()].join(", ");
        let query = format!(
            r"
            SELECT id, process_id, name, parent_id, started_at, finished_at,
                   status, storage_address, is_transport, is_data, log
            FROM operations WHERE process_id IN ({placeholders})
            ORDER BY id
            "
        );

        let mut stmt = self.conn.prepare(&query).map_err(ExportError::database)?;
        let rows = stmt
            .query_map(params_from_iter(process_ids.iter()), |row| {
                Ok(Operation {
                    id: row.get(0)?,
                    process_id: row.get(1)?,
                    name: row.get(2)?,
                    parent_id: row.get(3)?,
                    started_at: parse_timestamp(row.get(4)?),
                    finished_at: parse_timestamp(row.get(5)?),
                    status: row.get(6)?,
                    storage_address: row.get(7)?,
                    is_transport: row.get::<_, i64>(8)? != 0,
                    is_data: row.get::<_, i64>(9)? != 0,
                    log: row.get(10)?,
                })
            })
            .map_err(ExportError::database)?;

        let mut operations = Vec::new();
        for row in rows {
            operations.push(row.map_err(ExportError::database)?);
        }

        Ok(operations)
    }

    /// Fetch ports belonging to any of the given processes, ordered by id.
    pub fn ports_for_processes(&self, process_ids: &[i64]) -> Result<Vec<Port>> {
        if process_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; process_ids.len()].join(", ");
        let query = format!(
            r"
            SELECT id, process_id, port_name, port_type, data_type, position,
                   is_required, default_value, description
            FROM ports WHERE process_id IN ({placeholders})
            ORDER BY id
            "
        );

        let mut stmt = self.conn.prepare(&query).map_err(ExportError::database)?;
        let rows = stmt
            .query_map(params_from_iter(process_ids.iter()), |row| {
                let port_type: String = row.get(3)?;
                Ok(Port {
                    id: row.get(0)?,
                    process_id: row.get(1)?,
                    port_name: row.get(2)?,
                    port_type: PortType::parse(&port_type).unwrap_or(PortType::Input),
                    data_type: row.get(4)?,
                    position: row.get(5)?,
                    is_required: row.get::<_, i64>(6)? != 0,
                    default_value: row.get(7)?,
                    description: row.get(8)?,
                })
            })
            .map_err(ExportError::database)?;

        let mut ports = Vec::new();
        for row in rows {
            ports.push(row.map_err(ExportError::database)?);
        }

        Ok(ports)
    }

    /// Fetch edges belonging to a run, ordered by id.
    pub fn edges_for_run(&self, run_id: i64) -> Result<Vec<Edge>> {
        let mut stmt = self
            .conn
            .prepare(
                r"
            SELECT id, run_id, from_id, to_id
            FROM edges WHERE run_id = ?1
            ORDER BY id
            ",
            )
            .map_err(ExportError::database)?;

        let rows = stmt
            .query_map([run_id], |row| {
                Ok(Edge {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    from_id: row.get(2)?,
                    to_id: row.get(3)?,
                })
            })
            .map_err(ExportError::database)?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row.map_err(ExportError::database)?);
        }

        Ok(edges)
    }

    /// Convert a row to a Run.
    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<Run> {
        let storage_mode: Option<String> = row.get(10)?;
        Ok(Run {
            id: row.get(0)?,
            project_id: row.get(1)?,
            file_name: row.get(2)?,
            checksum: row.get(3)?,
            user_id: row.get(4)?,
            added_at: parse_timestamp(row.get(5)?),
            started_at: parse_timestamp(row.get(6)?),
            finished_at: parse_timestamp(row.get(7)?),
            status: row.get(8)?,
            storage_address: row.get(9)?,
            storage_mode: StorageMode::parse(storage_mode.as_deref()),
            deleted_at: parse_timestamp(row.get(11)?),
            display_visible: row.get::<_, i64>(12)? != 0,
        })
    }
}

/// Parse an ISO-8601 column value, with or without timezone suffix.
fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    let value = value?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&value) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive timestamps (no offset) are stored as UTC
    NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
impl MetadataStore {
    /// Insert a run row (test fixtures only).
    pub fn insert_run(&self, run: &Run) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO runs
                (id, project_id, file_name, checksum, user_id, added_at,
                 started_at, finished_at, status, storage_address,
                 storage_mode, deleted_at, display_visible)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
                rusqlite::params![
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
        Ok(())
    }

    /// Insert a process row (test fixtures only).
    pub fn insert_process(&self, process: &Process) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO processes (id, name, run_id, storage_address, process_type)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    process.id,
                    process.name,
                    process.run_id,
                    process.storage_address,
                    process.process_type,
                ],
            )
            .map_err(ExportError::database)?;
        Ok(())
    }

    /// Insert an operation row (test fixtures only).
    pub fn insert_operation(&self, op: &Operation) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO operations
                (id, process_id, name, parent_id, started_at, finished_at,
                 status, storage_address, is_transport, is_data, log)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
                rusqlite::params![
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
        Ok(())
    }

    /// Insert an edge row (test fixtures only).
    pub fn insert_edge(&self, edge: &Edge) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO edges (id, run_id, from_id, to_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![edge.id, edge.run_id, edge.from_id, edge.to_id],
            )
            .map_err(ExportError::database)?;
        Ok(())
    }

    /// Insert a port row (test fixtures only).
    pub fn insert_port(&self, port: &Port) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO ports
                (id, process_id, port_name, port_type, data_type, position,
                 is_required, default_value, description)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
                rusqlite::params![
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
        Ok(())
    }
}
