//! Shared fixture constructors for unit tests.

use crate::domain::{Edge, Operation, Port, PortType, Process, Run, StorageMode};

/// A minimal run row with the given id and storage mode.
#[must_use]
pub fn run(id: i64, storage_mode: StorageMode) -> Run {
    Run {
        id,
        project_id: Some(1),
        file_name: Some(format!("run_{id}.yaml")),
        checksum: None,
        user_id: Some(1),
        added_at: None,
        started_at: None,
        finished_at: None,
        status: Some("finished".to_string()),
        storage_address: Some(format!("run_{id}")),
        storage_mode,
        deleted_at: None,
        display_visible: true,
    }
}

/// A process row belonging to `run_id`.
#[must_use]
pub fn process(id: i64, run_id: i64, name: &str) -> Process {
    Process {
        id,
        name: name.to_string(),
        run_id,
        storage_address: None,
        process_type: Some("manual".to_string()),
    }
}

/// An operation row belonging to `process_id`, optionally carrying a log.
#[must_use]
pub fn operation(id: i64, process_id: i64, log: Option<&str>) -> Operation {
    Operation {
        id,
        process_id,
        name: Some(format!("op_{id}")),
        parent_id: None,
        started_at: None,
        finished_at: None,
        status: Some("done".to_string()),
        storage_address: None,
        is_transport: false,
        is_data: false,
        log: log.map(String::from),
    }
}

/// An edge row belonging to `run_id`.
#[must_use]
pub fn edge(id: i64, run_id: i64, from_id: i64, to_id: i64) -> Edge {
    Edge {
        id,
        run_id,
        from_id,
        to_id,
    }
}

/// A port row belonging to `process_id`.
#[must_use]
pub fn port(id: i64, process_id: i64, name: &str, port_type: PortType) -> Port {
    Port {
        id,
        process_id,
        port_name: name.to_string(),
        port_type,
        data_type: Some("string".to_string()),
        position: Some(0),
        is_required: false,
        default_value: None,
        description: None,
    }
}
