//! Infrastructure layer - external adapters (database, filesystem, backends).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod access;
pub mod config;
pub mod metadata_store;

pub use access::{DbBackend, FsBackend, HybridAccessLayer, ObjectBackend, RunAccess};
pub use config::{ensure_config_exists, load_config, load_config_from_file, ExportConfig};
pub use metadata_store::MetadataStore;
