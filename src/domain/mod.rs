//! Domain layer - core entities and error types.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (DB, IO, etc.).

pub mod error;
pub mod manifest;
pub mod models;
#[cfg(test)]
pub mod test_fixtures;

pub use error::{ExportError, Result};
pub use manifest::{
    BatchEstimate, BatchManifest, DumpManifest, DumpStats, Preview, PreviewEncoding, RunError,
    RunEstimateDetail, RunStats, MAX_BATCH_SIZE,
};
pub use models::{
    CollectedFile, ContentItem, ContentKind, ContentSource, Edge, Operation, OperationArena, Port,
    PortType, Process, Run, StorageInfo, StorageMode,
};
