//! Ingestion: staged, simulated "scan and categorize" runs over an uploaded
//! case archive.
//!
//! Only the archive's name and MIME type are inspected. Every accepted input
//! walks the same timed script: open, scan, three categorization hits, summary.

pub mod pipeline;
pub mod routes;
pub mod types;

pub use pipeline::{CompletionCallback, IngestionPipeline, IngestionRun};
pub use routes::{IngestionRouteState, SnapshotSource, ingestion_routes};
pub use types::{
    ArchiveInput, DocumentTag, IngestionPhase, IngestionReport, IngestionSnapshot, STAGE_SCRIPT,
};
