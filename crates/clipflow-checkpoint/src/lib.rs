//! Checkpoint persistence for resumable pipelines.
//!
//! This crate provides:
//! - Subject identifiers derived from input videos
//! - The durable [`CheckpointRecord`] and its JSON file format
//! - A [`StageRegistry`] of stage names carried across resets
//! - [`CheckpointStore`] with atomic writes and bounded backup rotation
//!
//! It has no knowledge of what the stages do; stage payloads are opaque JSON.

pub mod backup;
pub mod error;
pub mod fs_utils;
pub mod record;
pub mod registry;
pub mod store;
pub mod subject;

pub use backup::{BackupKind, RESET_BACKUP_CAP};
pub use error::{CheckpointError, CheckpointResult};
pub use record::{CheckpointMetadata, CheckpointRecord, ErrorEntry, FORMAT_VERSION};
pub use registry::{StageInfo, StageRegistry};
pub use store::{
    CheckpointStore, CheckpointSummary, CleanupReport, StoreConfig, CHECKPOINT_CORRUPT_TOTAL,
    CHECKPOINT_SAVES_TOTAL,
};
pub use subject::SubjectId;
