//! Shared data models for the ClipFlow pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Analyzed and selected video segments
//! - Target platforms and their format requirements
//! - Routed platform content and its processing status
//! - Segment selection heuristics

pub mod content;
pub mod error;
pub mod platform;
pub mod segment;
pub mod selection;
pub mod timestamp;

// Re-export common types
pub use content::{FormatParams, PlatformContent, PlatformQueue, ProcessingStatus};
pub use error::{ModelError, ModelResult};
pub use platform::{AspectRatio, Platform, PlatformParseError, PlatformSpec};
pub use segment::{ContentCategory, Segment, SelectedSegment};
pub use selection::{select_segments, SELECTION_THRESHOLD};
pub use timestamp::format_mm_ss;
