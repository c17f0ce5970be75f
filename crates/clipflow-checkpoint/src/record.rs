//! The durable checkpoint record.
//!
//! On disk a record looks like:
//!
//! ```json
//! {
//!   "video_path": "input/talk.mp4",
//!   "current_stage": 2,
//!   "stages_completed": [0, 1],
//!   "stage_names": {"0": {"name": "extract_frames", "description": "..."}},
//!   "data": {"0": {"kind": "frames", "frames": ["..."]}},
//!   "metadata": {"start_time": 1700000000, "last_updated": 1700000042, "version": "1.0"},
//!   "errors": []
//! }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::registry::StageInfo;
use crate::subject::SubjectId;

/// Checkpoint file format version.
pub const FORMAT_VERSION: &str = "1.0";

/// Record timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Epoch seconds when the record was created
    pub start_time: i64,
    /// Epoch seconds of the last save
    pub last_updated: i64,
    pub version: String,
}

impl CheckpointMetadata {
    fn now() -> Self {
        let now = Utc::now().timestamp();
        Self {
            start_time: now,
            last_updated: now,
            version: FORMAT_VERSION.to_string(),
        }
    }
}

/// One entry of the append-only error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub stage: usize,
    pub stage_name: String,
    /// Epoch seconds
    pub timestamp: i64,
    pub message: String,
    pub was_recovered: bool,
}

/// Durable progress of one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Set by the store when the record is opened; not persisted.
    #[serde(skip)]
    pub(crate) subject: SubjectId,
    pub video_path: String,
    /// Index of the next stage to execute
    pub current_stage: usize,
    pub stages_completed: BTreeSet<usize>,
    pub stage_names: BTreeMap<usize, StageInfo>,
    /// Opaque per-stage payloads
    pub data: BTreeMap<usize, Value>,
    pub metadata: CheckpointMetadata,
    pub errors: Vec<ErrorEntry>,
}

impl CheckpointRecord {
    /// Create an empty record for a subject.
    pub fn fresh(subject: SubjectId, video_path: impl Into<String>) -> Self {
        Self {
            subject,
            video_path: video_path.into(),
            current_stage: 0,
            stages_completed: BTreeSet::new(),
            stage_names: BTreeMap::new(),
            data: BTreeMap::new(),
            metadata: CheckpointMetadata::now(),
            errors: Vec::new(),
        }
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn is_stage_completed(&self, index: usize) -> bool {
        self.stages_completed.contains(&index)
    }

    pub fn stage_data(&self, index: usize) -> Option<&Value> {
        self.data.get(&index)
    }

    /// The resume point.
    pub fn next_stage(&self) -> usize {
        self.current_stage
    }

    /// Registered name of a stage, or `Stage <i>` when unknown.
    pub fn stage_name(&self, index: usize) -> String {
        self.stage_names
            .get(&index)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| format!("Stage {}", index))
    }

    /// Completed stages labelled as `<i> (<name>)`, ascending.
    pub fn completed_labels(&self) -> Vec<String> {
        self.stages_completed
            .iter()
            .map(|i| format!("{} ({})", i, self.stage_name(*i)))
            .collect()
    }

    /// Record a stage as done.
    ///
    /// Registers the name if unseen, inserts the index once, stores the
    /// payload when given, and advances the resume point to
    /// `max(current_stage, index + 1)`. Gaps below the index are left alone.
    pub fn mark_stage_complete(&mut self, index: usize, name: &str, data: Option<Value>) {
        self.stage_names.entry(index).or_insert_with(|| StageInfo {
            name: name.to_string(),
            description: String::new(),
        });
        self.stages_completed.insert(index);
        self.current_stage = self.current_stage.max(index + 1);
        if let Some(data) = data {
            self.data.insert(index, data);
        }
    }

    /// Append to the error log.
    pub fn push_error(&mut self, stage: usize, stage_name: &str, message: &str, recovered: bool) {
        self.errors.push(ErrorEntry {
            stage,
            stage_name: stage_name.to_string(),
            timestamp: Utc::now().timestamp(),
            message: message.to_string(),
            was_recovered: recovered,
        });
    }

    /// A fresh record for the same subject that keeps the stage names.
    pub fn cleared(&self) -> Self {
        let mut fresh = Self::fresh(self.subject.clone(), self.video_path.clone());
        fresh.stage_names = self.stage_names.clone();
        fresh
    }

    pub(crate) fn touch(&mut self) {
        self.metadata.last_updated = Utc::now().timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> CheckpointRecord {
        CheckpointRecord::fresh(SubjectId::new("demo"), "demo.mp4")
    }

    #[test]
    fn test_fresh_record() {
        let r = record();
        assert_eq!(r.current_stage, 0);
        assert!(r.stages_completed.is_empty());
        assert_eq!(r.metadata.version, FORMAT_VERSION);
        assert_eq!(r.metadata.start_time, r.metadata.last_updated);
    }

    #[test]
    fn test_mark_stage_complete_is_idempotent() {
        let mut r = record();
        r.mark_stage_complete(0, "extract", Some(json!({"frames": 3})));
        r.mark_stage_complete(0, "extract", None);
        assert_eq!(r.stages_completed.iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(r.current_stage, 1);
        // Payload is kept when a repeat call carries none
        assert_eq!(r.stage_data(0), Some(&json!({"frames": 3})));
    }

    #[test]
    fn test_current_stage_tracks_max_seen_plus_one() {
        // Exhaustive over short index sequences
        let sequences: Vec<Vec<usize>> = vec![
            vec![0, 1, 2, 3],
            vec![2, 0, 1],
            vec![3, 3, 1, 0],
            vec![1, 4, 2, 4, 0],
            vec![5],
            vec![0, 2, 1, 2, 0],
        ];
        for seq in sequences {
            let mut r = record();
            let mut seen = Vec::new();
            for index in seq {
                r.mark_stage_complete(index, "stage", None);
                seen.push(index);
                let max = *seen.iter().max().unwrap();
                assert_eq!(r.next_stage(), max + 1, "after {:?}", seen);

                let completed: Vec<usize> = r.stages_completed.iter().copied().collect();
                let mut expected = seen.clone();
                expected.sort_unstable();
                expected.dedup();
                assert_eq!(completed, expected);
            }
        }
    }

    #[test]
    fn test_stage_name_fallback_and_labels() {
        let mut r = record();
        r.mark_stage_complete(2, "detect", None);
        r.stages_completed.insert(5);
        assert_eq!(r.stage_name(2), "detect");
        assert_eq!(r.stage_name(7), "Stage 7");
        assert_eq!(r.completed_labels(), vec!["2 (detect)", "5 (Stage 5)"]);
    }

    #[test]
    fn test_first_registered_name_wins() {
        let mut r = record();
        r.mark_stage_complete(1, "analyze", None);
        r.mark_stage_complete(1, "renamed", None);
        assert_eq!(r.stage_name(1), "analyze");
    }

    #[test]
    fn test_json_shape() {
        let mut r = record();
        r.mark_stage_complete(0, "extract", Some(json!({"kind": "frames"})));
        r.push_error(1, "analyze", "upstream unavailable", false);

        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["video_path"], "demo.mp4");
        assert_eq!(value["current_stage"], 1);
        assert_eq!(value["stages_completed"], json!([0]));
        assert_eq!(value["stage_names"]["0"]["name"], "extract");
        assert_eq!(value["data"]["0"]["kind"], "frames");
        assert_eq!(value["metadata"]["version"], "1.0");
        assert_eq!(value["errors"][0]["stage"], 1);
        assert_eq!(value["errors"][0]["was_recovered"], false);
        assert!(value.get("subject").is_none());

        let back: CheckpointRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.stages_completed, r.stages_completed);
        assert_eq!(back.errors, r.errors);
    }

    #[test]
    fn test_cleared_keeps_names_only() {
        let mut r = record();
        r.mark_stage_complete(0, "extract", Some(json!(1)));
        r.push_error(1, "analyze", "boom", false);
        let cleared = r.cleared();
        assert_eq!(cleared.stage_names, r.stage_names);
        assert_eq!(cleared.current_stage, 0);
        assert!(cleared.stages_completed.is_empty());
        assert!(cleared.data.is_empty());
        assert!(cleared.errors.is_empty());
        assert_eq!(cleared.video_path, "demo.mp4");
    }
}
