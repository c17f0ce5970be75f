//! Typed stage payloads.
//!
//! Checkpoints store stage output as opaque JSON. Every payload carries a
//! `kind` tag so it decodes back into the same variant on resume.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use clipflow_models::{select_segments, Segment, SelectedSegment};

use crate::error::{PipelineError, PipelineResult};
use crate::state::{Analysis, PipelineState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StagePayload {
    Frames {
        frames: Vec<PathBuf>,
    },
    Analysis {
        segments: Vec<Segment>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        /// Analysis also performed segment selection
        #[serde(default)]
        combined: bool,
    },
    Segments {
        segments: Vec<SelectedSegment>,
    },
    Report {
        report_path: PathBuf,
    },
}

impl StagePayload {
    pub fn to_value(&self) -> PipelineResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: &Value) -> PipelineResult<Self> {
        Self::deserialize(value).map_err(|e| PipelineError::Payload(e.to_string()))
    }

    /// Restore the artifacts this payload describes into the working state.
    pub fn apply_to(self, state: &mut PipelineState) {
        match self {
            StagePayload::Frames { frames } => state.frames = frames,
            StagePayload::Analysis {
                segments,
                summary,
                combined,
            } => {
                if combined {
                    state.segments = select_segments(&segments);
                }
                state.analysis = Some(Analysis { segments, summary });
            }
            StagePayload::Segments { segments } => state.segments = segments,
            StagePayload::Report { report_path } => state.report_path = Some(report_path),
        }
    }
}
