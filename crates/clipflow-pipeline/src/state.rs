//! Working state threaded through the executors.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use clipflow_checkpoint::SubjectId;
use clipflow_models::{PlatformQueue, Segment, SelectedSegment};

/// Output of the analysis collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Candidate segments as reported by the analyzer
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// In-memory state of one linear pipeline run.
///
/// Stages read what earlier stages produced from here. On resume the
/// executor rebuilds it from the checkpoint payloads of completed stages.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub video_path: PathBuf,
    pub subject: SubjectId,
    pub frames: Vec<PathBuf>,
    /// Set once analysis ran (even if it found nothing)
    pub analysis: Option<Analysis>,
    pub segments: Vec<SelectedSegment>,
    pub report_path: Option<PathBuf>,
    /// First stage failure of the run
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(video_path: impl AsRef<Path>) -> Self {
        let video_path = video_path.as_ref().to_path_buf();
        Self {
            subject: SubjectId::from_video_path(&video_path),
            video_path,
            frames: Vec::new(),
            analysis: None,
            segments: Vec::new(),
            report_path: None,
            error: None,
        }
    }

    /// Use an explicit subject instead of the one derived from the path.
    pub fn with_subject(mut self, subject: SubjectId) -> Self {
        self.subject = subject;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// State owned by exactly one graph node at a time.
///
/// Nodes receive it by value and hand it back, so there is never more than
/// one writer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowState {
    pub video_path: PathBuf,
    pub subject: SubjectId,
    /// Staging directory holding extracted frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames_dir: Option<PathBuf>,
    #[serde(default)]
    pub frame_paths: Vec<PathBuf>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_summary: Option<String>,
    #[serde(default)]
    pub selected: Vec<SelectedSegment>,
    #[serde(default)]
    pub platform_content: PlatformQueue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Last node that ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    /// Worker nodes that completed, in order
    #[serde(default)]
    pub stages_completed: Vec<String>,
}

impl WorkflowState {
    pub fn new(video_path: impl AsRef<Path>) -> Self {
        let video_path = video_path.as_ref().to_path_buf();
        Self {
            subject: SubjectId::from_video_path(&video_path),
            video_path,
            ..Default::default()
        }
    }

    pub fn with_subject(mut self, subject: SubjectId) -> Self {
        self.subject = subject;
        self
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Record a completed worker node once.
    pub fn complete(&mut self, node: &str) {
        self.current_stage = Some(node.to_string());
        if !self.stages_completed.iter().any(|s| s == node) {
            self.stages_completed.push(node.to_string());
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}
