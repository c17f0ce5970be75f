//! JSON run reports.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use clipflow_checkpoint::fs_utils;
use clipflow_models::{Platform, PlatformContent, SelectedSegment};

use crate::error::PipelineResult;
use crate::state::{PipelineState, WorkflowState};

/// One selected segment as shown in a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSegment {
    pub start: String,
    pub end: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub description: String,
    pub engagement_prediction: f64,
    pub selection_reason: String,
    pub content_category: String,
    pub target_platforms: Vec<Platform>,
}

impl From<&SelectedSegment> for ReportSegment {
    fn from(selected: &SelectedSegment) -> Self {
        Self {
            start: selected.segment.start_time_str(),
            end: selected.segment.end_time_str(),
            start_time: selected.segment.start_time,
            end_time: selected.segment.end_time,
            duration: selected.duration(),
            description: selected.description().to_string(),
            engagement_prediction: selected.engagement_prediction,
            selection_reason: selected.selection_reason.clone(),
            content_category: selected.content_category.as_str().to_string(),
            target_platforms: selected.target_platforms.clone(),
        }
    }
}

/// Report of a linear pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub subject: String,
    pub video_path: String,
    /// RFC 3339
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub segment_count: usize,
    pub segments: Vec<ReportSegment>,
}

impl PipelineReport {
    pub fn from_state(state: &PipelineState) -> Self {
        Self {
            subject: state.subject.to_string(),
            video_path: state.video_path.display().to_string(),
            generated_at: Utc::now().to_rfc3339(),
            summary: state.analysis.as_ref().and_then(|a| a.summary.clone()),
            segment_count: state.segments.len(),
            segments: state.segments.iter().map(ReportSegment::from).collect(),
        }
    }
}

/// Report of a branching run: what each platform received.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformReport {
    pub subject: String,
    pub video_path: String,
    pub generated_at: String,
    pub stages_completed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub selected: Vec<ReportSegment>,
    pub platforms: BTreeMap<Platform, Vec<PlatformContent>>,
}

impl PlatformReport {
    pub fn from_state(state: &WorkflowState) -> Self {
        Self {
            subject: state.subject.to_string(),
            video_path: state.video_path.display().to_string(),
            generated_at: Utc::now().to_rfc3339(),
            stages_completed: state.stages_completed.clone(),
            error: state.error.clone(),
            selected: state.selected.iter().map(ReportSegment::from).collect(),
            platforms: state
                .platform_content
                .iter()
                .map(|(platform, items)| (*platform, items.clone()))
                .collect(),
        }
    }
}

/// Write `report` as pretty JSON, creating parent directories.
pub async fn write_report(path: &Path, report: &impl Serialize) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(report)?;
    fs_utils::write_atomic(path, &bytes).await?;
    Ok(())
}
