//! Worker nodes of the branching workflow.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use clipflow_media::MediaToolkit;
use clipflow_models::{select_segments, Platform, PlatformSpec};

use crate::agents::{PlatformFormatter, PlatformRouter, VideoAnalyzer};
use crate::state::WorkflowState;

use super::types::Node;

pub const EXTRACT_FRAMES: &str = "extract_frames";
pub const ANALYZE_VIDEO: &str = "analyze_video";
pub const SELECT_SEGMENTS: &str = "select_segments";
pub const ROUTE_TO_PLATFORMS: &str = "route_to_platforms";
pub const CHECK_FORMATTING: &str = "check_formatting";
pub const AGGREGATE_RESULTS: &str = "aggregate_results";

pub struct ExtractFramesNode {
    pub media: Arc<dyn MediaToolkit>,
    pub staging_dir: PathBuf,
    pub frame_rate: f64,
}

#[async_trait]
impl Node for ExtractFramesNode {
    async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        if state.has_error() {
            return state;
        }
        let dir = self
            .staging_dir
            .join(format!("{}_branching_frames", state.subject));
        // Recorded before extracting so a partial directory is still cleaned up
        state.frames_dir = Some(dir.clone());

        match self
            .media
            .extract_frames(&state.video_path, &dir, self.frame_rate)
            .await
        {
            Ok(frames) => {
                info!(subject = %state.subject, frames = frames.len(), "Frames extracted");
                state.frame_paths = frames;
                state.complete(EXTRACT_FRAMES);
            }
            Err(e) => state.fail(format!("Frame extraction failed: {}", e)),
        }
        state
    }
}

pub struct AnalyzeVideoNode {
    pub analyzer: Arc<dyn VideoAnalyzer>,
    pub context: String,
}

#[async_trait]
impl Node for AnalyzeVideoNode {
    async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        if state.has_error() {
            return state;
        }
        match self
            .analyzer
            .analyze(&state.video_path, &state.frame_paths, &self.context)
            .await
        {
            Ok(analysis) => {
                info!(subject = %state.subject, segments = analysis.segments.len(), "Video analyzed");
                state.segments = analysis.segments;
                state.analysis_summary = analysis.summary;
                state.complete(ANALYZE_VIDEO);
            }
            Err(e) => state.fail(format!("Video analysis failed: {}", e)),
        }
        state
    }
}

pub struct SelectSegmentsNode;

#[async_trait]
impl Node for SelectSegmentsNode {
    async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        if state.has_error() {
            return state;
        }
        state.selected = select_segments(&state.segments);
        info!(
            subject = %state.subject,
            candidates = state.segments.len(),
            selected = state.selected.len(),
            "Segments selected"
        );
        state.complete(SELECT_SEGMENTS);
        state
    }
}

pub struct RouteNode {
    pub router: Arc<dyn PlatformRouter>,
    pub specs: Vec<PlatformSpec>,
}

#[async_trait]
impl Node for RouteNode {
    async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        if state.has_error() {
            return state;
        }
        match self.router.route(&state.selected, &self.specs).await {
            Ok(queue) => {
                for platform in Platform::ALL {
                    let routed = queue.items(*platform).len();
                    if routed > 0 {
                        info!(subject = %state.subject, platform = %platform, routed, "Routed");
                    }
                }
                state.platform_content = queue;
                state.complete(ROUTE_TO_PLATFORMS);
            }
            Err(e) => state.fail(format!("Routing failed: {}", e)),
        }
        state
    }
}

/// Convergence point. Does no work; its outgoing decision picks the next branch.
pub struct CheckFormattingNode;

#[async_trait]
impl Node for CheckFormattingNode {
    async fn run(&self, state: WorkflowState) -> WorkflowState {
        state
    }
}

/// Formats the items routed to one platform.
///
/// Only this platform's items change, and every one of them leaves
/// `pending_format`, so the check node never sends control here twice for
/// the same work.
pub struct PlatformNode {
    pub platform: Platform,
    pub formatter: Arc<dyn PlatformFormatter>,
}

#[async_trait]
impl Node for PlatformNode {
    async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        if state.has_error() || !state.platform_content.has_pending(self.platform) {
            return state;
        }

        let items = state.platform_content.take(self.platform);
        let pending = items
            .iter()
            .filter(|i| i.processing_status.is_pending_format())
            .count();
        info!(subject = %state.subject, platform = %self.platform, pending, "Formatting");

        match self
            .formatter
            .format(self.platform, &state.video_path, items.clone())
            .await
        {
            Ok(mut formatted) => {
                for item in formatted
                    .iter_mut()
                    .filter(|i| i.processing_status.is_pending_format())
                {
                    item.fail("formatter left item unformatted");
                }
                state.platform_content.insert(self.platform, formatted);
                state.complete(self.platform.as_str());
            }
            Err(e) => {
                let mut items = items;
                for item in items
                    .iter_mut()
                    .filter(|i| i.processing_status.is_pending_format())
                {
                    item.fail(e.to_string());
                }
                state.platform_content.insert(self.platform, items);
                state.fail(format!("Formatting failed for {}: {}", self.platform, e));
            }
        }
        state
    }
}

/// Releases staging resources. Runs once per routed run, error or not.
pub struct AggregateNode;

#[async_trait]
impl Node for AggregateNode {
    async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        if let Some(dir) = state.frames_dir.take() {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => info!(dir = %dir.display(), "Removed staging frames"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(dir = %dir.display(), "Failed to remove staging frames: {}", e);
                    state.frames_dir = Some(dir);
                }
            }
        }

        let total = state.platform_content.total();
        let pending: usize = Platform::ALL
            .iter()
            .map(|p| state.platform_content.pending_count(*p))
            .sum();
        info!(
            subject = %state.subject,
            total,
            pending,
            error = state.error.as_deref().unwrap_or(""),
            "Results aggregated"
        );
        state.complete(AGGREGATE_RESULTS);
        state
    }
}
