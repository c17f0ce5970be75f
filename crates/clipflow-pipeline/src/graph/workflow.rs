//! The branching content workflow.
//!
//! ```text
//! extract_frames -> analyze_video -> select_segments -> route_to_platforms
//!     -> check_formatting <-> {Instagram, TikTok, LinkedIn}
//!     -> aggregate_results -> END
//! ```
//!
//! Progress is mirrored into the checkpoint store under `<subject>.branching`
//! after every node. Branching runs always start from the entry node.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

use clipflow_checkpoint::{
    CheckpointError, CheckpointRecord, CheckpointStore, StageRegistry, SubjectId,
};
use clipflow_media::MediaToolkit;
use clipflow_models::Platform;

use crate::agents::{PlatformFormatter, PlatformRouter, VideoAnalyzer};
use crate::error::GraphResult;
use crate::logging::RunLogger;
use crate::state::WorkflowState;

use super::builder::{Graph, GraphBuilder, GraphRun};
use super::decisions::{after_selection, check_formatting, continue_or_end};
use super::nodes::{
    AggregateNode, AnalyzeVideoNode, CheckFormattingNode, ExtractFramesNode, PlatformNode,
    RouteNode, SelectSegmentsNode, AGGREGATE_RESULTS, ANALYZE_VIDEO, CHECK_FORMATTING,
    EXTRACT_FRAMES, ROUTE_TO_PLATFORMS, SELECT_SEGMENTS,
};
use super::types::{GraphObserver, END};

/// Checkpoint subject suffix of branching runs.
pub const BRANCHING_SUFFIX: &str = "branching";

const LINEAR_NODES: &[(&str, &str)] = &[
    (EXTRACT_FRAMES, "Extract key frames from video"),
    (ANALYZE_VIDEO, "Analyze video for noteworthy segments"),
    (SELECT_SEGMENTS, "Score and select segments"),
    (ROUTE_TO_PLATFORMS, "Route selected segments to platforms"),
];

/// Checkpoint stage index of a worker node. The check node has none.
pub fn node_stage_index(node: &str) -> Option<usize> {
    if let Some(i) = LINEAR_NODES.iter().position(|(name, _)| *name == node) {
        return Some(i);
    }
    if let Some(i) = Platform::ALL.iter().position(|p| p.as_str() == node) {
        return Some(LINEAR_NODES.len() + i);
    }
    (node == AGGREGATE_RESULTS).then_some(LINEAR_NODES.len() + Platform::ALL.len())
}

/// Stage registry of the branching workflow.
pub fn branching_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    for (i, (name, description)) in LINEAR_NODES.iter().enumerate() {
        registry = registry.with_stage(i, *name, *description);
    }
    for (i, platform) in Platform::ALL.iter().enumerate() {
        registry = registry.with_stage(
            LINEAR_NODES.len() + i,
            platform.as_str(),
            format!("Format content for {}", platform),
        );
    }
    registry.with_stage(
        LINEAR_NODES.len() + Platform::ALL.len(),
        AGGREGATE_RESULTS,
        "Aggregate formatted content",
    )
}

/// Collaborators of the branching workflow.
pub struct WorkflowDeps {
    pub media: Arc<dyn MediaToolkit>,
    pub analyzer: Arc<dyn VideoAnalyzer>,
    pub router: Arc<dyn PlatformRouter>,
    /// One formatter per platform, in priority order
    pub formatters: Vec<(Platform, Arc<dyn PlatformFormatter>)>,
    pub staging_dir: PathBuf,
    pub frame_rate: f64,
    pub analysis_context: String,
}

pub struct BranchingWorkflow {
    graph: Graph,
    store: CheckpointStore,
}

impl BranchingWorkflow {
    /// Wire the workflow graph.
    pub fn build(deps: WorkflowDeps, store: CheckpointStore) -> GraphResult<Self> {
        let priority: Vec<Platform> = deps.formatters.iter().map(|(p, _)| *p).collect();
        let specs = priority.iter().map(Platform::spec).collect();

        let mut builder = GraphBuilder::new()
            .add_node(
                EXTRACT_FRAMES,
                Arc::new(ExtractFramesNode {
                    media: deps.media,
                    staging_dir: deps.staging_dir,
                    frame_rate: deps.frame_rate,
                }),
            )
            .add_node(
                ANALYZE_VIDEO,
                Arc::new(AnalyzeVideoNode {
                    analyzer: deps.analyzer,
                    context: deps.analysis_context,
                }),
            )
            .add_node(SELECT_SEGMENTS, Arc::new(SelectSegmentsNode))
            .add_node(
                ROUTE_TO_PLATFORMS,
                Arc::new(RouteNode {
                    router: deps.router,
                    specs,
                }),
            )
            .add_node(CHECK_FORMATTING, Arc::new(CheckFormattingNode))
            .add_node(AGGREGATE_RESULTS, Arc::new(AggregateNode))
            .set_entry(EXTRACT_FRAMES)
            .add_conditional_edges(EXTRACT_FRAMES, continue_or_end(ANALYZE_VIDEO))
            .add_conditional_edges(ANALYZE_VIDEO, continue_or_end(SELECT_SEGMENTS))
            .add_conditional_edges(SELECT_SEGMENTS, Arc::new(after_selection))
            .add_edge(ROUTE_TO_PLATFORMS, CHECK_FORMATTING)
            .add_conditional_edges(CHECK_FORMATTING, check_formatting(priority))
            .add_edge(AGGREGATE_RESULTS, END);

        for (platform, formatter) in deps.formatters {
            builder = builder
                .add_node(platform.as_str(), Arc::new(PlatformNode { platform, formatter }))
                .add_edge(platform.as_str(), CHECK_FORMATTING);
        }

        Ok(Self {
            graph: builder.build()?,
            store,
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Run the workflow for one video.
    ///
    /// Node failures are reported in the returned state; only checkpoint
    /// persistence and graph structure errors are returned as `Err`.
    pub async fn run(&self, video_path: impl AsRef<Path>) -> GraphResult<GraphRun> {
        let state = WorkflowState::new(video_path);
        let subject = state.subject.with_suffix(BRANCHING_SUFFIX);
        let logger = RunLogger::new(&subject, "branching");
        let span = logger.create_span();
        self.run_inner(state, &subject, &logger).instrument(span).await
    }

    async fn run_inner(
        &self,
        state: WorkflowState,
        subject: &SubjectId,
        logger: &RunLogger,
    ) -> GraphResult<GraphRun> {
        let video = state.video_path.display().to_string();
        let mut record = self.store.open(subject, &video).await;
        if !record.stages_completed.is_empty() || !record.errors.is_empty() {
            record = self.store.reset(&record).await?;
        }
        self.store.register(&mut record, &branching_registry()).await?;
        logger.log_start(&video);

        let mut observer = CheckpointObserver {
            store: &self.store,
            record,
            error_recorded: false,
        };
        let mut run = self.graph.invoke_observed(state, &mut observer).await?;

        // Runs that ended before aggregation still own a staging directory
        if let Some(dir) = run.state.frames_dir.take() {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    logger.log_warning(&format!(
                        "failed to remove staging frames {}: {}",
                        dir.display(),
                        e
                    ));
                }
            }
        }

        match &run.state.error {
            Some(e) => logger.log_error(e),
            None => logger.log_completion(&format!(
                "{} node visits, {} routed item(s)",
                run.path.len(),
                run.state.platform_content.total()
            )),
        }
        Ok(run)
    }
}

/// Mirrors node completions and the first error into the checkpoint.
struct CheckpointObserver<'a> {
    store: &'a CheckpointStore,
    record: CheckpointRecord,
    error_recorded: bool,
}

#[async_trait]
impl GraphObserver for CheckpointObserver<'_> {
    async fn on_node_complete(&mut self, node: &str, state: &WorkflowState) -> GraphResult<()> {
        let index = node_stage_index(node);

        if let Some(index) = index {
            let done = state.stages_completed.iter().any(|s| s == node);
            if done && !self.record.is_stage_completed(index) {
                let data = if node == AGGREGATE_RESULTS {
                    Some(serde_json::to_value(&state.platform_content).map_err(CheckpointError::from)?)
                } else {
                    None
                };
                self.store
                    .mark_stage_complete(&mut self.record, index, node, data)
                    .await?;
            }
        }

        if let (Some(message), false) = (&state.error, self.error_recorded) {
            let index = index.unwrap_or(self.record.current_stage);
            self.store
                .add_error(&mut self.record, index, node, message, false)
                .await?;
            self.error_recorded = true;
        }
        Ok(())
    }
}
