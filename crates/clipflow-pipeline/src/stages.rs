//! Linear pipeline stages.
//!
//! Each stage checks its own inputs and reports a plain error when upstream
//! data is missing; the executor does no dependency checking of its own.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use clipflow_checkpoint::SubjectId;
use clipflow_media::MediaToolkit;
use clipflow_models::select_segments;

use crate::agents::VideoAnalyzer;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::payload::StagePayload;
use crate::report::{write_report, PipelineReport};
use crate::state::PipelineState;

pub const STAGE_EXTRACT_FRAMES: usize = 0;
pub const STAGE_ANALYZE_FRAMES: usize = 1;
pub const STAGE_DETECT_SEGMENTS: usize = 2;
pub const STAGE_GENERATE_REPORT: usize = 3;

/// One unit of work in a linear pipeline.
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// Position in the pipeline. Unique per pipeline.
    fn index(&self) -> usize;

    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Run the stage against the working state and return its payload.
    async fn execute(&self, state: &mut PipelineState) -> PipelineResult<StagePayload>;

    /// Payload to record without running, when an earlier stage already
    /// produced this stage's output.
    fn already_satisfied(&self, _state: &PipelineState) -> Option<StagePayload> {
        None
    }
}

/// Collaborators and settings shared by the default stages.
pub struct StageContext {
    pub media: Arc<dyn MediaToolkit>,
    pub analyzer: Arc<dyn VideoAnalyzer>,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub frame_rate: f64,
    pub combined_analysis: bool,
    pub analysis_context: String,
}

impl StageContext {
    pub fn new(
        config: &PipelineConfig,
        media: Arc<dyn MediaToolkit>,
        analyzer: Arc<dyn VideoAnalyzer>,
    ) -> Self {
        Self {
            media,
            analyzer,
            staging_dir: config.staging_dir.clone(),
            output_dir: config.output_dir.clone(),
            frame_rate: config.frame_rate,
            combined_analysis: config.combined_analysis,
            analysis_context: config.analysis_context.clone(),
        }
    }

    pub fn frames_dir(&self, subject: &SubjectId) -> PathBuf {
        self.staging_dir.join(format!("{}_frames", subject))
    }

    pub fn report_path(&self, subject: &SubjectId) -> PathBuf {
        self.output_dir.join(format!("{}_report.json", subject))
    }
}

/// The standard four-stage pipeline.
pub fn default_stages(ctx: Arc<StageContext>) -> Vec<Box<dyn StageHandler>> {
    vec![
        Box::new(ExtractFramesStage { ctx: ctx.clone() }),
        Box::new(AnalyzeFramesStage { ctx: ctx.clone() }),
        Box::new(DetectSegmentsStage),
        Box::new(GenerateReportStage { ctx }),
    ]
}

pub struct ExtractFramesStage {
    ctx: Arc<StageContext>,
}

#[async_trait]
impl StageHandler for ExtractFramesStage {
    fn index(&self) -> usize {
        STAGE_EXTRACT_FRAMES
    }

    fn name(&self) -> &str {
        "extract_frames"
    }

    fn description(&self) -> &str {
        "Extract key frames from video"
    }

    async fn execute(&self, state: &mut PipelineState) -> PipelineResult<StagePayload> {
        let out_dir = self.ctx.frames_dir(&state.subject);
        let frames = self
            .ctx
            .media
            .extract_frames(&state.video_path, &out_dir, self.ctx.frame_rate)
            .await?;

        info!(subject = %state.subject, frames = frames.len(), "Frames extracted");
        state.frames = frames.clone();
        Ok(StagePayload::Frames { frames })
    }
}

pub struct AnalyzeFramesStage {
    ctx: Arc<StageContext>,
}

#[async_trait]
impl StageHandler for AnalyzeFramesStage {
    fn index(&self) -> usize {
        STAGE_ANALYZE_FRAMES
    }

    fn name(&self) -> &str {
        "analyze_frames"
    }

    fn description(&self) -> &str {
        "Analyze extracted frames"
    }

    async fn execute(&self, state: &mut PipelineState) -> PipelineResult<StagePayload> {
        if state.frames.is_empty() {
            return Err(PipelineError::missing_input("No frames available for analysis"));
        }

        let analysis = self
            .ctx
            .analyzer
            .analyze(&state.video_path, &state.frames, &self.ctx.analysis_context)
            .await?;

        if self.ctx.combined_analysis {
            state.segments = select_segments(&analysis.segments);
            info!(
                subject = %state.subject,
                candidates = analysis.segments.len(),
                selected = state.segments.len(),
                "Analysis selected segments"
            );
        }

        let payload = StagePayload::Analysis {
            segments: analysis.segments.clone(),
            summary: analysis.summary.clone(),
            combined: self.ctx.combined_analysis,
        };
        state.analysis = Some(analysis);
        Ok(payload)
    }
}

pub struct DetectSegmentsStage;

#[async_trait]
impl StageHandler for DetectSegmentsStage {
    fn index(&self) -> usize {
        STAGE_DETECT_SEGMENTS
    }

    fn name(&self) -> &str {
        "detect_segments"
    }

    fn description(&self) -> &str {
        "Detect noteworthy segments from analysis"
    }

    async fn execute(&self, state: &mut PipelineState) -> PipelineResult<StagePayload> {
        let analysis = state.analysis.as_ref().ok_or_else(|| {
            PipelineError::missing_input("No analysis results available for segment detection")
        })?;

        let segments = select_segments(&analysis.segments);
        info!(
            subject = %state.subject,
            candidates = analysis.segments.len(),
            selected = segments.len(),
            "Segments detected"
        );
        state.segments = segments.clone();
        Ok(StagePayload::Segments { segments })
    }

    fn already_satisfied(&self, state: &PipelineState) -> Option<StagePayload> {
        // Combined analysis already selected segments
        (!state.segments.is_empty()).then(|| StagePayload::Segments {
            segments: state.segments.clone(),
        })
    }
}

pub struct GenerateReportStage {
    ctx: Arc<StageContext>,
}

#[async_trait]
impl StageHandler for GenerateReportStage {
    fn index(&self) -> usize {
        STAGE_GENERATE_REPORT
    }

    fn name(&self) -> &str {
        "generate_report"
    }

    fn description(&self) -> &str {
        "Generate final analysis report"
    }

    async fn execute(&self, state: &mut PipelineState) -> PipelineResult<StagePayload> {
        if state.segments.is_empty() {
            return Err(PipelineError::missing_input(
                "No segments available for report generation",
            ));
        }

        let report_path = self.ctx.report_path(&state.subject);
        write_report(&report_path, &PipelineReport::from_state(state)).await?;

        info!(subject = %state.subject, report = %report_path.display(), "Report written");
        state.report_path = Some(report_path.clone());
        Ok(StagePayload::Report { report_path })
    }
}
