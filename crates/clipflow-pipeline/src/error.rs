//! Pipeline error types.

use thiserror::Error;

use clipflow_analysis::AnalysisError;
use clipflow_checkpoint::CheckpointError;
use clipflow_media::MediaError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage or collaborator failed; the message is recorded verbatim.
    #[error("{0}")]
    Stage(String),

    /// Upstream data a stage needs is absent.
    #[error("{0}")]
    MissingInput(String),

    #[error("Invalid stage configuration: {0}")]
    InvalidStages(String),

    #[error("AI analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Formatting failed: {0}")]
    FormattingFailed(String),

    #[error("Invalid stage payload: {0}")]
    Payload(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Analysis service error: {0}")]
    AnalysisService(#[from] AnalysisError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn stage(msg: impl Into<String>) -> Self {
        Self::Stage(msg.into())
    }

    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    pub fn invalid_stages(msg: impl Into<String>) -> Self {
        Self::InvalidStages(msg.into())
    }

    pub fn analysis_failed(msg: impl Into<String>) -> Self {
        Self::AnalysisFailed(msg.into())
    }

    pub fn formatting_failed(msg: impl Into<String>) -> Self {
        Self::FormattingFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Failures that end a run instead of being recorded as a stage error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Checkpoint(_) | PipelineError::InvalidStages(_)
        )
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Structural graph failures. Node-level failures live in the workflow state.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    #[error("Node {0} has no outgoing edge")]
    NoRoute(String),

    #[error("Graph has no entry node")]
    MissingEntry,

    #[error("Graph exceeded {0} steps without reaching the end")]
    StepLimitExceeded(usize),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_message_is_verbatim() {
        assert_eq!(
            PipelineError::stage("upstream unavailable").to_string(),
            "upstream unavailable"
        );
        assert_eq!(
            PipelineError::missing_input("No frames available for analysis").to_string(),
            "No frames available for analysis"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(PipelineError::invalid_stages("dup").is_fatal());
        assert!(!PipelineError::stage("x").is_fatal());
        assert!(!PipelineError::analysis_failed("x").is_fatal());
    }
}
