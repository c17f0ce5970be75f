//! Pipeline configuration.

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use clipflow_checkpoint::StoreConfig;

use crate::error::PipelineError;

/// Which analyzer backs the analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyzerKind {
    /// Read segments from a JSON file next to the video
    #[default]
    Sidecar,
    /// Call the remote analysis service
    Remote,
}

impl FromStr for AnalyzerKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sidecar" => Ok(AnalyzerKind::Sidecar),
            "remote" => Ok(AnalyzerKind::Remote),
            other => Err(PipelineError::config_error(format!("unknown analyzer: {}", other))),
        }
    }
}

impl AnalyzerKind {
    /// Parse an `ANALYZER` value, falling back to the default on a typo.
    fn from_env_value(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        raw.parse().unwrap_or_else(|e| {
            warn!("ANALYZER={:?} ignored ({}), using {:?}", raw, e, Self::default());
            Self::default()
        })
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Checkpoint location and backup retention
    pub store: StoreConfig,
    /// Where reports and rendered clips go
    pub output_dir: PathBuf,
    /// Scratch space for extracted frames
    pub staging_dir: PathBuf,
    /// Frames sampled per second of video
    pub frame_rate: f64,
    /// Analysis stage also selects segments (detection stage is then satisfied)
    pub combined_analysis: bool,
    pub analyzer: AnalyzerKind,
    /// Extra instructions passed to the analyzer
    pub analysis_context: String,
    /// Install the Prometheus recorder and write a snapshot at exit
    pub metrics_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            output_dir: PathBuf::from("output"),
            staging_dir: PathBuf::from("output/staging"),
            frame_rate: 1.0, // 1 frame per second
            combined_analysis: true,
            analyzer: AnalyzerKind::Sidecar,
            analysis_context: String::new(),
            metrics_enabled: false,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            store: StoreConfig::from_env(),
            output_dir: std::env::var("CLIPFLOW_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            staging_dir: std::env::var("CLIPFLOW_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output/staging")),
            frame_rate: std::env::var("FRAME_EXTRACT_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|rate: &f64| *rate > 0.0)
                .unwrap_or(1.0),
            combined_analysis: std::env::var("COMBINED_ANALYSIS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
            analyzer: AnalyzerKind::from_env_value(std::env::var("ANALYZER").ok().as_deref()),
            analysis_context: std::env::var("ANALYSIS_CONTEXT").unwrap_or_default(),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}
