//! Request and response payloads of the analysis service.

use serde::{Deserialize, Serialize};

use clipflow_models::Segment;

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Local path or URL of the video
    pub video_path: String,
    /// Extra instructions for the analyzer
    #[serde(default)]
    pub context: String,
    /// Number of frames already sampled locally, if any
    #[serde(default)]
    pub frame_count: usize,
}

/// Answer of `POST /analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Answer of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
