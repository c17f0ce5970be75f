//! Video analysis collaborators.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use clipflow_analysis::{AnalysisClient, AnalyzeRequest, AnalyzeResponse};
use clipflow_models::Segment;

use crate::error::{PipelineError, PipelineResult};
use crate::state::Analysis;

/// Finds noteworthy segments in a video.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    /// Analyze `video`. `frames` are the locally sampled frames, if any.
    async fn analyze(&self, video: &Path, frames: &[PathBuf], context: &str)
        -> PipelineResult<Analysis>;
}

/// Analyzer backed by the remote analysis service.
pub struct RemoteAnalyzer {
    client: AnalysisClient,
}

impl RemoteAnalyzer {
    pub fn new(client: AnalysisClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VideoAnalyzer for RemoteAnalyzer {
    async fn analyze(
        &self,
        video: &Path,
        frames: &[PathBuf],
        context: &str,
    ) -> PipelineResult<Analysis> {
        let request = AnalyzeRequest {
            video_path: video.to_string_lossy().into_owned(),
            context: context.to_string(),
            frame_count: frames.len(),
        };
        let response = self.client.analyze(&request).await?;
        Ok(Analysis {
            segments: response.segments,
            summary: response.summary,
        })
    }
}

/// Analyzer that reads segments prepared ahead of time.
///
/// Looks for `<video>.segments.json` next to the video. The file holds either
/// a bare segment array or a full analysis response object.
#[derive(Debug, Clone, Default)]
pub struct SidecarAnalyzer;

impl SidecarAnalyzer {
    pub fn sidecar_path(video: &Path) -> PathBuf {
        let mut name = video.as_os_str().to_owned();
        name.push(".segments.json");
        PathBuf::from(name)
    }
}

#[async_trait]
impl VideoAnalyzer for SidecarAnalyzer {
    async fn analyze(
        &self,
        video: &Path,
        _frames: &[PathBuf],
        _context: &str,
    ) -> PipelineResult<Analysis> {
        let path = Self::sidecar_path(video);
        let bytes = fs::read(&path).await.map_err(|e| {
            PipelineError::analysis_failed(format!(
                "cannot read segment file {}: {}",
                path.display(),
                e
            ))
        })?;

        let response = match serde_json::from_slice::<Vec<Segment>>(&bytes) {
            Ok(segments) => AnalyzeResponse {
                segments,
                summary: None,
            },
            Err(_) => serde_json::from_slice::<AnalyzeResponse>(&bytes).map_err(|e| {
                PipelineError::analysis_failed(format!(
                    "invalid segment file {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };

        let segments: Vec<Segment> = response
            .segments
            .into_iter()
            .filter(|segment| match segment.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(file = %path.display(), "Skipping invalid segment: {}", e);
                    false
                }
            })
            .collect();

        info!(file = %path.display(), segments = segments.len(), "Loaded segments from sidecar");
        Ok(Analysis {
            segments,
            summary: response.summary,
        })
    }
}
