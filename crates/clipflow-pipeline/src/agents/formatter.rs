//! Platform formatters.
//!
//! A formatter receives the items routed to its platform and returns them
//! with a terminal status. Items it returns still in `pending_format` are
//! failed by the graph node that called it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use clipflow_media::MediaToolkit;
use clipflow_models::{FormatParams, Platform, PlatformContent, ProcessingStatus};

use crate::error::PipelineResult;

#[async_trait]
pub trait PlatformFormatter: Send + Sync {
    async fn format(
        &self,
        platform: Platform,
        video: &Path,
        items: Vec<PlatformContent>,
    ) -> PipelineResult<Vec<PlatformContent>>;
}

/// Defines transform parameters from the platform spec without rendering.
#[derive(Debug, Clone, Default)]
pub struct SpecFormatter;

#[async_trait]
impl PlatformFormatter for SpecFormatter {
    async fn format(
        &self,
        platform: Platform,
        _video: &Path,
        mut items: Vec<PlatformContent>,
    ) -> PipelineResult<Vec<PlatformContent>> {
        for item in items.iter_mut().filter(|i| i.processing_status.is_pending_format()) {
            item.format_params = Some(FormatParams::for_spec(&item.target));
            item.processing_status = ProcessingStatus::FormattingSpecsDefined;
        }
        info!(platform = %platform, items = items.len(), "Formatting specs defined");
        Ok(items)
    }
}

/// Cuts and transforms each clip with the media toolkit.
///
/// Output lands in `<output_dir>/<platform>/`. A failed render fails only
/// that item.
pub struct RenderingFormatter {
    media: Arc<dyn MediaToolkit>,
    output_dir: PathBuf,
}

impl RenderingFormatter {
    pub fn new(media: Arc<dyn MediaToolkit>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            media,
            output_dir: output_dir.into(),
        }
    }

    /// `<video stem>_<start ms>-<end ms>`; distinct for any two distinct segments.
    fn clip_stem(video: &Path, item: &PlatformContent) -> String {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string());
        let millis = |seconds: f64| (seconds * 1000.0).round() as u64;
        format!(
            "{}_{}-{}",
            stem,
            millis(item.source.segment.start_time),
            millis(item.source.segment.end_time)
        )
    }

    async fn render(&self, video: &Path, dir: &Path, item: &mut PlatformContent) -> PipelineResult<()> {
        let params = FormatParams::for_spec(&item.target);
        let stem = Self::clip_stem(video, item);
        let raw = dir.join(format!("{}_raw.mp4", stem));
        let output = dir.join(format!("{}.mp4", stem));

        self.media
            .extract_clip(
                video,
                item.source.segment.start_time,
                item.source.segment.end_time,
                &raw,
            )
            .await?;
        let transformed = self.media.transform(&raw, &output, &params).await;
        if let Err(e) = tokio::fs::remove_file(&raw).await {
            warn!(file = %raw.display(), "Failed to remove intermediate clip: {}", e);
        }
        transformed?;

        item.format_params = Some(params);
        item.output_path = Some(output);
        item.processing_status = ProcessingStatus::Complete;
        Ok(())
    }
}

#[async_trait]
impl PlatformFormatter for RenderingFormatter {
    async fn format(
        &self,
        platform: Platform,
        video: &Path,
        mut items: Vec<PlatformContent>,
    ) -> PipelineResult<Vec<PlatformContent>> {
        let dir = self.output_dir.join(platform.as_str());
        tokio::fs::create_dir_all(&dir).await?;

        for item in items.iter_mut().filter(|i| i.processing_status.is_pending_format()) {
            if let Err(e) = self.render(video, &dir, item).await {
                warn!(
                    platform = %platform,
                    start = %item.source.segment.start_time_str(),
                    "Render failed: {}", e
                );
                item.fail(e.to_string());
            }
        }
        Ok(items)
    }
}
