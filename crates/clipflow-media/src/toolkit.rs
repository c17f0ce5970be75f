//! Media collaborator used by pipeline stages and graph nodes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use clipflow_models::FormatParams;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// File name pattern for extracted frames.
pub const FRAME_PATTERN: &str = "frame_%04d.jpg";

/// Media operations the pipeline depends on.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Sample frames from `video` into `out_dir` at `rate` frames per second.
    ///
    /// Returns the frame paths in order. Producing no frames is an error.
    async fn extract_frames(&self, video: &Path, out_dir: &Path, rate: f64)
        -> MediaResult<Vec<PathBuf>>;

    /// Cut `[start, end)` out of `video` into `output`.
    async fn extract_clip(&self, video: &Path, start: f64, end: f64, output: &Path)
        -> MediaResult<()>;

    /// Apply platform transform parameters to `input`, writing `output`.
    async fn transform(&self, input: &Path, output: &Path, params: &FormatParams)
        -> MediaResult<()>;
}

/// [`MediaToolkit`] backed by the `ffmpeg` CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    runner: FfmpegRunner,
}

impl FfmpegToolkit {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    /// Reads `FFMPEG_TIMEOUT_SECS`; unset or `0` means no deadline.
    pub fn from_env() -> Self {
        let runner = match std::env::var("FFMPEG_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(secs) if secs > 0 => FfmpegRunner::new().with_timeout(secs),
            _ => FfmpegRunner::new(),
        };
        Self::new(runner)
    }
}

async fn ensure_exists(path: &Path) -> MediaResult<()> {
    if fs::try_exists(path).await.unwrap_or(false) {
        Ok(())
    } else {
        Err(MediaError::FileNotFound(path.to_path_buf()))
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn extract_frames(
        &self,
        video: &Path,
        out_dir: &Path,
        rate: f64,
    ) -> MediaResult<Vec<PathBuf>> {
        ensure_exists(video).await?;
        fs::create_dir_all(out_dir).await?;

        info!(
            video = %video.display(),
            out_dir = %out_dir.display(),
            rate,
            "Extracting frames"
        );
        let cmd = FfmpegCommand::new(video, out_dir.join(FRAME_PATTERN)).frame_rate_filter(rate);
        self.runner.run(&cmd).await?;

        let frames = collect_frames(out_dir).await?;
        if frames.is_empty() {
            return Err(MediaError::NoFrames(video.to_path_buf()));
        }
        Ok(frames)
    }

    async fn extract_clip(
        &self,
        video: &Path,
        start: f64,
        end: f64,
        output: &Path,
    ) -> MediaResult<()> {
        if end <= start || start < 0.0 {
            return Err(MediaError::InvalidRange { start, end });
        }
        ensure_exists(video).await?;

        let base = FfmpegCommand::new(video, output)
            .seek(start)
            .duration(end - start);

        match self.runner.run(&base.clone().stream_copy()).await {
            Ok(()) => Ok(()),
            Err(MediaError::FfmpegFailed { stderr, .. }) => {
                warn!(
                    video = %video.display(),
                    "Stream copy failed, re-encoding clip: {}",
                    stderr.unwrap_or_default()
                );
                self.runner.run(&base).await
            }
            Err(e) => Err(e),
        }
    }

    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        params: &FormatParams,
    ) -> MediaResult<()> {
        ensure_exists(input).await?;

        let cmd = FfmpegCommand::new(input, output)
            .video_filter(params.video_filter.clone())
            .video_codec("libx264")
            .audio_codec("copy");
        self.runner.run(&cmd).await
    }
}

/// Frame files (`frame_*.jpg`) in `dir`, sorted by name.
pub async fn collect_frames(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("frame_") && name.ends_with(".jpg") {
            frames.push(entry.path());
        }
    }
    frames.sort();
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_collect_frames_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["frame_0002.jpg", "frame_0001.jpg", "notes.txt", "frame_0010.jpg"] {
            fs::write(dir.path().join(name), b"").await.unwrap();
        }

        let frames = collect_frames(dir.path()).await.unwrap();
        let names: Vec<String> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["frame_0001.jpg", "frame_0002.jpg", "frame_0010.jpg"]);
    }

    #[tokio::test]
    async fn test_extract_clip_rejects_bad_range() {
        let toolkit = FfmpegToolkit::default();
        let result = toolkit
            .extract_clip(Path::new("in.mp4"), 10.0, 10.0, Path::new("out.mp4"))
            .await;
        assert!(matches!(result, Err(MediaError::InvalidRange { .. })));
    }

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let dir = TempDir::new().unwrap();
        let toolkit = FfmpegToolkit::default();
        let missing = dir.path().join("missing.mp4");

        let result = toolkit
            .extract_frames(&missing, &dir.path().join("frames"), 1.0)
            .await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));

        let params = FormatParams {
            video_filter: "scale=10:10".into(),
            aspect: "1:1".into(),
        };
        let result = toolkit
            .transform(&missing, &dir.path().join("out.mp4"), &params)
            .await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
