//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use clipflow_media::{MediaResult, MediaToolkit};
use clipflow_models::{FormatParams, Platform, PlatformContent, PlatformQueue, PlatformSpec, Segment, SelectedSegment};
use clipflow_pipeline::agents::{PlatformRouter, VideoAnalyzer};
use clipflow_pipeline::{Analysis, PipelineError, PipelineResult};

/// Writes `count` empty frame files.
#[derive(Default)]
pub struct FakeMedia {
    pub extract_calls: AtomicUsize,
}

#[async_trait]
impl MediaToolkit for FakeMedia {
    async fn extract_frames(&self, _video: &Path, out_dir: &Path, _rate: f64) -> MediaResult<Vec<PathBuf>> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::create_dir_all(out_dir).await?;
        let mut frames = Vec::new();
        for i in 1..=3 {
            let path = out_dir.join(format!("frame_{:04}.jpg", i));
            tokio::fs::write(&path, b"").await?;
            frames.push(path);
        }
        Ok(frames)
    }

    async fn extract_clip(&self, _: &Path, _: f64, _: f64, _: &Path) -> MediaResult<()> {
        Ok(())
    }

    async fn transform(&self, _: &Path, _: &Path, _: &FormatParams) -> MediaResult<()> {
        Ok(())
    }
}

/// Returns fixed segments, failing the first `failures` calls.
pub struct FixedAnalyzer {
    pub segments: Vec<Segment>,
    pub failures: usize,
    pub calls: AtomicUsize,
}

impl FixedAnalyzer {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            failures: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }
}

#[async_trait]
impl VideoAnalyzer for FixedAnalyzer {
    async fn analyze(&self, _video: &Path, _frames: &[PathBuf], _context: &str) -> PipelineResult<Analysis> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(PipelineError::stage("upstream unavailable"));
        }
        Ok(Analysis {
            segments: self.segments.clone(),
            summary: Some("fixture".into()),
        })
    }
}

/// Routes every selected segment to a fixed set of platforms.
pub struct FixedRouter(pub Vec<Platform>);

#[async_trait]
impl PlatformRouter for FixedRouter {
    async fn route(&self, segments: &[SelectedSegment], _specs: &[PlatformSpec]) -> PipelineResult<PlatformQueue> {
        let mut queue = PlatformQueue::new();
        for segment in segments {
            for platform in &self.0 {
                queue.push(PlatformContent::routed(segment.clone(), platform.spec()));
            }
        }
        Ok(queue)
    }
}

/// Segments of which exactly two pass selection.
pub fn engaging_segments() -> Vec<Segment> {
    vec![
        Segment::new(10.0, 40.0, "An amazing demo of the key feature").unwrap(),
        Segment::new(0.0, 2.0, "intro").unwrap(),
        Segment::new(65.0, 95.0, "Important insight with a live walkthrough").unwrap(),
    ]
}

/// Segments none of which pass selection.
pub fn dull_segments() -> Vec<Segment> {
    vec![
        Segment::new(0.0, 2.0, "intro").unwrap(),
        Segment::new(200.0, 400.0, "long pause").unwrap(),
    ]
}
