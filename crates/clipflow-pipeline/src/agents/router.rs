//! Platform routing.

use async_trait::async_trait;
use tracing::debug;

use clipflow_models::selection::suggested_platforms;
use clipflow_models::{PlatformContent, PlatformQueue, PlatformSpec, SelectedSegment};

use crate::error::PipelineResult;

/// Decides which platforms each selected segment goes to.
#[async_trait]
pub trait PlatformRouter: Send + Sync {
    async fn route(
        &self,
        segments: &[SelectedSegment],
        specs: &[PlatformSpec],
    ) -> PipelineResult<PlatformQueue>;
}

/// Routes a segment to every platform it suits whose duration limit it fits.
#[derive(Debug, Clone, Default)]
pub struct HeuristicRouter;

#[async_trait]
impl PlatformRouter for HeuristicRouter {
    async fn route(
        &self,
        segments: &[SelectedSegment],
        specs: &[PlatformSpec],
    ) -> PipelineResult<PlatformQueue> {
        let mut queue = PlatformQueue::new();
        for selected in segments {
            let suited = if selected.target_platforms.is_empty() {
                suggested_platforms(&selected.segment)
            } else {
                selected.target_platforms.clone()
            };

            for spec in specs.iter().filter(|s| suited.contains(&s.platform)) {
                if !spec.accepts(selected.duration()) {
                    debug!(
                        platform = %spec.platform,
                        duration = selected.duration(),
                        max = spec.max_duration,
                        "Segment too long for platform"
                    );
                    continue;
                }
                queue.push(PlatformContent::routed(selected.clone(), spec.clone()));
            }
        }
        Ok(queue)
    }
}
