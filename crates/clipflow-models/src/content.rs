//! Routed platform content.
//!
//! Routing produces one [`PlatformContent`] per (segment, platform) pair in
//! `pending_format` status. Exactly one platform formatter later moves each
//! item to a terminal status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::platform::{Platform, PlatformSpec};
use crate::segment::SelectedSegment;

/// Processing status of a routed content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Created but not yet routed
    #[default]
    Pending,
    /// Routed and waiting for its platform formatter
    PendingFormat,
    /// Formatter produced transform parameters
    FormattingSpecsDefined,
    /// Rendered output exists
    Complete,
    /// Formatting did not succeed
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::PendingFormat => "pending_format",
            ProcessingStatus::FormattingSpecsDefined => "formatting_specs_defined",
            ProcessingStatus::Complete => "complete",
            ProcessingStatus::Failed => "failed",
        }
    }

    /// Whether a platform formatter still has to look at this item.
    pub fn is_pending_format(&self) -> bool {
        matches!(self, ProcessingStatus::PendingFormat)
    }

    /// Check if this is a terminal state (no formatter will touch it again).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::FormattingSpecsDefined
                | ProcessingStatus::Complete
                | ProcessingStatus::Failed
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// FFmpeg transform parameters for one content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatParams {
    /// Video filter chain passed to `-vf`
    pub video_filter: String,
    /// Target aspect ratio label
    pub aspect: String,
}

impl FormatParams {
    /// Center crop to the spec's aspect ratio, then scale to its resolution.
    pub fn for_spec(spec: &PlatformSpec) -> Self {
        let ratio = spec.aspect_ratio;
        let crop = if ratio.width <= ratio.height {
            format!("crop=ih*{}/{}:ih", ratio.width, ratio.height)
        } else {
            format!("crop=iw:iw*{}/{}", ratio.height, ratio.width)
        };
        let (w, h) = spec.resolution;
        Self {
            video_filter: format!("{},scale={}:{}", crop, w, h),
            aspect: ratio.to_string(),
        }
    }
}

/// One segment routed to one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformContent {
    pub platform: Platform,
    pub source: SelectedSegment,
    pub target: PlatformSpec,
    pub processing_status: ProcessingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_params: Option<FormatParams>,
    /// Rendered clip, once one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Routing or formatting remark (e.g. why an item failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PlatformContent {
    /// Create a routed item waiting for formatting.
    pub fn routed(source: SelectedSegment, target: PlatformSpec) -> Self {
        Self {
            platform: target.platform,
            source,
            target,
            processing_status: ProcessingStatus::PendingFormat,
            format_params: None,
            output_path: None,
            note: None,
        }
    }

    /// Mark the item failed with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.processing_status = ProcessingStatus::Failed;
        self.note = Some(reason.into());
    }
}

/// Routed content grouped by platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformQueue(BTreeMap<Platform, Vec<PlatformContent>>);

impl PlatformQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items routed to a platform (empty when none).
    pub fn items(&self, platform: Platform) -> &[PlatformContent] {
        self.0.get(&platform).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the items of a platform.
    pub fn insert(&mut self, platform: Platform, items: Vec<PlatformContent>) {
        self.0.insert(platform, items);
    }

    /// Append one item to its platform's list.
    pub fn push(&mut self, item: PlatformContent) {
        self.0.entry(item.platform).or_default().push(item);
    }

    /// Remove and return the items of a platform.
    pub fn take(&mut self, platform: Platform) -> Vec<PlatformContent> {
        self.0.remove(&platform).unwrap_or_default()
    }

    /// Number of items still waiting for the platform's formatter.
    pub fn pending_count(&self, platform: Platform) -> usize {
        self.items(platform)
            .iter()
            .filter(|item| item.processing_status.is_pending_format())
            .count()
    }

    pub fn has_pending(&self, platform: Platform) -> bool {
        self.pending_count(platform) > 0
    }

    /// Total number of routed items across platforms.
    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Platform, &Vec<PlatformContent>)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{ContentCategory, Segment};

    fn selected(start: f64, end: f64) -> SelectedSegment {
        SelectedSegment {
            segment: Segment::new(start, end, "a key moment").unwrap(),
            engagement_prediction: 0.75,
            selection_reason: "test".into(),
            content_category: ContentCategory::Highlight,
            target_platforms: vec![],
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(ProcessingStatus::PendingFormat.as_str(), "pending_format");
        assert_eq!(
            serde_json::to_string(&ProcessingStatus::FormattingSpecsDefined).unwrap(),
            "\"formatting_specs_defined\""
        );
        assert!(ProcessingStatus::Failed.is_terminal());
        assert!(!ProcessingStatus::PendingFormat.is_terminal());
    }

    #[test]
    fn test_format_params_for_specs() {
        let tiktok = FormatParams::for_spec(&Platform::TikTok.spec());
        assert_eq!(tiktok.video_filter, "crop=ih*9/16:ih,scale=1080:1920");
        assert_eq!(tiktok.aspect, "9:16");

        let square = FormatParams::for_spec(&Platform::Instagram.spec());
        assert_eq!(square.video_filter, "crop=ih*1/1:ih,scale=1080:1080");

        let landscape = FormatParams::for_spec(&Platform::LinkedIn.spec());
        assert_eq!(landscape.video_filter, "crop=iw:iw*9/16,scale=1920:1080");
    }

    #[test]
    fn test_queue_pending_counts() {
        let mut queue = PlatformQueue::new();
        queue.push(PlatformContent::routed(selected(0.0, 20.0), Platform::TikTok.spec()));
        queue.push(PlatformContent::routed(selected(30.0, 50.0), Platform::TikTok.spec()));

        assert_eq!(queue.pending_count(Platform::TikTok), 2);
        assert_eq!(queue.pending_count(Platform::Instagram), 0);
        assert!(queue.items(Platform::LinkedIn).is_empty());

        let mut items = queue.take(Platform::TikTok);
        items[0].fail("no formatter");
        queue.insert(Platform::TikTok, items);
        assert_eq!(queue.pending_count(Platform::TikTok), 1);
        assert_eq!(queue.total(), 2);
    }

    #[test]
    fn test_queue_serializes_by_platform_name() {
        let mut queue = PlatformQueue::new();
        queue.push(PlatformContent::routed(selected(0.0, 20.0), Platform::Instagram.spec()));
        let value = serde_json::to_value(&queue).unwrap();
        assert_eq!(value["Instagram"][0]["processing_status"], "pending_format");

        let back: PlatformQueue = serde_json::from_value(value).unwrap();
        assert_eq!(back, queue);
    }
}
