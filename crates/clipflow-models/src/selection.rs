//! Heuristic segment scoring and selection.
//!
//! These are pure functions over segment descriptions and durations; no model
//! is consulted. Scores are in `[0.0, 1.0]` and a segment is selected when
//! its score is strictly above [`SELECTION_THRESHOLD`].

use crate::platform::Platform;
use crate::segment::{ContentCategory, Segment, SelectedSegment};

/// Minimum (exclusive) score for a segment to be selected.
pub const SELECTION_THRESHOLD: f64 = 0.6;

const ENGAGING_KEYWORDS: &[&str] = &[
    "amazing",
    "incredible",
    "exciting",
    "surprising",
    "fascinating",
    "beautiful",
    "action",
    "highlight",
    "key",
    "important",
    "critical",
    "reveal",
    "demonstrate",
    "show",
    "explain",
    "tutorial",
    "guide",
    "demo",
    "walkthrough",
    "insight",
    "discovery",
];

const PROFESSIONAL_KEYWORDS: &[&str] = &["professional", "business", "insight", "industry"];

/// Score a segment's engagement potential.
pub fn engagement_score(segment: &Segment) -> f64 {
    let mut score = 0.5;

    let duration = segment.duration();
    if (10.0..=60.0).contains(&duration) {
        score += 0.2;
    } else if duration < 5.0 || duration > 120.0 {
        score -= 0.2;
    }

    let description = segment.description.to_lowercase();
    let matches = ENGAGING_KEYWORDS
        .iter()
        .filter(|k| description.contains(*k))
        .count();
    score += (matches as f64 * 0.05).min(0.3);

    score.clamp(0.0, 1.0)
}

/// Explain why a segment was selected.
pub fn selection_reason(segment: &Segment, score: f64) -> String {
    let duration = segment.duration();
    let mut reason = if duration < 15.0 {
        "Short, focused clip suitable for social media".to_string()
    } else if duration <= 45.0 {
        "Optimal length for social sharing".to_string()
    } else {
        "Detailed segment with comprehensive content".to_string()
    };

    if score > 0.8 {
        reason.push_str(" with excellent engagement potential");
    } else if score > SELECTION_THRESHOLD {
        reason.push_str(" with good engagement potential");
    }

    reason
}

/// Platforms a segment naturally fits, in priority order.
pub fn suggested_platforms(segment: &Segment) -> Vec<Platform> {
    let duration = segment.duration();
    let mut platforms = if duration <= 15.0 {
        vec![Platform::TikTok, Platform::Instagram]
    } else if duration <= 60.0 {
        vec![Platform::Instagram, Platform::LinkedIn]
    } else {
        vec![Platform::LinkedIn]
    };

    let description = segment.description.to_lowercase();
    if PROFESSIONAL_KEYWORDS.iter().any(|k| description.contains(k)) {
        platforms.push(Platform::LinkedIn);
    }

    platforms.sort();
    platforms.dedup();
    platforms
}

/// Score every segment and keep the ones above the threshold, in input order.
pub fn select_segments(segments: &[Segment]) -> Vec<SelectedSegment> {
    segments
        .iter()
        .filter_map(|segment| {
            let score = engagement_score(segment);
            if score <= SELECTION_THRESHOLD {
                return None;
            }
            Some(SelectedSegment {
                segment: segment.clone(),
                engagement_prediction: score,
                selection_reason: selection_reason(segment, score),
                content_category: ContentCategory::classify(&segment.description),
                target_platforms: suggested_platforms(segment),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, description: &str) -> Segment {
        Segment::new(start, end, description).unwrap()
    }

    #[test]
    fn test_score_duration_bands() {
        // Neutral description, ideal duration
        assert!((engagement_score(&seg(0.0, 30.0, "a cat")) - 0.7).abs() < 1e-9);
        // Neutral description, mid duration (no adjustment)
        assert!((engagement_score(&seg(0.0, 90.0, "a cat")) - 0.5).abs() < 1e-9);
        // Too short
        assert!((engagement_score(&seg(0.0, 3.0, "a cat")) - 0.3).abs() < 1e-9);
        // Too long
        assert!((engagement_score(&seg(0.0, 200.0, "a cat")) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_bonus_is_capped() {
        let description = "amazing incredible exciting surprising fascinating beautiful action highlight";
        let score = engagement_score(&seg(0.0, 30.0, description));
        assert!((score - 1.0).abs() < 1e-9);

        let score = engagement_score(&seg(0.0, 90.0, description));
        assert!((score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_selection_reason() {
        assert_eq!(
            selection_reason(&seg(0.0, 10.0, ""), 0.9),
            "Short, focused clip suitable for social media with excellent engagement potential"
        );
        assert_eq!(
            selection_reason(&seg(0.0, 30.0, ""), 0.7),
            "Optimal length for social sharing with good engagement potential"
        );
        assert_eq!(
            selection_reason(&seg(0.0, 100.0, ""), 0.5),
            "Detailed segment with comprehensive content"
        );
    }

    #[test]
    fn test_suggested_platforms() {
        assert_eq!(
            suggested_platforms(&seg(0.0, 12.0, "quick trick")),
            vec![Platform::Instagram, Platform::TikTok]
        );
        assert_eq!(
            suggested_platforms(&seg(0.0, 40.0, "business update")),
            vec![Platform::Instagram, Platform::LinkedIn]
        );
        assert_eq!(
            suggested_platforms(&seg(0.0, 12.0, "industry news")),
            vec![Platform::Instagram, Platform::TikTok, Platform::LinkedIn]
        );
        assert_eq!(
            suggested_platforms(&seg(0.0, 300.0, "keynote")),
            vec![Platform::LinkedIn]
        );
    }

    #[test]
    fn test_select_segments_filters_and_keeps_order() {
        let segments = vec![
            seg(0.0, 30.0, "An amazing reveal"),
            seg(40.0, 42.0, "filler"),
            seg(50.0, 75.0, "The key insight"),
        ];
        let selected = select_segments(&segments);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].segment.description, "An amazing reveal");
        assert_eq!(selected[1].segment.description, "The key insight");
        assert_eq!(selected[1].content_category, ContentCategory::Highlight);
        assert!(selected.iter().all(|s| s.engagement_prediction > SELECTION_THRESHOLD));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // 0.5 base + 0.1 from two keywords at a neutral duration = exactly 0.6
        let borderline = seg(0.0, 90.0, "show and explain");
        assert!((engagement_score(&borderline) - 0.6).abs() < 1e-9);
        assert!(select_segments(&[borderline]).is_empty());
    }
}
