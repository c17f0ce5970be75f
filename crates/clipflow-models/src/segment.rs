//! Video segment definitions.
//!
//! A [`Segment`] is what the analysis collaborator reports: a time range with
//! a free-text description. A [`SelectedSegment`] is a segment that survived
//! scoring and carries the selection metadata used for routing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};
use crate::platform::Platform;
use crate::timestamp::format_mm_ss;

/// A noteworthy time range in a source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start offset in seconds
    pub start_time: f64,
    /// End offset in seconds
    pub end_time: f64,
    /// What happens in the segment
    pub description: String,
    /// Engagement score reported by the analyzer (0.0 when unknown)
    #[serde(default)]
    pub engagement_score: f64,
}

impl Segment {
    /// Create a validated segment.
    pub fn new(start_time: f64, end_time: f64, description: impl Into<String>) -> ModelResult<Self> {
        let segment = Self {
            start_time,
            end_time,
            description: description.into(),
            engagement_score: 0.0,
        };
        segment.validate()?;
        Ok(segment)
    }

    /// Set the analyzer-reported engagement score.
    pub fn with_engagement_score(mut self, score: f64) -> Self {
        self.engagement_score = score;
        self
    }

    /// Check the time range invariants.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(ModelError::invalid_segment(format!(
                "start_time must be non-negative, got {}",
                self.start_time
            )));
        }
        if !self.end_time.is_finite() || self.end_time <= self.start_time {
            return Err(ModelError::invalid_segment(format!(
                "end_time ({}) must be after start_time ({})",
                self.end_time, self.start_time
            )));
        }
        Ok(())
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn start_time_str(&self) -> String {
        format_mm_ss(self.start_time)
    }

    pub fn end_time_str(&self) -> String {
        format_mm_ss(self.end_time)
    }
}

/// Content category inferred from a segment description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Tutorial,
    Demo,
    Highlight,
    Insight,
    #[default]
    General,
}

impl ContentCategory {
    /// Keyword groups checked in order; the first group with a hit wins.
    const RULES: &'static [(ContentCategory, &'static [&'static str])] = &[
        (
            ContentCategory::Tutorial,
            &["explain", "tutorial", "how", "learn", "guide"],
        ),
        (
            ContentCategory::Demo,
            &["demo", "demonstration", "showing", "showcase"],
        ),
        (
            ContentCategory::Highlight,
            &["highlight", "key", "important", "critical"],
        ),
        (
            ContentCategory::Insight,
            &["insight", "analysis", "perspective", "thought"],
        ),
    ];

    /// Classify a description by keyword.
    pub fn classify(description: &str) -> Self {
        let description = description.to_lowercase();
        Self::RULES
            .iter()
            .find(|(_, words)| words.iter().any(|w| description.contains(w)))
            .map(|(category, _)| *category)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Tutorial => "tutorial",
            ContentCategory::Demo => "demo",
            ContentCategory::Highlight => "highlight",
            ContentCategory::Insight => "insight",
            ContentCategory::General => "general",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A segment chosen for distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedSegment {
    #[serde(flatten)]
    pub segment: Segment,
    /// Heuristic engagement prediction (0.0 - 1.0)
    pub engagement_prediction: f64,
    /// Human-readable reason for the selection
    pub selection_reason: String,
    pub content_category: ContentCategory,
    /// Platforms the segment is a natural fit for, in priority order
    #[serde(default)]
    pub target_platforms: Vec<Platform>,
}

impl SelectedSegment {
    pub fn duration(&self) -> f64 {
        self.segment.duration()
    }

    pub fn description(&self) -> &str {
        &self.segment.description
    }
}
