//! Target platform definitions and format requirements.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::ModelError;

/// Social platforms that routed content can target.
///
/// Declaration order is the formatting priority order; `Ord` follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    Instagram,
    #[serde(rename = "TikTok")]
    TikTok,
    #[serde(rename = "LinkedIn")]
    LinkedIn,
}

impl Platform {
    /// All platforms in formatting priority order.
    pub const ALL: &'static [Platform] = &[Platform::Instagram, Platform::TikTok, Platform::LinkedIn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::LinkedIn => "LinkedIn",
        }
    }

    /// Format requirements for this platform.
    pub fn spec(&self) -> PlatformSpec {
        match self {
            Platform::Instagram => PlatformSpec {
                platform: *self,
                aspect_ratio: AspectRatio::SQUARE,
                max_duration: 60.0,
                optimal_format: "square".to_string(),
                resolution: (1080, 1080),
            },
            Platform::TikTok => PlatformSpec {
                platform: *self,
                aspect_ratio: AspectRatio::PORTRAIT,
                max_duration: 180.0,
                optimal_format: "vertical".to_string(),
                resolution: (1080, 1920),
            },
            Platform::LinkedIn => PlatformSpec {
                platform: *self,
                aspect_ratio: AspectRatio::LANDSCAPE,
                max_duration: 600.0,
                optimal_format: "landscape".to_string(),
                resolution: (1920, 1080),
            },
        }
    }

    /// Specs for every platform, in priority order.
    pub fn all_specs() -> Vec<PlatformSpec> {
        Self::ALL.iter().map(Platform::spec).collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::TikTok),
            "linkedin" => Ok(Platform::LinkedIn),
            _ => Err(PlatformParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown platform: {0}")]
pub struct PlatformParseError(String);

/// Aspect ratio specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Portrait (9:16)
    pub const PORTRAIT: AspectRatio = AspectRatio::new(9, 16);

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio::new(1, 1);

    /// Landscape (16:9)
    pub const LANDSCAPE: AspectRatio = AspectRatio::new(16, 9);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| ModelError::InvalidAspectRatio(s.to_string()))?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| ModelError::InvalidAspectRatio(s.to_string()))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| ModelError::InvalidAspectRatio(s.to_string()))?;
        if width == 0 || height == 0 {
            return Err(ModelError::InvalidAspectRatio(s.to_string()));
        }
        Ok(Self { width, height })
    }
}

/// Format requirements of a target platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSpec {
    pub platform: Platform,
    pub aspect_ratio: AspectRatio,
    /// Longest accepted clip, in seconds
    pub max_duration: f64,
    /// Short format label (square, vertical, landscape)
    pub optimal_format: String,
    /// Output resolution as (width, height)
    pub resolution: (u32, u32),
}

impl PlatformSpec {
    /// Whether a clip of `duration` seconds fits this platform.
    pub fn accepts(&self, duration: f64) -> bool {
        duration <= self.max_duration
    }
}
