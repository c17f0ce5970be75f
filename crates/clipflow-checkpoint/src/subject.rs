//! Subject identifiers.
//!
//! A subject is the input a checkpoint is scoped to. Its id is used verbatim
//! in checkpoint file names, so it is restricted to a filesystem-safe token set.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Filesystem-safe identifier of a checkpoint subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create an id from an arbitrary token, sanitizing unsafe characters.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(sanitize(raw.as_ref()))
    }

    /// Derive an id from a video path.
    ///
    /// The file stem is sanitized and suffixed with the first 8 hex digits of
    /// a SHA-256 over the full path, so `a/clip.mp4` and `b/clip.mp4` get
    /// separate checkpoints.
    pub fn from_video_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let digest = Sha256::digest(path.to_string_lossy().as_bytes());
        let short: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
        Self(format!("{}-{}", sanitize(&stem), short))
    }

    /// Derive a namespaced id, e.g. for a second execution mode over the same input.
    pub fn with_suffix(&self, tag: &str) -> Self {
        Self(format!("{}.{}", self.0, sanitize(tag)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self("_".to_string())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
