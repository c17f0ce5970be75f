//! Checkpoint error types.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid stage: {0}")]
    InvalidStage(String),
}

impl CheckpointError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn invalid_stage(msg: impl Into<String>) -> Self {
        Self::InvalidStage(msg.into())
    }
}
