//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    #[error("Invalid aspect ratio: {0}")]
    InvalidAspectRatio(String),
}

impl ModelError {
    pub fn invalid_segment(msg: impl Into<String>) -> Self {
        Self::InvalidSegment(msg.into())
    }
}
