//! Client for the remote video analysis service.
//!
//! The service receives a video reference plus free-form context and answers
//! with the noteworthy segments it found. Prompting and model choice are the
//! service's business; this crate only handles the request/response contract,
//! segment validation and retries.

pub mod client;
pub mod error;
pub mod types;

pub use client::{AnalysisClient, AnalysisClientConfig};
pub use error::{AnalysisError, AnalysisResult};
pub use types::{AnalyzeRequest, AnalyzeResponse, HealthResponse};
