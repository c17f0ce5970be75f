//! Structured run logging.
//!
//! Every pipeline or graph run logs through a [`RunLogger`] so the subject and
//! the kind of run are attached to each event.

use tracing::{error, info, warn, Span};

use clipflow_checkpoint::SubjectId;

/// Logger bound to one subject and one kind of run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    subject: String,
    operation: String,
}

impl RunLogger {
    /// Create a logger for `subject` running `operation` (e.g. "linear", "branching").
    pub fn new(subject: &SubjectId, operation: &str) -> Self {
        Self {
            subject: subject.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            subject = %self.subject,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            subject = %self.subject,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            subject = %self.subject,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            subject = %self.subject,
            operation = %self.operation,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            subject = %self.subject,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            subject = %self.subject,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_fields() {
        let logger = RunLogger::new(&SubjectId::new("talk-1a2b3c4d"), "linear");
        assert_eq!(logger.subject(), "talk-1a2b3c4d");
        assert_eq!(logger.operation(), "linear");
    }
}
