//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for acquire rounds with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

use vscrape_models::CandidateOutcome;

/// Run logger for structured logging with consistent formatting.
///
/// Every line carries the round's `run_id` and `query`.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    query: String,
}

impl RunLogger {
    /// Create a logger for a new round with a fresh run id.
    pub fn new(query: &str) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            query: query.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            query = %self.query,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            query = %self.query,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            query = %self.query,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            query = %self.query,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            query = %self.query,
            "Run completed: {}", message
        );
    }

    /// Log a candidate's terminal outcome.
    pub fn log_outcome(&self, outcome: &CandidateOutcome) {
        if outcome.is_done() {
            info!(
                run_id = %self.run_id,
                video_id = %outcome.id,
                elapsed_ms = outcome.elapsed_ms,
                "Candidate done"
            );
        } else {
            warn!(
                run_id = %self.run_id,
                video_id = %outcome.id,
                failure = outcome.failure.map(|k| k.as_str()).unwrap_or_default(),
                during = outcome.failed_during.map(|s| s.as_str()).unwrap_or_default(),
                elapsed_ms = outcome.elapsed_ms,
                detail = outcome.detail.as_deref().unwrap_or_default(),
                "Candidate failed"
            );
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "acquire",
            run_id = %self.run_id,
            query = %self.query
        )
    }
}
