//! Miner error types.

use thiserror::Error;

pub type MinerResult<T> = Result<T, MinerError>;

/// Errors that abort a whole acquire round.
///
/// Per-candidate failures never surface here; they are recorded in the
/// round's outcome log instead. `Media` and `Ml` only carry search-attempt
/// errors, which the search stage logs and swallows.
#[derive(Debug, Error)]
pub enum MinerError {
    #[error("No candidates found for query: {0}")]
    NoCandidates(String),

    #[error("Acquire cancelled")]
    Cancelled,

    #[error("Media error: {0}")]
    Media(#[from] vscrape_media::MediaError),

    #[error("ML service error: {0}")]
    Ml(#[from] vscrape_ml_client::MlError),
}

impl MinerError {
    /// Whether the error reports a provider block of the egress in use.
    pub fn is_provider_blocked(&self) -> bool {
        matches!(self, MinerError::Media(e) if e.is_provider_blocked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscrape_media::MediaError;
    use vscrape_ml_client::MlError;

    #[test]
    fn test_provider_blocked() {
        assert!(MinerError::from(MediaError::provider_blocked("429")).is_provider_blocked());
        assert!(!MinerError::from(MediaError::search_failed("odd")).is_provider_blocked());
        assert!(!MinerError::from(MlError::ServiceUnavailable("down".into())).is_provider_blocked());
        assert!(!MinerError::Cancelled.is_provider_blocked());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            MinerError::NoCandidates("cats".into()).to_string(),
            "No candidates found for query: cats"
        );
    }
}
