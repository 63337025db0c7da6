//! Per-candidate lifecycle and failure taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::video::VideoId;

/// Lifecycle state of one candidate inside an acquire run.
///
/// `Queued → Downloading → Clipping → Embedding → Done`, or `Failed` from any
/// non-terminal state. States never move backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateState {
    #[default]
    Queued,
    Downloading,
    Clipping,
    Embedding,
    Done,
    Failed,
}

impl CandidateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateState::Queued => "queued",
            CandidateState::Downloading => "downloading",
            CandidateState::Clipping => "clipping",
            CandidateState::Embedding => "embedding",
            CandidateState::Done => "done",
            CandidateState::Failed => "failed",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CandidateState::Done | CandidateState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: CandidateState) -> bool {
        use CandidateState::*;
        match (self, next) {
            (_, Failed) => !self.is_terminal(),
            (Queued, Downloading)
            | (Downloading, Clipping)
            | (Clipping, Embedding)
            | (Embedding, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CandidateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a candidate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Provider rate-limited or blocked our network identity
    ProviderBlocked,
    /// Invalid, removed or otherwise unfetchable content
    ContentUnavailable,
    /// Transfer produced nothing usable
    EmptyResult,
    /// Clip extraction failed
    TranscodeFailure,
    /// Embedding service failed or rejected the clip
    EmbeddingFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ProviderBlocked => "provider_blocked",
            FailureKind::ContentUnavailable => "content_unavailable",
            FailureKind::EmptyResult => "empty_result",
            FailureKind::TranscodeFailure => "transcode_failure",
            FailureKind::EmbeddingFailure => "embedding_failure",
        }
    }

    /// Whether the failure says something about the egress rather than the
    /// content, so a different egress may succeed.
    pub fn implicates_egress(&self) -> bool {
        matches!(self, FailureKind::ProviderBlocked)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal outcome of one candidate, as kept in the run's outcome log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub id: VideoId,
    /// `Done` or `Failed`
    pub state: CandidateState,
    /// Stage that was running when the candidate failed
    pub failed_during: Option<CandidateState>,
    pub failure: Option<FailureKind>,
    /// Human-readable failure detail
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

impl CandidateOutcome {
    pub fn done(id: VideoId, elapsed_ms: u64) -> Self {
        Self {
            id,
            state: CandidateState::Done,
            failed_during: None,
            failure: None,
            detail: None,
            elapsed_ms,
        }
    }

    pub fn failed(
        id: VideoId,
        during: CandidateState,
        kind: FailureKind,
        detail: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            id,
            state: CandidateState::Failed,
            failed_during: Some(during),
            failure: Some(kind),
            detail: Some(detail.into()),
            elapsed_ms,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == CandidateState::Done
    }
}
