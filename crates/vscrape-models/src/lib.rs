//! Shared data models for the vscrape pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Search provider entries and candidates
//! - The known-id de-duplication set
//! - Clip windows and embedding triples
//! - Output records and the per-candidate failure taxonomy

pub mod candidate;
pub mod constants;
pub mod embedding;
pub mod known_ids;
pub mod record;
pub mod search;
pub mod video;
pub mod window;

// Re-export common types
pub use candidate::{CandidateOutcome, CandidateState, FailureKind};
pub use embedding::EmbeddingTriple;
pub use known_ids::{KnownIdSet, KnownIdsError};
pub use record::{RecordError, VideoRecord};
pub use search::{RawSearchEntry, SearchResult};
pub use video::{VideoId, VIDEO_ID_LEN};
pub use window::{ClipWindow, WindowError};
