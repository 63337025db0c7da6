//! Final pipeline output record.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::EmbeddingTriple;
use crate::search::SearchResult;
use crate::video::VideoId;
use crate::window::ClipWindow;

/// A record could not be assembled from its parts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("Embedding triple for {0} is incomplete")]
    IncompleteEmbedding(VideoId),

    #[error("Description for {0} is empty")]
    EmptyDescription(VideoId),
}

/// One acquired video with its clip window and embeddings.
///
/// Serializes with the wire names validators expect (`video_id`, `views`,
/// `start_time`, `end_time`, `*_emb`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    #[serde(rename = "video_id")]
    id: VideoId,
    description: String,
    #[serde(rename = "views")]
    view_count: u64,
    #[serde(rename = "start_time")]
    start_seconds: u32,
    #[serde(rename = "end_time")]
    end_seconds: u32,
    #[serde(rename = "video_emb")]
    video_vector: Vec<f32>,
    #[serde(rename = "audio_emb")]
    audio_vector: Vec<f32>,
    #[serde(rename = "description_emb")]
    description_vector: Vec<f32>,
}

impl VideoRecord {
    /// Assemble a record; every field must be populated.
    pub fn assemble(
        candidate: &SearchResult,
        description: String,
        window: ClipWindow,
        embeddings: EmbeddingTriple,
    ) -> Result<Self, RecordError> {
        if description.trim().is_empty() {
            return Err(RecordError::EmptyDescription(candidate.id.clone()));
        }
        if !embeddings.is_complete() {
            return Err(RecordError::IncompleteEmbedding(candidate.id.clone()));
        }

        Ok(Self {
            id: candidate.id.clone(),
            description,
            view_count: candidate.view_count,
            start_seconds: window.start_seconds(),
            end_seconds: window.end_seconds(),
            video_vector: embeddings.video,
            audio_vector: embeddings.audio,
            description_vector: embeddings.text,
        })
    }

    pub fn id(&self) -> &VideoId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn view_count(&self) -> u64 {
        self.view_count
    }

    pub fn start_seconds(&self) -> u32 {
        self.start_seconds
    }

    pub fn end_seconds(&self) -> u32 {
        self.end_seconds
    }

    pub fn video_vector(&self) -> &[f32] {
        &self.video_vector
    }

    pub fn audio_vector(&self) -> &[f32] {
        &self.audio_vector
    }

    pub fn description_vector(&self) -> &[f32] {
        &self.description_vector
    }
}
