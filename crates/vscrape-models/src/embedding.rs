//! Multi-modal embedding vectors.

use serde::{Deserialize, Serialize};

/// Video, audio and text vectors for one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingTriple {
    pub video: Vec<f32>,
    pub audio: Vec<f32>,
    pub text: Vec<f32>,
}

impl EmbeddingTriple {
    pub fn new(video: Vec<f32>, audio: Vec<f32>, text: Vec<f32>) -> Self {
        Self { video, audio, text }
    }

    /// All three vectors are present and contain only finite values.
    pub fn is_complete(&self) -> bool {
        [&self.video, &self.audio, &self.text]
            .iter()
            .all(|v| !v.is_empty() && v.iter().all(|x| x.is_finite()))
    }
}
