//! Embedding and chat-completion request/response types.

use serde::{Deserialize, Serialize};

/// Request for a batch of multi-modal embeddings.
///
/// `descriptions[i]` is paired with `video_paths[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub descriptions: Vec<String>,
    /// Paths to clip files readable by the service
    pub video_paths: Vec<String>,
}

impl EmbedRequest {
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

/// Embeddings per modality, one vector per request item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub video: Vec<Vec<f32>>,
    pub audio: Vec<Vec<f32>>,
    pub description: Vec<Vec<f32>>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}
