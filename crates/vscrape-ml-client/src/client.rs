//! Embedding service HTTP client.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use vscrape_models::EmbeddingTriple;

use crate::error::{MlError, MlResult};
use crate::types::{EmbedRequest, EmbedResponse, HealthResponse};

/// Configuration for the embedding client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of the embedding service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// Base delay between retries, doubled per attempt
    pub retry_delay: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("EMBED_SERVICE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("EMBED_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("EMBED_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_delay: defaults.retry_delay,
        }
    }
}

/// Client for the multi-modal embedding service.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: Client,
    config: MlClientConfig,
}

impl EmbeddingClient {
    /// Create a new embedding client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check if the embedding service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = self.endpoint("health");

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Embedding service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Embedding service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Embed one clip with its description.
    pub async fn embed(&self, description: &str, clip: &Path) -> MlResult<EmbeddingTriple> {
        let mut triples = self.embed_batch(&[(description, clip)]).await?;
        triples
            .pop()
            .ok_or_else(|| MlError::InvalidResponse("Empty embedding batch".to_string()))
    }

    /// Embed a batch of `(description, clip path)` pairs.
    ///
    /// The response must hold exactly one non-empty vector per item for every
    /// modality; anything else is rejected.
    pub async fn embed_batch(&self, items: &[(&str, &Path)]) -> MlResult<Vec<EmbeddingTriple>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            descriptions: items.iter().map(|(d, _)| d.to_string()).collect(),
            video_paths: items
                .iter()
                .map(|(_, p)| p.to_string_lossy().to_string())
                .collect(),
        };
        let url = self.endpoint("embed");

        debug!(count = request.len(), "Sending embedding request to {}", url);

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| MlError::from_send(e, self.config.timeout))?;

                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let body = response.text().await.unwrap_or_default();
                if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                    Err(MlError::ServiceUnavailable(format!("{}: {}", status, body)))
                } else {
                    Err(MlError::RequestFailed(format!(
                        "Embedding service returned {}: {}",
                        status, body
                    )))
                }
            })
            .await?;

        let embeddings: EmbedResponse = response.json().await?;
        into_triples(embeddings, request.len())
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.retry_delay * 2u32.pow(attempt);
                    warn!(
                        "Embedding request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(MlError::RequestFailed("Unknown error".to_string())))
    }
}

fn into_triples(response: EmbedResponse, expected: usize) -> MlResult<Vec<EmbeddingTriple>> {
    let EmbedResponse {
        video,
        audio,
        description,
    } = response;

    if video.len() != expected || audio.len() != expected || description.len() != expected {
        return Err(MlError::InvalidResponse(format!(
            "Expected {} vectors per modality, got video={} audio={} description={}",
            expected,
            video.len(),
            audio.len(),
            description.len()
        )));
    }

    let triples: Vec<EmbeddingTriple> = video
        .into_iter()
        .zip(audio)
        .zip(description)
        .map(|((v, a), t)| EmbeddingTriple::new(v, a, t))
        .collect();

    if let Some(i) = triples.iter().position(|t| !t.is_complete()) {
        return Err(MlError::InvalidResponse(format!(
            "Item {} has an empty or non-finite vector",
            i
        )));
    }

    Ok(triples)
}
