//! Generative query augmentation through an OpenAI-style chat endpoint.
//!
//! Each call may produce a different rewrite, so parallel search attempts
//! for the same query explore different result sets.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use tracing::{debug, info};

use crate::error::{MlError, MlResult};
use crate::types::{ChatMessage, ChatRequest, ChatResponse};

const SYSTEM_PROMPT: &str = "You rewrite short video search queries. Given a topic, reply with one \
    YouTube search query of at most 12 words that would surface varied, relevant, non-live videos \
    about it. Reply with the query only, without quotes or explanation.";

/// How search queries are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AugmentMode {
    /// Use the query as-is.
    #[default]
    None,
    /// Rewrite through a chat-completions model.
    OpenAi,
}

impl AugmentMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" | "" => Some(AugmentMode::None),
            "openai" => Some(AugmentMode::OpenAi),
            _ => None,
        }
    }
}

/// Configuration for query augmentation.
#[derive(Debug, Clone)]
pub struct AugmentConfig {
    pub mode: AugmentMode,
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL of the chat API (`.../v1`)
    pub base_url: String,
    pub timeout: Duration,
    pub temperature: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            mode: AugmentMode::None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(20),
            temperature: 0.9,
        }
    }
}

impl AugmentConfig {
    /// Create config from environment variables.
    ///
    /// Without an explicit `AUGMENT_MODE`, augmentation is enabled whenever
    /// `OPENAI_API_KEY` is set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let mode = std::env::var("AUGMENT_MODE")
            .ok()
            .and_then(|m| AugmentMode::parse(&m))
            .unwrap_or(if api_key.is_some() {
                AugmentMode::OpenAi
            } else {
                AugmentMode::None
            });

        Self {
            mode,
            api_key,
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            timeout: std::env::var("AUGMENT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            temperature: defaults.temperature,
        }
    }
}

/// Query rewriter client.
#[derive(Debug, Clone)]
pub struct AugmentClient {
    http: Client,
    config: AugmentConfig,
}

impl AugmentClient {
    pub fn new(config: AugmentConfig) -> MlResult<Self> {
        if config.mode == AugmentMode::OpenAi && config.api_key.is_none() {
            return Err(MlError::NotConfigured(
                "OPENAI_API_KEY is required for OpenAI augmentation".to_string(),
            ));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        info!(mode = ?config.mode, model = %config.model, "Query augmentation configured");
        Ok(Self { http, config })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(AugmentConfig::from_env())
    }

    pub fn mode(&self) -> AugmentMode {
        self.config.mode
    }

    /// Rewrite `query` for search.
    pub async fn augment(&self, query: &str) -> MlResult<String> {
        match self.config.mode {
            AugmentMode::None => Ok(query.to_string()),
            AugmentMode::OpenAi => self.chat_rewrite(query).await,
        }
    }

    async fn chat_rewrite(&self, query: &str) -> MlResult<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| MlError::NotConfigured("OPENAI_API_KEY".to_string()))?;

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| MlError::NotConfigured("invalid OpenAI API key".to_string()))?,
        );

        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: 64,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: query,
                },
            ],
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| MlError::from_send(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                MlError::ServiceUnavailable(format!("{}: {}", status, text))
            } else {
                MlError::RequestFailed(format!("Chat API returned {}: {}", status, text))
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let rewritten = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|c| clean_rewrite(&c))
            .filter(|c| !c.is_empty())
            .ok_or_else(|| MlError::InvalidResponse("Empty rewrite".to_string()))?;

        debug!(query = query, rewritten = %rewritten, "Augmented query");
        Ok(rewritten)
    }
}

/// First line of the model output with surrounding quotes removed.
fn clean_rewrite(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn openai_config(server: &MockServer) -> AugmentConfig {
        AugmentConfig {
            mode: AugmentMode::OpenAi,
            api_key: Some("sk-test".to_string()),
            base_url: format!("{}/v1", server.uri()),
            ..AugmentConfig::default()
        }
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(AugmentMode::parse("OpenAI"), Some(AugmentMode::OpenAi));
        assert_eq!(AugmentMode::parse("none"), Some(AugmentMode::None));
        assert_eq!(AugmentMode::parse("llama"), None);
    }

    #[test]
    fn test_clean_rewrite() {
        assert_eq!(clean_rewrite("\n\"funny cat compilation\"\nextra"), "funny cat compilation");
        assert_eq!(clean_rewrite("   "), "");
    }

    #[test]
    fn test_openai_requires_key() {
        let config = AugmentConfig {
            mode: AugmentMode::OpenAi,
            ..AugmentConfig::default()
        };
        assert!(matches!(
            AugmentClient::new(config),
            Err(MlError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_none_mode_is_identity() {
        let client = AugmentClient::new(AugmentConfig::default()).unwrap();
        assert_eq!(client.augment("cats").await.unwrap(), "cats");
    }

    #[tokio::test]
    async fn test_openai_rewrite() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "\"kittens playing with yarn\""}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = AugmentClient::new(openai_config(&server)).unwrap();
        assert_eq!(
            client.augment("cats").await.unwrap(),
            "kittens playing with yarn"
        );
    }

    #[tokio::test]
    async fn test_openai_empty_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = AugmentClient::new(openai_config(&server)).unwrap();
        assert!(matches!(
            client.augment("cats").await,
            Err(MlError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_openai_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = AugmentClient::new(openai_config(&server)).unwrap();
        assert!(matches!(
            client.augment("cats").await,
            Err(MlError::RequestFailed(_))
        ));
    }
}
