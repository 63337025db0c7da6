//! Clients for the external ML services used by the pipeline.
//!
//! This crate provides:
//! - An HTTP client for the multi-modal embedding service
//! - Generative query augmentation via a chat-completions API

pub mod augment;
pub mod client;
pub mod error;
pub mod types;

pub use augment::{AugmentClient, AugmentConfig, AugmentMode};
pub use client::{EmbeddingClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::{EmbedRequest, EmbedResponse, HealthResponse};
