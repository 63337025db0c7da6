//! Query-driven video acquisition pipeline.
//!
//! This crate provides:
//! - The search stage (parallel rewritten queries, known-id and live filtering)
//! - The pipeline coordinator (bounded fan-out, first-N completion, cleanup)
//! - Stage traits with yt-dlp / FFmpeg / embedding-service adapters
//! - Env configuration, structured run logging and metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod search;
pub mod stages;

pub use config::MinerConfig;
pub use error::{MinerError, MinerResult};
pub use logging::RunLogger;
pub use pipeline::{AcquireReport, Coordinator};
pub use search::SearchStage;
pub use stages::{
    Clipper, Embedder, IdentityRewriter, LeadingWindow, MediaFetcher, QueryRewriter,
    SearchProvider, WindowSelector,
};
