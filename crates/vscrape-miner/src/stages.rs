//! Stage seams of the acquisition pipeline.
//!
//! Each external operation sits behind a small trait so the coordinator can
//! run against yt-dlp, FFmpeg and the embedding service in production and
//! against in-memory fakes in tests.

use std::path::Path;

use async_trait::async_trait;

use vscrape_media::{
    DownloadedMedia, Egress, MediaError, MediaResult, StreamCopyClipper, TempMedia,
    YtDlpDownloader, YtDlpSearch,
};
use vscrape_ml_client::{AugmentClient, EmbeddingClient, MlResult};
use vscrape_models::{
    CandidateState, ClipWindow, EmbeddingTriple, FailureKind, RawSearchEntry, SearchResult,
    WindowError,
};

/// External search provider.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, egress: Option<&Egress>)
        -> MediaResult<Vec<RawSearchEntry>>;
}

/// Rewrites a query before each search attempt.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    async fn rewrite(&self, query: &str) -> MlResult<String>;
}

/// Downloads a bounded prefix of a candidate's media.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(
        &self,
        candidate: &SearchResult,
        window_hint: Option<ClipWindow>,
        egress: Option<&Egress>,
    ) -> MediaResult<DownloadedMedia>;
}

/// Extracts a window from downloaded media into a new handle.
///
/// `window` is relative to the start of `media.file`, not to the source.
#[async_trait]
pub trait Clipper: Send + Sync {
    async fn clip(&self, media: &DownloadedMedia, window: ClipWindow) -> MediaResult<TempMedia>;
}

/// Produces the embedding triple for a clip and its description.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, description: &str, clip: &Path) -> MlResult<EmbeddingTriple>;
}

/// Chooses the clip window for a candidate.
pub trait WindowSelector: Send + Sync {
    /// Window to request at download time, when known up front.
    fn hint(&self, _query: &str, _candidate: &SearchResult) -> Option<ClipWindow> {
        None
    }

    /// Window to clip, in source time, once the download is measured.
    ///
    /// The file covers source seconds `media.section_start` onwards for
    /// `media.length_seconds`; the window must lie inside that section.
    fn select(
        &self,
        query: &str,
        candidate: &SearchResult,
        media: &DownloadedMedia,
        max_clip_length: u32,
    ) -> Result<ClipWindow, WindowError>;
}

/// Uses the query unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRewriter;

#[async_trait]
impl QueryRewriter for IdentityRewriter {
    async fn rewrite(&self, query: &str) -> MlResult<String> {
        Ok(query.to_string())
    }
}

/// The start of the downloaded section, at most `max_clip_length` long.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadingWindow;

impl WindowSelector for LeadingWindow {
    fn select(
        &self,
        _query: &str,
        _candidate: &SearchResult,
        media: &DownloadedMedia,
        max_clip_length: u32,
    ) -> Result<ClipWindow, WindowError> {
        ClipWindow::leading(media.section_start, media.length_seconds, max_clip_length)
    }
}

#[async_trait]
impl SearchProvider for YtDlpSearch {
    async fn search(
        &self,
        query: &str,
        egress: Option<&Egress>,
    ) -> MediaResult<Vec<RawSearchEntry>> {
        YtDlpSearch::search(self, query, egress).await
    }
}

#[async_trait]
impl QueryRewriter for AugmentClient {
    async fn rewrite(&self, query: &str) -> MlResult<String> {
        self.augment(query).await
    }
}

#[async_trait]
impl MediaFetcher for YtDlpDownloader {
    async fn fetch(
        &self,
        candidate: &SearchResult,
        window_hint: Option<ClipWindow>,
        egress: Option<&Egress>,
    ) -> MediaResult<DownloadedMedia> {
        self.download(candidate, window_hint, egress).await
    }
}

#[async_trait]
impl Clipper for StreamCopyClipper {
    async fn clip(&self, media: &DownloadedMedia, window: ClipWindow) -> MediaResult<TempMedia> {
        StreamCopyClipper::clip(self, media.file.path(), window, None).await
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, description: &str, clip: &Path) -> MlResult<EmbeddingTriple> {
        EmbeddingClient::embed(self, description, clip).await
    }
}

/// Map a media error raised while in `during` to the failure taxonomy.
///
/// Download errors that are neither a provider block nor unavailable content
/// count as "no result".
pub fn classify_media_error(during: CandidateState, err: &MediaError) -> FailureKind {
    match during {
        CandidateState::Downloading => match err {
            MediaError::ProviderBlocked { .. } => FailureKind::ProviderBlocked,
            MediaError::ContentUnavailable { .. } => FailureKind::ContentUnavailable,
            _ => FailureKind::EmptyResult,
        },
        CandidateState::Embedding => FailureKind::EmbeddingFailure,
        _ => FailureKind::TranscodeFailure,
    }
}
