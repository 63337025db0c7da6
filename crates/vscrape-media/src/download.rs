//! Bounded-prefix video download using yt-dlp.
//!
//! Every download requests an explicit `--download-sections` range so that at
//! most `ceiling_secs` of the source is fetched, whatever its real length, and
//! a `--max-filesize` ceiling so that the transfer is size-bounded too.
//! Failures reported by yt-dlp are classified from its stderr:
//!
//! - provider block / rate limit → [`MediaError::ProviderBlocked`]
//! - missing, private or malformed video → [`MediaError::ContentUnavailable`]
//! - anything else, including an empty file → "no result"
//!   ([`MediaError::EmptyDownload`] / [`MediaError::DownloadFailed`])

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, info, warn};

use vscrape_models::constants::FIVE_MINUTES;
use vscrape_models::{ClipWindow, SearchResult, VideoId};

use crate::command::check_ytdlp;
use crate::egress::Egress;
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_length_seconds;
use crate::temp::{TempMedia, TempStore};

/// Stderr fragments meaning the provider refused our network identity.
const BLOCKED_MARKERS: &[&str] = &[
    "Your IP is likely being blocked",
    "Requested format is not available",
    "HTTP Error 429",
    "Too Many Requests",
    "Sign in to confirm",
];

/// Stderr fragments meaning the video itself cannot be fetched.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "Video unavailable",
    "is not a valid URL",
    "Incomplete YouTube ID",
    "Private video",
    "has been removed",
    "This video is no longer available",
];

/// Cheapest stream yt-dlp can give us; quality is irrelevant for embedding.
const DEFAULT_FORMAT: &str = "worst[ext=mp4]/worst";

/// Size ceiling for one download (100 MiB).
pub const DEFAULT_MAX_FILESIZE_BYTES: u64 = 100 * 1024 * 1024;

/// A downloaded media prefix, exclusively owned by one worker.
#[derive(Debug)]
pub struct DownloadedMedia {
    pub id: VideoId,
    pub file: TempMedia,
    /// Source second at which the file's timeline begins
    pub section_start: u32,
    /// Measured length of the file; replaces the length the provider declared
    pub length_seconds: u32,
}

/// yt-dlp download client.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    store: TempStore,
    ceiling_secs: u32,
    format: String,
    max_filesize_bytes: u64,
    timeout: Option<Duration>,
}

impl YtDlpDownloader {
    pub fn new(store: TempStore) -> Self {
        Self {
            store,
            ceiling_secs: FIVE_MINUTES,
            format: DEFAULT_FORMAT.to_string(),
            max_filesize_bytes: DEFAULT_MAX_FILESIZE_BYTES,
            timeout: None,
        }
    }

    /// Maximum number of seconds fetched from any source.
    pub fn with_ceiling(mut self, ceiling_secs: u32) -> Self {
        self.ceiling_secs = ceiling_secs.max(1);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Larger downloads are abandoned by yt-dlp and end up as "no result".
    pub fn with_max_filesize(mut self, bytes: u64) -> Self {
        self.max_filesize_bytes = bytes.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The `(start, end)` range requested for a download.
    pub fn section(&self, window_hint: Option<ClipWindow>) -> (u32, u32) {
        match window_hint {
            Some(w) => {
                let start = w.start_seconds();
                let end = w.end_seconds().min(start.saturating_add(self.ceiling_secs));
                (start, end)
            }
            None => (0, self.ceiling_secs),
        }
    }

    /// Build the yt-dlp argument list.
    pub fn build_args(
        &self,
        id: &VideoId,
        section: (u32, u32),
        egress: Option<&Egress>,
        output: &std::path::Path,
    ) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-part".to_string(),
            "-f".to_string(),
            self.format.clone(),
            "--download-sections".to_string(),
            format!("*{}-{}", section.0, section.1),
            "--max-filesize".to_string(),
            self.max_filesize_bytes.to_string(),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
        ];
        if let Some(egress) = egress {
            args.extend(egress.ytdlp_args());
        }
        args.push(id.watch_url());
        args
    }

    /// Download the bounded prefix (or the hinted window) of `candidate`.
    ///
    /// The returned media's length is measured with ffprobe. Every error path
    /// drops the temporary handle before returning.
    pub async fn download(
        &self,
        candidate: &SearchResult,
        window_hint: Option<ClipWindow>,
        egress: Option<&Egress>,
    ) -> MediaResult<DownloadedMedia> {
        let id = &candidate.id;
        if !id.is_valid() {
            return Err(MediaError::content_unavailable(format!(
                "Invalid video id: {id}"
            )));
        }

        check_ytdlp()?;

        let file = self.store.create(id.as_str(), "mp4")?;
        let section = self.section(window_hint);
        let args = self.build_args(id, section, egress, file.path());
        let started = Instant::now();

        info!(
            video_id = %id,
            start = section.0,
            end = section.1,
            egress = egress.map(|e| e.to_string()),
            "Downloading video section"
        );

        let child = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(t) => tokio::time::timeout(t, child)
                .await
                .map_err(|_| MediaError::Timeout(t.as_secs()))??,
            None => child.await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            let err = classify_failure(&stderr);
            warn!(video_id = %id, error = %err, "Download failed");
            return Err(err);
        }

        if !file.has_data().await {
            warn!(video_id = %id, "Download produced no data");
            return Err(MediaError::EmptyDownload(file.path().to_path_buf()));
        }

        let length_seconds = probe_length_seconds(file.path()).await?;
        if length_seconds == 0 {
            return Err(MediaError::EmptyDownload(file.path().to_path_buf()));
        }

        info!(
            video_id = %id,
            declared_secs = candidate.total_length_seconds,
            measured_secs = length_seconds,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Downloaded video section"
        );

        Ok(DownloadedMedia {
            id: id.clone(),
            file,
            section_start: section.0,
            length_seconds,
        })
    }
}

/// Classify a failed yt-dlp run from its stderr.
pub fn classify_failure(stderr: &str) -> MediaError {
    let last_line = stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("Unknown error")
        .trim()
        .to_string();

    if BLOCKED_MARKERS.iter().any(|m| stderr.contains(m)) {
        return MediaError::provider_blocked(last_line);
    }
    if UNAVAILABLE_MARKERS.iter().any(|m| stderr.contains(m)) {
        return MediaError::content_unavailable(last_line);
    }
    MediaError::download_failed(last_line)
}
