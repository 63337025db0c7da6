//! Video search through yt-dlp's `ytsearchN:` extractor.

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use vscrape_models::constants::SEARCH_RESULTS_PER_ATTEMPT;
use vscrape_models::RawSearchEntry;

use crate::command::check_ytdlp;
use crate::download::classify_failure;
use crate::egress::Egress;
use crate::error::{MediaError, MediaResult};

/// Flat-playlist JSON emitted by `--dump-single-json`.
#[derive(Debug, Deserialize)]
struct PlaylistDump {
    #[serde(default)]
    entries: Vec<Option<serde_json::Value>>,
}

/// Search client backed by yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpSearch {
    results_per_query: usize,
    timeout: Duration,
}

impl Default for YtDlpSearch {
    fn default() -> Self {
        Self {
            results_per_query: SEARCH_RESULTS_PER_ATTEMPT,
            timeout: Duration::from_secs(60),
        }
    }
}

impl YtDlpSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results_per_query(mut self, n: usize) -> Self {
        self.results_per_query = n.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one search and return the raw provider entries.
    pub async fn search(
        &self,
        query: &str,
        egress: Option<&Egress>,
    ) -> MediaResult<Vec<RawSearchEntry>> {
        check_ytdlp()?;

        let mut args: Vec<String> = vec![
            "--dump-single-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        if let Some(egress) = egress {
            args.extend(egress.ytdlp_args());
        }
        args.push(format!("ytsearch{}:{}", self.results_per_query, query));

        debug!(query = query, "Running yt-dlp search");

        let child = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| MediaError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp search stderr: {}", stderr);
            return Err(classify_search_failure(&stderr));
        }

        let entries = parse_search_output(&output.stdout)?;
        info!(query = query, count = entries.len(), "Search returned entries");
        Ok(entries)
    }
}

/// Classify a failed search run: provider blocks keep their kind so the
/// egress can be cooled down, everything else is a plain search failure.
pub fn classify_search_failure(stderr: &str) -> MediaError {
    match classify_failure(stderr) {
        blocked @ MediaError::ProviderBlocked { .. } => blocked,
        _ => MediaError::search_failed(
            stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("yt-dlp search failed")
                .trim(),
        ),
    }
}

/// Parse a flat-playlist dump, skipping entries without an id.
pub fn parse_search_output(stdout: &[u8]) -> MediaResult<Vec<RawSearchEntry>> {
    let dump: PlaylistDump = serde_json::from_slice(stdout)?;

    let mut entries = Vec::with_capacity(dump.entries.len());
    for value in dump.entries.into_iter().flatten() {
        match serde_json::from_value::<RawSearchEntry>(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping malformed search entry: {}", e),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_output() {
        let json = br#"{
            "_type": "playlist",
            "id": "cats",
            "entries": [
                {"id": "dQw4w9WgXcQ", "title": "A", "duration": 212.0, "view_count": 10},
                null,
                {"title": "no id"},
                {"id": "abcdefghijk", "title": "Live", "live_status": "is_live"}
            ]
        }"#;

        let entries = parse_search_output(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "dQw4w9WgXcQ");
        assert_eq!(entries[0].duration, Some(212.0));
        assert!(entries[1].is_live_broadcast());
    }

    #[test]
    fn test_parse_no_entries() {
        let entries = parse_search_output(br#"{"_type": "playlist"}"#).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_search_output(b"ERROR: nope"),
            Err(MediaError::JsonParse(_))
        ));
    }

    #[test]
    fn test_classify_search_failure() {
        let blocked = classify_search_failure(
            "ERROR: [youtube:search] cats: HTTP Error 429: Too Many Requests\n",
        );
        assert!(blocked.is_provider_blocked());

        let bot = classify_search_failure("ERROR: Sign in to confirm you're not a bot");
        assert!(bot.is_provider_blocked());

        match classify_search_failure("ERROR: Unable to extract yt initial data\n\n") {
            MediaError::SearchFailed { message } => {
                assert_eq!(message, "ERROR: Unable to extract yt initial data")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            classify_search_failure(""),
            MediaError::SearchFailed { .. }
        ));
    }
}
