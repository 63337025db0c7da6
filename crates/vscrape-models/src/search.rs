//! Search provider entries and normalized search results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::FIVE_MINUTES;
use crate::video::VideoId;

/// Entry as reported by the search provider, before normalization.
///
/// Field names follow the flat-playlist JSON that yt-dlp emits for
/// `ytsearchN:` queries; everything except the id may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSearchEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Duration in seconds (fractional for some extractors)
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub is_live: Option<bool>,
    /// `is_live`, `was_live`, `not_live`, `is_upcoming`, `post_live`
    #[serde(default)]
    pub live_status: Option<String>,
}

impl RawSearchEntry {
    /// Whether the entry is an ongoing live broadcast.
    pub fn is_live_broadcast(&self) -> bool {
        self.is_live == Some(true) || self.live_status.as_deref() == Some("is_live")
    }

    /// Normalize into a [`SearchResult`], applying provider defaults.
    ///
    /// Missing or zero durations become five minutes; missing view counts
    /// become zero.
    pub fn into_result(self) -> SearchResult {
        let total_length_seconds = match self.duration {
            Some(d) if d.is_finite() && d >= 1.0 => d.trunc() as u32,
            _ => FIVE_MINUTES,
        };

        SearchResult {
            id: VideoId::from(self.id),
            title: self.title.unwrap_or_default(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            total_length_seconds,
            view_count: self.view_count.unwrap_or(0),
        }
    }
}

/// A candidate video returned by the search stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    pub id: VideoId,
    pub title: String,
    pub description: Option<String>,
    /// Declared length; replaced by the measured length after download
    pub total_length_seconds: u32,
    pub view_count: u64,
}

impl SearchResult {
    /// Text used as the record description: the title, followed by the
    /// provider description when one exists.
    pub fn compose_description(&self) -> String {
        match &self.description {
            Some(desc) => format!("{}\n\n{}", self.title, desc),
            None => self.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(json: &str) -> RawSearchEntry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let result = entry(r#"{"id": "dQw4w9WgXcQ", "title": "t"}"#).into_result();
        assert_eq!(result.total_length_seconds, FIVE_MINUTES);
        assert_eq!(result.view_count, 0);
        assert_eq!(result.description, None);
    }

    #[test]
    fn test_duration_truncated() {
        let result =
            entry(r#"{"id": "dQw4w9WgXcQ", "title": "t", "duration": 212.7, "view_count": 42}"#)
                .into_result();
        assert_eq!(result.total_length_seconds, 212);
        assert_eq!(result.view_count, 42);
    }

    #[test]
    fn test_zero_duration_uses_default() {
        let result = entry(r#"{"id": "dQw4w9WgXcQ", "duration": 0.0}"#).into_result();
        assert_eq!(result.total_length_seconds, FIVE_MINUTES);
        assert_eq!(result.title, "");
    }

    #[test]
    fn test_live_detection() {
        assert!(entry(r#"{"id": "a", "is_live": true}"#).is_live_broadcast());
        assert!(entry(r#"{"id": "a", "live_status": "is_live"}"#).is_live_broadcast());
        assert!(!entry(r#"{"id": "a", "live_status": "was_live"}"#).is_live_broadcast());
        assert!(!entry(r#"{"id": "a", "is_live": null}"#).is_live_broadcast());
    }

    #[test]
    fn test_compose_description() {
        let mut result = entry(r#"{"id": "a", "title": "Title", "description": "Body"}"#).into_result();
        assert_eq!(result.compose_description(), "Title\n\nBody");

        result.description = None;
        assert_eq!(result.compose_description(), "Title");
    }

    #[test]
    fn test_blank_description_dropped() {
        let result = entry(r#"{"id": "a", "title": "Title", "description": "   "}"#).into_result();
        assert_eq!(result.description, None);
    }
}
