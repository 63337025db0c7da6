//! Video identifier model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a provider video identifier.
pub const VIDEO_ID_LEN: usize = 11;

/// Opaque external identifier of a video (e.g. a YouTube video id).
///
/// Construction does not validate; use [`VideoId::is_valid`] before handing
/// the id to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id has the provider's fixed-length token format.
    pub fn is_valid(&self) -> bool {
        self.0.len() == VIDEO_ID_LEN
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Canonical watch URL for this id.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
