//! Read-only set of ids already represented in the corpus.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::video::VideoId;

/// Errors loading a known-id file.
#[derive(Debug, Error)]
pub enum KnownIdsError {
    #[error("Failed to read known ids from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid known ids JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Shared, immutable de-duplication set.
///
/// Cloning is cheap; all clones see the same set.
#[derive(Debug, Clone, Default)]
pub struct KnownIdSet {
    ids: Arc<HashSet<VideoId>>,
}

impl KnownIdSet {
    /// Empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a file holding either a JSON array of strings or one id
    /// per line (blank lines and `#` comments are skipped).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KnownIdsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| KnownIdsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| KnownIdsError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(content: &str) -> Result<Self, serde_json::Error> {
        let trimmed = content.trim_start();
        if trimmed.starts_with('[') {
            let ids: Vec<String> = serde_json::from_str(trimmed)?;
            return Ok(ids.into_iter().map(VideoId::from).collect());
        }

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(VideoId::from)
            .collect())
    }

    pub fn contains(&self, id: &VideoId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<VideoId> for KnownIdSet {
    fn from_iter<I: IntoIterator<Item = VideoId>>(iter: I) -> Self {
        Self {
            ids: Arc::new(iter.into_iter().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# corpus ids\naaaaaaaaaaa\n\n  bbbbbbbbbbb  ").unwrap();

        let set = KnownIdSet::load(file.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&VideoId::from("aaaaaaaaaaa")));
        assert!(set.contains(&VideoId::from("bbbbbbbbbbb")));
    }

    #[test]
    fn test_load_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["aaaaaaaaaaa", "bbbbbbbbbbb", "aaaaaaaaaaa"]"#).unwrap();

        let set = KnownIdSet::load(file.path()).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = KnownIdSet::load("/nonexistent/known_ids.txt").unwrap_err();
        assert!(matches!(err, KnownIdsError::Read { .. }));
    }

    #[test]
    fn test_load_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2").unwrap();
        assert!(matches!(
            KnownIdSet::load(file.path()).unwrap_err(),
            KnownIdsError::Json { .. }
        ));
    }

    #[test]
    fn test_clones_share_set() {
        let set: KnownIdSet = [VideoId::from("aaaaaaaaaaa")].into_iter().collect();
        let clone = set.clone();
        assert!(clone.contains(&VideoId::from("aaaaaaaaaaa")));
        assert!(!KnownIdSet::empty().contains(&VideoId::from("aaaaaaaaaaa")));
    }
}
