//! Scoped temporary media files.
//!
//! Every downloaded file and every clip lives in its own temporary directory
//! owned by a [`TempMedia`] handle. Dropping the handle removes the directory,
//! so a file is reclaimed exactly once on every exit path, including task
//! abortion. The owning [`TempStore`] counts live handles.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::debug;

use crate::error::MediaResult;

/// Factory for [`TempMedia`] handles.
#[derive(Debug, Clone, Default)]
pub struct TempStore {
    /// Parent directory; the system temp dir when unset.
    root: Option<PathBuf>,
    live: Arc<AtomicUsize>,
}

impl TempStore {
    /// Store rooted at the system temp directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store rooted at `root`.
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            live: Arc::default(),
        }
    }

    /// Allocate a fresh handle for a file named `{stem}.{ext}`.
    ///
    /// The file itself is not created; the path is ready to be written.
    pub fn create(&self, stem: &str, ext: &str) -> MediaResult<TempMedia> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vscrape-");
        let dir = match &self.root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let path = dir.path().join(format!("{stem}.{ext}"));

        self.live.fetch_add(1, Ordering::SeqCst);
        debug!(path = %path.display(), "Allocated temp media handle");

        Ok(TempMedia {
            path,
            _dir: dir,
            live: Arc::clone(&self.live),
        })
    }

    /// Number of handles not yet dropped.
    pub fn open_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Exclusively owned temporary media file.
#[derive(Debug)]
pub struct TempMedia {
    path: PathBuf,
    _dir: TempDir,
    live: Arc<AtomicUsize>,
}

impl TempMedia {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file on disk, or `None` if nothing was written.
    pub async fn file_len(&self) -> Option<u64> {
        tokio::fs::metadata(&self.path).await.ok().map(|m| m.len())
    }

    /// Whether the file exists and holds at least one byte.
    pub async fn has_data(&self) -> bool {
        self.file_len().await.is_some_and(|len| len > 0)
    }
}

impl Drop for TempMedia {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let store = TempStore::in_dir(root.path());

        let media = store.create("abc", "mp4").unwrap();
        assert_eq!(store.open_handles(), 1);
        assert!(media.path().ends_with("abc.mp4"));
        assert!(!media.has_data().await);

        tokio::fs::write(media.path(), b"data").await.unwrap();
        assert_eq!(media.file_len().await, Some(4));

        let dir = media.path().parent().unwrap().to_path_buf();
        drop(media);

        assert_eq!(store.open_handles(), 0);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_counter_shared_across_clones() {
        let store = TempStore::new();
        let clone = store.clone();

        let a = store.create("a", "mp4").unwrap();
        let b = clone.create("b", "mp4").unwrap();
        assert_ne!(a.path().parent(), b.path().parent());
        assert_eq!(store.open_handles(), 2);

        drop(a);
        assert_eq!(clone.open_handles(), 1);
        drop(b);
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_empty_file_has_no_data() {
        let store = TempStore::new();
        let media = store.create("empty", "mp4").unwrap();
        tokio::fs::write(media.path(), b"").await.unwrap();
        assert_eq!(media.file_len().await, Some(0));
        assert!(!media.has_data().await);
    }
}
