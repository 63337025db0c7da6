//! Stream-copy clip extraction.

use std::path::Path;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use vscrape_models::ClipWindow;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::temp::{TempMedia, TempStore};

/// Extracts clip windows from downloaded media without re-encoding.
#[derive(Debug, Clone)]
pub struct StreamCopyClipper {
    store: TempStore,
    timeout: Option<Duration>,
}

impl StreamCopyClipper {
    pub fn new(store: TempStore) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cut `window`, measured from the start of `input`, into a new temporary
    /// handle.
    ///
    /// The returned handle is independent of the input's lifetime. On any
    /// failure the output handle is dropped, removing partial output, before
    /// the error is returned. An empty output file counts as a failure.
    pub async fn clip(
        &self,
        input: &Path,
        window: ClipWindow,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<TempMedia> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("media");
        let output = self.store.create(&format!("{stem}_clip"), "mp4")?;

        info!(
            input = %input.display(),
            start = window.start_seconds(),
            end = window.end_seconds(),
            "Extracting clip"
        );

        let cmd = FfmpegCommand::new(input, output.path())
            .seek(f64::from(window.start_seconds()))
            .duration(f64::from(window.duration_seconds()))
            .codec_copy();

        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }
        if let Some(cancel) = cancel {
            runner = runner.with_cancel(cancel);
        }
        runner.run(&cmd).await?;

        if !output.has_data().await {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg produced an empty clip",
                None,
                None,
            ));
        }

        info!(output = %output.path().display(), "Clip extracted");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_input_allocates_nothing() {
        let store = TempStore::new();
        let clipper = StreamCopyClipper::new(store.clone());
        let window = ClipWindow::new(0, 10).unwrap();

        let result = clipper
            .clip(Path::new("/nonexistent/input.mp4"), window, None)
            .await;

        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
        assert_eq!(store.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_failed_transcode_releases_output() {
        let store = TempStore::new();
        let input = store.create("garbage", "mp4").unwrap();
        tokio::fs::write(input.path(), b"not a video").await.unwrap();

        let clipper = StreamCopyClipper::new(store.clone());
        let window = ClipWindow::new(0, 5).unwrap();
        let result = clipper.clip(input.path(), window, None).await;

        // Fails whether or not ffmpeg is installed
        assert!(result.is_err());
        assert_eq!(store.open_handles(), 1);
        drop(input);
        assert_eq!(store.open_handles(), 0);
    }
}
