//! yt-dlp and FFmpeg CLI wrappers for the acquisition pipeline.
//!
//! This crate provides:
//! - Video search via yt-dlp's flat-playlist search
//! - Bounded-prefix downloads with failure classification
//! - Stream-copy clip extraction and duration probing
//! - Scoped temporary media handles
//! - Egress (proxy / IPv6 source address) rotation

pub mod clip;
pub mod command;
pub mod download;
pub mod egress;
pub mod error;
pub mod probe;
pub mod search;
pub mod temp;

pub use clip::StreamCopyClipper;
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use download::{classify_failure, DownloadedMedia, YtDlpDownloader};
pub use egress::{Egress, EgressPool, EgressStats};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_duration, probe_length_seconds};
pub use search::YtDlpSearch;
pub use temp::{TempMedia, TempStore};
