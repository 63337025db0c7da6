//! Time windows within a source video.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a window cannot be constructed or placed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("Window start {start}s is not before end {end}s")]
    Empty { start: u32, end: u32 },

    #[error("Window end {end}s exceeds limit {limit}s")]
    OutOfBounds { end: u32, limit: u32 },

    #[error("Window start {start}s precedes downloaded section at {section_start}s")]
    BeforeSection { start: u32, section_start: u32 },
}

/// A `[start, end)` range in whole seconds with `start < end`.
///
/// Deserialization goes through [`ClipWindow::new`], so an empty window
/// cannot be built from JSON either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct ClipWindow {
    start_seconds: u32,
    end_seconds: u32,
}

#[derive(Deserialize)]
struct RawWindow {
    start_seconds: u32,
    end_seconds: u32,
}

impl TryFrom<RawWindow> for ClipWindow {
    type Error = WindowError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        ClipWindow::new(raw.start_seconds, raw.end_seconds)
    }
}

impl ClipWindow {
    /// Create a non-empty window.
    pub fn new(start_seconds: u32, end_seconds: u32) -> Result<Self, WindowError> {
        if start_seconds >= end_seconds {
            return Err(WindowError::Empty {
                start: start_seconds,
                end: end_seconds,
            });
        }
        Ok(Self {
            start_seconds,
            end_seconds,
        })
    }

    /// The leading window of a section: `[offset, offset + min(length, cap))`.
    pub fn leading(offset: u32, length: u32, cap: u32) -> Result<Self, WindowError> {
        Self::new(offset, offset.saturating_add(length.min(cap)))
    }

    pub fn start_seconds(&self) -> u32 {
        self.start_seconds
    }

    pub fn end_seconds(&self) -> u32 {
        self.end_seconds
    }

    pub fn duration_seconds(&self) -> u32 {
        self.end_seconds - self.start_seconds
    }

    /// Translate a source-time window onto the timeline of a downloaded
    /// section that starts at `section_start` and measures `length` seconds.
    ///
    /// The translated window must satisfy `end <= min(length, max_clip_length)`.
    pub fn within_section(
        &self,
        section_start: u32,
        length: u32,
        max_clip_length: u32,
    ) -> Result<Self, WindowError> {
        if self.start_seconds < section_start {
            return Err(WindowError::BeforeSection {
                start: self.start_seconds,
                section_start,
            });
        }
        let relative = Self::new(
            self.start_seconds - section_start,
            self.end_seconds - section_start,
        )?;
        let limit = length.min(max_clip_length);
        if relative.end_seconds > limit {
            return Err(WindowError::OutOfBounds {
                end: relative.end_seconds,
                limit,
            });
        }
        Ok(relative)
    }
}
