//! Time windows within a video.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Half-open time interval `[start, end)` in seconds.
///
/// `0 <= start <= end` always holds. Windows produced for scoring are
/// never empty; an empty window only describes a video with no decodable
/// duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "RawSegment")]
pub struct Segment {
    start: f64,
    end: f64,
}

/// Unchecked wire form of [`Segment`].
#[derive(Deserialize, JsonSchema)]
struct RawSegment {
    start: f64,
    end: f64,
}

impl TryFrom<RawSegment> for Segment {
    type Error = SegmentError;

    fn try_from(raw: RawSegment) -> Result<Self, Self::Error> {
        Segment::new(raw.start, raw.end)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    #[error("Segment bounds must be finite: [{0}, {1})")]
    NotFinite(f64, f64),

    #[error("Segment start must be non-negative: {0}")]
    NegativeStart(f64),

    #[error("Segment end {end} precedes start {start}")]
    Inverted { start: f64, end: f64 },
}

impl Segment {
    /// Create a validated segment.
    pub fn new(start: f64, end: f64) -> Result<Self, SegmentError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(SegmentError::NotFinite(start, end));
        }
        if start < 0.0 {
            return Err(SegmentError::NegativeStart(start));
        }
        if end < start {
            return Err(SegmentError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Segment covering a whole video of `duration` seconds.
    ///
    /// Non-finite or negative durations collapse to the empty window `[0, 0)`.
    pub fn whole(duration: f64) -> Self {
        let end = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };
        Self { start: 0.0, end }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Returns true if timestamp `t` lies in `[start, end)`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.1}s, {:.1}s]", self.start, self.end)
    }
}
