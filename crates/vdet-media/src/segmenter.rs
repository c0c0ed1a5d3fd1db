//! Fixed-window segmentation of a video timeline.

use serde::{Deserialize, Serialize};
use vdet_models::Segment;

/// How a video of a given duration is split into analysis windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentPolicy {
    /// Length of each window in seconds.
    pub window_secs: f64,
    /// Videos at most this long are always scored as one window.
    pub short_video_secs: f64,
    /// Videos shorter than this are scored as one window by the dispatcher.
    pub full_video_below_secs: f64,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self {
            window_secs: 5.0,
            short_video_secs: 5.0,
            full_video_below_secs: 10.0,
        }
    }
}

impl SegmentPolicy {
    /// Whether a video of `duration` seconds should skip segmentation.
    pub fn full_video_for(&self, duration: f64) -> bool {
        duration < self.full_video_below_secs
    }

    /// Partition `[0, duration)` into ordered windows.
    ///
    /// Returns a single whole-video window when `full_video` is set or the
    /// video is short. Returns nothing for a video with no usable duration.
    pub fn plan(&self, duration: f64, full_video: bool) -> Vec<Segment> {
        if !duration.is_finite() || duration <= 0.0 {
            return Vec::new();
        }
        if full_video || duration <= self.short_video_secs || self.window_secs <= 0.0 {
            return vec![Segment::whole(duration)];
        }

        let mut segments = Vec::new();
        let mut i = 0u32;
        loop {
            // Index-based starts avoid drift from repeated addition.
            let start = f64::from(i) * self.window_secs;
            if start >= duration {
                break;
            }
            let end = (start + self.window_secs).min(duration);
            match Segment::new(start, end) {
                Ok(seg) if !seg.is_empty() => segments.push(seg),
                _ => break,
            }
            i += 1;
        }
        segments
    }
}
