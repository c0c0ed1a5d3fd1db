//! Evenly spaced frame sampling.
//!
//! Sampling never fails: an unopenable video yields `max_frames` missing
//! frames and a failed read leaves a gap at that position only. Missing
//! frames are zero-filled later by the [`TensorBuilder`](crate::TensorBuilder)
//! so temporal positions stay aligned.

use std::path::Path;

use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vdet_models::Segment;

use crate::tensor::FrameSize;
use crate::video::{VideoHandle, VideoMeta};

/// Frame count and spatial size fed to every model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub frame_size: FrameSize,
    pub max_frames: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            frame_size: FrameSize::default(),
            max_frames: 30,
        }
    }
}

/// Decoded frames at their sampled positions.
pub struct SampledFrames {
    /// Frame indices that were requested, one per slot.
    pub indices: Vec<i64>,
    /// Decoded frames in native BGR; `None` where decoding failed.
    pub frames: Vec<Option<Mat>>,
    /// Properties of the source video.
    pub meta: VideoMeta,
}

impl SampledFrames {
    fn missing(n: usize, meta: VideoMeta) -> Self {
        Self {
            indices: Vec::new(),
            frames: (0..n).map(|_| None).collect(),
            meta,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of slots that hold a decoded frame.
    pub fn decoded(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }
}

/// `n` evenly spaced integer positions over `[start, stop]`, inclusive of
/// both ends when `n > 1`. Fractional positions are truncated.
pub fn sample_indices(start: i64, stop: i64, n: usize) -> Vec<i64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) as f64 / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        stop
                    } else {
                        (start as f64 + i as f64 * step).trunc() as i64
                    }
                })
                .collect()
        }
    }
}

/// Frame-index range covering `segment`, clamped to the decodable frames.
fn segment_frame_range(meta: &VideoMeta, segment: &Segment) -> (i64, i64) {
    let last = meta.frame_count - 1;
    if meta.fps <= 0.0 {
        return (0, last);
    }
    let stop = ((segment.end() * meta.fps).floor() as i64).min(last);
    let start = ((segment.start() * meta.fps).floor() as i64).min(stop);
    (start.max(0), stop)
}

/// Reads evenly spaced frames from a video file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSampler {
    config: SamplerConfig,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample across the whole video.
    pub fn sample_whole(&self, path: &Path) -> SampledFrames {
        self.sample(path, None)
    }

    /// Sample across one time window of the video.
    pub fn sample_segment(&self, path: &Path, segment: &Segment) -> SampledFrames {
        self.sample(path, Some(segment))
    }

    fn sample(&self, path: &Path, segment: Option<&Segment>) -> SampledFrames {
        let n = self.config.max_frames;

        let mut handle = match VideoHandle::open(path) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot open video, using blank frames");
                return SampledFrames::missing(n, VideoMeta::default());
            }
        };

        let meta = handle.meta();
        if !meta.has_frames() {
            warn!(path = %path.display(), "Video reports no frames, using blank frames");
            return SampledFrames::missing(n, meta);
        }

        let (start, stop) = match segment {
            Some(seg) => segment_frame_range(&meta, seg),
            None => (0, meta.frame_count - 1),
        };
        let indices = sample_indices(start, stop, n);

        let frames: Vec<Option<Mat>> = indices
            .iter()
            .map(|&idx| match handle.read_at(idx) {
                Ok(frame) => {
                    if frame.is_none() {
                        debug!(index = idx, "No frame decoded at index");
                    }
                    frame
                }
                Err(e) => {
                    debug!(index = idx, error = %e, "Frame read failed");
                    None
                }
            })
            .collect();

        let sampled = SampledFrames {
            indices,
            frames,
            meta,
        };
        debug!(
            path = %path.display(),
            requested = n,
            decoded = sampled.decoded(),
            "Sampled frames"
        );
        sampled
    }
}
