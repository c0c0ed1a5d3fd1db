//! OpenCV-backed video handle.
//!
//! A [`VideoHandle`] is opened per request and owned by exactly one
//! pipeline stage; the underlying capture is released on drop.

use std::path::{Path, PathBuf};

use opencv::core::Mat;
use opencv::prelude::{MatTraitConst, VideoCaptureTrait, VideoCaptureTraitConst};
use opencv::videoio::{
    VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
    CAP_PROP_FRAME_WIDTH, CAP_PROP_POS_FRAMES,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Container-level video properties as reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoMeta {
    /// Total frame count (may be zero or negative for broken files).
    pub frame_count: i64,
    /// Frames per second (zero when unknown).
    pub fps: f64,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl VideoMeta {
    /// Duration in seconds, `frame_count / fps`, or zero when either is unusable.
    pub fn duration(&self) -> f64 {
        if self.fps > 0.0 && self.frame_count > 0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Returns true if at least one frame can be addressed.
    pub fn has_frames(&self) -> bool {
        self.frame_count > 0
    }

    /// Probe a file, returning empty metadata if it cannot be opened.
    pub fn probe_or_empty(path: impl AsRef<Path>) -> Self {
        match VideoHandle::open(path.as_ref()) {
            Ok(handle) => handle.meta(),
            Err(e) => {
                debug!(path = %path.as_ref().display(), error = %e, "Probe failed, treating as empty video");
                Self::default()
            }
        }
    }
}

/// Exclusive handle on a decodable video.
pub struct VideoHandle {
    cap: VideoCapture,
    meta: VideoMeta,
    path: PathBuf,
}

impl VideoHandle {
    /// Open a video file for reading.
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| MediaError::InvalidVideo(format!("Non UTF-8 path: {}", path.display())))?;

        let cap = VideoCapture::from_file(path_str, CAP_ANY)
            .map_err(|e| MediaError::decode_failed(format!("Failed to open video: {e}")))?;

        if !cap.is_opened().unwrap_or(false) {
            return Err(MediaError::decode_failed(format!(
                "Failed to open video file: {}",
                path.display()
            )));
        }

        let meta = VideoMeta {
            frame_count: cap.get(CAP_PROP_FRAME_COUNT).unwrap_or(0.0) as i64,
            fps: cap.get(CAP_PROP_FPS).unwrap_or(0.0),
            width: cap.get(CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as i32,
            height: cap.get(CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as i32,
        };

        debug!(
            path = %path.display(),
            frames = meta.frame_count,
            fps = meta.fps,
            "Video opened: {}x{}",
            meta.width,
            meta.height
        );

        Ok(Self {
            cap,
            meta,
            path: path.to_path_buf(),
        })
    }

    pub fn meta(&self) -> VideoMeta {
        self.meta
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seek to `index` and decode that frame.
    ///
    /// Returns `Ok(None)` when the decoder yields no frame at that position.
    pub fn read_at(&mut self, index: i64) -> MediaResult<Option<Mat>> {
        self.cap
            .set(CAP_PROP_POS_FRAMES, index as f64)
            .map_err(|e| MediaError::decode_failed(format!("Seek to frame {index} failed: {e}")))?;
        self.read_next()
    }

    /// Decode the next frame in stream order.
    pub fn read_next(&mut self) -> MediaResult<Option<Mat>> {
        let mut frame = Mat::default();
        let ok = self
            .cap
            .read(&mut frame)
            .map_err(|e| MediaError::decode_failed(format!("Frame read failed: {e}")))?;
        if !ok || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}
