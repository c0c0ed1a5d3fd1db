//! Annotated video rendering.
//!
//! Re-encodes a source video frame by frame at native size and rate,
//! drawing a square around the dominant motion region on frames whose
//! timestamp falls inside a violent segment.

use std::path::{Path, PathBuf};

use opencv::core::{Mat, Point, Rect, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::VideoWriter;
use scopeguard::ScopeGuard;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vdet_models::Segment;

use crate::error::{MediaError, MediaResult};
use crate::motion::{MotionLocalizer, MotionParams};
use crate::video::VideoHandle;

/// Suffix appended to the source stem for rendered files.
const ANNOTATED_SUFFIX: &str = "_annotated";

/// Rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Directory that receives annotated videos.
    pub output_dir: PathBuf,
    pub motion: MotionParams,
    /// Box side as a fraction of the smaller frame dimension.
    pub box_fraction: f64,
    /// Four-character codec code for the writer.
    pub fourcc: [char; 4],
    /// Frame rate used when the source reports none.
    pub fallback_fps: f64,
    pub box_thickness: i32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("annotated_videos"),
            motion: MotionParams::default(),
            box_fraction: 0.15,
            fourcc: ['m', 'p', '4', 'v'],
            fallback_fps: 25.0,
            box_thickness: 3,
        }
    }
}

impl RenderConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

/// Produces an annotated copy of a video.
pub trait AnnotationRenderer: Send + Sync {
    /// Render `source`, marking frames inside any of `violent`.
    ///
    /// Returns the path of the written file.
    fn render(&self, source: &Path, violent: &[Segment]) -> MediaResult<PathBuf>;
}

/// Deterministic output location: `{output_dir}/{stem}_annotated.mp4`.
pub fn annotated_output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    output_dir.join(format!("{stem}{ANNOTATED_SUFFIX}.mp4"))
}

/// Square of side `fraction * min(width, height)` centred on `center`,
/// clipped to the frame.
pub fn focus_box(center: Point, width: i32, height: i32, fraction: f64) -> Rect {
    let side = (f64::from(width.min(height).max(0)) * fraction) as i32;
    let half = side / 2;
    let x1 = (center.x - half).clamp(0, width.max(0));
    let y1 = (center.y - half).clamp(0, height.max(0));
    let x2 = (center.x - half + side).clamp(x1, width.max(0));
    let y2 = (center.y - half + side).clamp(y1, height.max(0));
    Rect::new(x1, y1, x2 - x1, y2 - y1)
}

/// OpenCV implementation of [`AnnotationRenderer`].
#[derive(Debug, Clone, Default)]
pub struct AnnotatedVideoRenderer {
    config: RenderConfig,
    localizer: MotionLocalizer,
}

impl AnnotatedVideoRenderer {
    pub fn new(config: RenderConfig) -> Self {
        let localizer = MotionLocalizer::new(config.motion);
        Self { config, localizer }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn open_writer(&self, path: &Path, fps: f64, size: Size) -> MediaResult<VideoWriter> {
        let path_str = path
            .to_str()
            .ok_or_else(|| MediaError::encode_failed(format!("Non UTF-8 path: {}", path.display())))?;
        let [a, b, c, d] = self.config.fourcc;
        let fourcc = VideoWriter::fourcc(a, b, c, d)
            .map_err(|e| MediaError::encode_failed(format!("fourcc: {e}")))?;
        let writer = VideoWriter::new(path_str, fourcc, fps, size, true)
            .map_err(|e| MediaError::encode_failed(format!("open writer: {e}")))?;
        if !writer.is_opened().unwrap_or(false) {
            return Err(MediaError::encode_failed(format!(
                "VideoWriter failed to open: {}",
                path.display()
            )));
        }
        Ok(writer)
    }

    /// Draw the motion box on `curr` if a large enough region moved.
    fn annotate(&self, prev: &Mat, curr: &mut Mat) -> MediaResult<bool> {
        let prev_gray = gray(prev)?;
        let curr_gray = gray(curr)?;
        let Some(center) = self.localizer.locate(&prev_gray, &curr_gray)? else {
            return Ok(false);
        };
        let rect = focus_box(center, curr.cols(), curr.rows(), self.config.box_fraction);
        imgproc::rectangle(
            curr,
            rect,
            Scalar::new(0.0, 0.0, 255.0, 0.0),
            self.config.box_thickness,
            imgproc::LINE_8,
            0,
        )
        .map_err(|e| MediaError::processing_failed(format!("draw box: {e}")))?;
        Ok(true)
    }
}

impl AnnotationRenderer for AnnotatedVideoRenderer {
    fn render(&self, source: &Path, violent: &[Segment]) -> MediaResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let out_path = annotated_output_path(&self.config.output_dir, source);

        let mut video = VideoHandle::open(source)?;
        let meta = video.meta();
        let fps = if meta.fps > 0.0 {
            meta.fps
        } else {
            self.config.fallback_fps
        };

        let Some(first) = video.read_next()? else {
            return Err(MediaError::decode_failed(format!(
                "No decodable frames in {}",
                source.display()
            )));
        };

        // Removes a partially written file unless rendering completes.
        let partial = scopeguard::guard(out_path, remove_partial);

        let size = Size::new(first.cols(), first.rows());
        let mut writer = self.open_writer(&partial, fps, size)?;
        writer
            .write(&first)
            .map_err(|e| MediaError::encode_failed(format!("write frame: {e}")))?;

        let mut prev = first;
        let mut written = 1u64;
        let mut annotated = 0u64;
        let mut idx = 1u64;

        while let Some(mut curr) = video.read_next()? {
            let t = idx as f64 / fps;
            if violent.iter().any(|seg| seg.contains(t)) {
                match self.annotate(&prev, &mut curr) {
                    Ok(true) => annotated += 1,
                    Ok(false) => {}
                    Err(e) => debug!(frame = idx, error = %e, "Motion localisation failed"),
                }
            }
            writer
                .write(&curr)
                .map_err(|e| MediaError::encode_failed(format!("write frame: {e}")))?;
            written += 1;
            prev = curr;
            idx += 1;
        }

        writer
            .release()
            .map_err(|e| MediaError::encode_failed(format!("release writer: {e}")))?;
        let out_path = ScopeGuard::into_inner(partial);

        info!(
            source = %source.display(),
            output = %out_path.display(),
            frames = written,
            annotated,
            "Annotated video rendered"
        );
        Ok(out_path)
    }
}

fn remove_partial(path: PathBuf) {
    match std::fs::remove_file(&path) {
        Ok(()) => warn!(path = %path.display(), "Removed partial annotated video"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}

fn gray(frame: &Mat) -> MediaResult<Mat> {
    let code = match frame.channels() {
        1 => return Ok(frame.clone()),
        4 => imgproc::COLOR_BGRA2GRAY,
        _ => imgproc::COLOR_BGR2GRAY,
    };
    let mut out = Mat::default();
    imgproc::cvt_color_def(frame, &mut out, code)
        .map_err(|e| MediaError::processing_failed(format!("to gray: {e}")))?;
    Ok(out)
}
