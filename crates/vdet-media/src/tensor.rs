//! Fixed-shape model input tensors.
//!
//! Every tensor produced here has shape `(max_frames, H, W, C)` no matter
//! how many frames actually decoded.

use ndarray::{s, Array4, ArrayView4};
use opencv::core::{Mat, Scalar, Size, CV_8U, CV_8UC1};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::flow::{flow_vectors, FarnebackParams};
use crate::sampler::{SampledFrames, SamplerConfig};

/// Spatial size of model input frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: i32,
    pub height: i32,
}

impl Default for FrameSize {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
        }
    }
}

impl FrameSize {
    fn cv(&self) -> Size {
        Size::new(self.width, self.height)
    }

    fn pixels(&self) -> usize {
        self.width.max(0) as usize * self.height.max(0) as usize
    }

    /// Number of values in one RGB frame.
    pub fn rgb_len(&self) -> usize {
        self.pixels() * FrameTensor::CHANNELS
    }
}

/// RGB frames in `[0, 1]`, shape `(N, H, W, 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTensor(Array4<f32>);

/// Optical flow fields, shape `(N, H, W, 2)`; entry 0 is always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowTensor(Array4<f32>);

macro_rules! impl_tensor {
    ($name:ident, $channels:expr) => {
        impl $name {
            pub const CHANNELS: usize = $channels;

            /// All-zero tensor of the configured shape.
            pub fn zeros(frames: usize, size: FrameSize) -> Self {
                Self(Array4::zeros((
                    frames,
                    size.height.max(0) as usize,
                    size.width.max(0) as usize,
                    $channels,
                )))
            }

            pub fn shape(&self) -> [usize; 4] {
                let s = self.0.shape();
                [s[0], s[1], s[2], s[3]]
            }

            pub fn view(&self) -> ArrayView4<'_, f32> {
                self.0.view()
            }

            pub fn into_inner(self) -> Array4<f32> {
                self.0
            }
        }
    };
}

impl_tensor!(FrameTensor, 3);
impl_tensor!(FlowTensor, 2);

/// Inputs for one analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipTensors {
    pub rgb: FrameTensor,
    /// Present only when flow was requested.
    pub flow: Option<FlowTensor>,
}

/// Write interleaved BGR bytes into `out` as RGB scaled to `[0, 1]`.
///
/// `out` must hold exactly `bgr.len()` values.
pub fn bgr_to_rgb_unit(bgr: &[u8], out: &mut [f32]) {
    for (src, dst) in bgr.chunks_exact(3).zip(out.chunks_exact_mut(3)) {
        dst[0] = f32::from(src[2]) / 255.0;
        dst[1] = f32::from(src[1]) / 255.0;
        dst[2] = f32::from(src[0]) / 255.0;
    }
}

/// Turns sampled frames into model tensors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TensorBuilder {
    config: SamplerConfig,
    flow: FarnebackParams,
}

impl TensorBuilder {
    pub fn new(config: SamplerConfig, flow: FarnebackParams) -> Self {
        Self { config, flow }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Build the RGB tensor and, if `with_flow`, the flow tensor.
    ///
    /// Slots beyond the sampled frames, and frames that fail conversion,
    /// are zero. Flow between two frames uses their grayscale at model
    /// resolution; a missing frame contributes a black image.
    pub fn build(&self, sampled: &SampledFrames, with_flow: bool) -> MediaResult<ClipTensors> {
        let n = self.config.max_frames;
        let size = self.config.frame_size;

        let mut rgb = FrameTensor::zeros(n, size);
        let mut flow = with_flow.then(|| FlowTensor::zeros(n, size));
        let mut prev_gray: Option<Mat> = None;

        for slot in 0..n {
            let resized = match sampled.frames.get(slot).and_then(Option::as_ref) {
                Some(frame) => match self.resize_bgr(frame) {
                    Ok(mat) => Some(mat),
                    Err(e) => {
                        warn!(slot, error = %e, "Frame conversion failed, zero-filling");
                        None
                    }
                },
                None => None,
            };

            if let Some(ref mat) = resized {
                let bytes = mat
                    .data_bytes()
                    .map_err(|e| MediaError::processing_failed(format!("frame data access: {e}")))?;
                let mut dst = rgb.0.slice_mut(s![slot, .., .., ..]);
                match dst.as_slice_mut() {
                    Some(out) if out.len() == bytes.len() => bgr_to_rgb_unit(bytes, out),
                    _ => warn!(slot, "Unexpected frame layout, zero-filling"),
                }
            }

            let Some(flow) = flow.as_mut() else {
                continue;
            };

            let gray = match resized {
                Some(ref mat) => to_gray(mat)?,
                None => blank_gray(size)?,
            };
            if let Some(prev) = prev_gray.as_ref() {
                match self.flow.compute(prev, &gray) {
                    Ok(field) => {
                        let vectors = flow_vectors(&field)?;
                        let mut dst = flow.0.slice_mut(s![slot, .., .., ..]);
                        if let Some(out) = dst.as_slice_mut() {
                            for (v, o) in vectors.iter().zip(out.chunks_exact_mut(2)) {
                                o[0] = v[0];
                                o[1] = v[1];
                            }
                        }
                    }
                    Err(e) => warn!(slot, error = %e, "Optical flow failed, zero-filling"),
                }
            }
            prev_gray = Some(gray);
        }

        debug!(
            frames = n,
            width = size.width,
            height = size.height,
            with_flow,
            "Built clip tensors"
        );

        Ok(ClipTensors { rgb, flow })
    }

    /// Resize to model resolution and normalise to 3-channel 8-bit BGR.
    fn resize_bgr(&self, frame: &Mat) -> MediaResult<Mat> {
        if frame.depth() != CV_8U {
            return Err(MediaError::processing_failed(format!(
                "unsupported frame depth {}",
                frame.depth()
            )));
        }
        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            self.config.frame_size.cv(),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )
        .map_err(|e| MediaError::processing_failed(format!("resize: {e}")))?;

        let code = match resized.channels() {
            3 => return Ok(resized),
            1 => imgproc::COLOR_GRAY2BGR,
            4 => imgproc::COLOR_BGRA2BGR,
            c => {
                return Err(MediaError::processing_failed(format!(
                    "unsupported channel count {c}"
                )))
            }
        };
        let mut bgr = Mat::default();
        imgproc::cvt_color_def(&resized, &mut bgr, code)
            .map_err(|e| MediaError::processing_failed(format!("to bgr: {e}")))?;
        Ok(bgr)
    }
}

fn to_gray(bgr: &Mat) -> MediaResult<Mat> {
    let mut gray = Mat::default();
    imgproc::cvt_color_def(bgr, &mut gray, imgproc::COLOR_BGR2GRAY)
        .map_err(|e| MediaError::processing_failed(format!("to gray: {e}")))?;
    Ok(gray)
}

fn blank_gray(size: FrameSize) -> MediaResult<Mat> {
    Mat::new_rows_cols_with_default(size.height, size.width, CV_8UC1, Scalar::all(0.0))
        .map_err(|e| MediaError::internal(format!("blank frame: {e}")))
}
