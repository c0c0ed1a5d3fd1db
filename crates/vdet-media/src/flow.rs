//! Dense optical flow (Farneback).

use opencv::core::{Mat, Vec2f};
use opencv::prelude::*;
use opencv::video;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Farneback parameters.
///
/// Defaults match the configuration the models were trained with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FarnebackParams {
    pub pyr_scale: f64,
    pub levels: i32,
    pub winsize: i32,
    pub iterations: i32,
    pub poly_n: i32,
    pub poly_sigma: f64,
}

impl Default for FarnebackParams {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            winsize: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
        }
    }
}

impl FarnebackParams {
    /// Same parameters with a different averaging window.
    pub fn with_winsize(self, winsize: i32) -> Self {
        Self { winsize, ..self }
    }

    /// Compute the flow field from `prev` to `next`.
    ///
    /// Both inputs must be single-channel 8-bit images of equal size. The
    /// result is a `CV_32FC2` matrix of per-pixel `(dx, dy)`.
    pub fn compute(&self, prev: &Mat, next: &Mat) -> MediaResult<Mat> {
        let mut flow = Mat::default();
        video::calc_optical_flow_farneback(
            prev,
            next,
            &mut flow,
            self.pyr_scale,
            self.levels,
            self.winsize,
            self.iterations,
            self.poly_n,
            self.poly_sigma,
            0,
        )
        .map_err(|e| MediaError::processing_failed(format!("optical flow: {e}")))?;
        Ok(flow)
    }
}

/// Borrow the `(dx, dy)` vectors of a flow matrix in row-major order.
pub fn flow_vectors(flow: &Mat) -> MediaResult<&[Vec2f]> {
    flow.data_typed::<Vec2f>()
        .map_err(|e| MediaError::processing_failed(format!("flow data access: {e}")))
}

/// Per-pixel flow magnitude.
pub fn magnitudes(vectors: &[Vec2f]) -> Vec<f32> {
    vectors
        .iter()
        .map(|v| (v[0] * v[0] + v[1] * v[1]).sqrt())
        .collect()
}

/// Adaptive motion threshold: `max(mean + k * std, floor)`.
///
/// Uses the population standard deviation. An empty map yields `floor`.
pub fn motion_threshold(magnitudes: &[f32], sigma_factor: f32, floor: f32) -> f32 {
    if magnitudes.is_empty() {
        return floor;
    }
    let n = magnitudes.len() as f64;
    let mean = magnitudes.iter().map(|&m| m as f64).sum::<f64>() / n;
    let var = magnitudes
        .iter()
        .map(|&m| {
            let d = m as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let thr = mean + sigma_factor as f64 * var.sqrt();
    (thr as f32).max(floor)
}
