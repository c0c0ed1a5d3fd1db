//! Localisation of the dominant motion region between two frames.
//! Uses dense flow magnitude with an adaptive threshold and picks the
//! centroid of the largest connected region.

use opencv::core::{Mat, Point, Scalar, Vector, CV_8UC1};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};
use crate::flow::{flow_vectors, magnitudes, motion_threshold, FarnebackParams};

/// Tuning for [`MotionLocalizer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionParams {
    pub flow: FarnebackParams,
    /// Multiplier applied to the magnitude standard deviation.
    pub sigma_factor: f32,
    /// Lowest magnitude that can ever count as motion.
    pub magnitude_floor: f32,
    /// Minimum contour area in px² for a region to be reported.
    pub min_area: f64,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            flow: FarnebackParams::default().with_winsize(13),
            sigma_factor: 1.75,
            magnitude_floor: 2.5,
            min_area: 800.0,
        }
    }
}

/// Finds where the strongest motion happens between consecutive frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionLocalizer {
    params: MotionParams,
}

impl MotionLocalizer {
    pub fn new(params: MotionParams) -> Self {
        Self { params }
    }

    /// Centroid of the largest high-motion region from `prev` to `curr`.
    ///
    /// Both frames must be 8-bit grayscale at the same resolution. Returns
    /// `None` when no region exceeds the minimum area.
    pub fn locate(&self, prev: &Mat, curr: &Mat) -> MediaResult<Option<Point>> {
        let flow = self.params.flow.compute(prev, curr)?;
        let mags = magnitudes(flow_vectors(&flow)?);
        let thr = motion_threshold(&mags, self.params.sigma_factor, self.params.magnitude_floor);

        let mut mask =
            Mat::new_rows_cols_with_default(flow.rows(), flow.cols(), CV_8UC1, Scalar::all(0.0))
                .map_err(|e| MediaError::processing_failed(format!("motion mask: {e}")))?;
        {
            let bytes = mask
                .data_bytes_mut()
                .map_err(|e| MediaError::processing_failed(format!("motion mask access: {e}")))?;
            for (px, &m) in bytes.iter_mut().zip(mags.iter()) {
                *px = u8::from(m > thr);
            }
        }

        largest_region_centroid(&mask, self.params.min_area)
    }
}

/// Centroid of the largest external contour in a binary mask whose area
/// exceeds `min_area`.
pub fn largest_region_centroid(mask: &Mat, min_area: f64) -> MediaResult<Option<Point>> {
    let mut contours: Vector<Vector<Point>> = Vector::new();
    imgproc::find_contours(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )
    .map_err(|e| MediaError::processing_failed(format!("find contours: {e}")))?;

    let mut largest: Option<(f64, Vector<Point>)> = None;
    for contour in contours.iter() {
        let area = imgproc::contour_area(&contour, false)
            .map_err(|e| MediaError::processing_failed(format!("contour area: {e}")))?;
        if largest.as_ref().map_or(true, |(best, _)| area > *best) {
            largest = Some((area, contour));
        }
    }

    let Some((area, contour)) = largest else {
        return Ok(None);
    };
    if area <= min_area {
        return Ok(None);
    }

    let m = imgproc::moments(&contour, false)
        .map_err(|e| MediaError::processing_failed(format!("contour moments: {e}")))?;
    if m.m00 == 0.0 {
        return Ok(None);
    }
    Ok(Some(Point::new(
        (m.m10 / m.m00) as i32,
        (m.m01 / m.m00) as i32,
    )))
}
