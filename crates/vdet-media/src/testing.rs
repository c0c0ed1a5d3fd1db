//! Synthetic clips for tests that need a real decodable video.

use std::path::Path;

use opencv::core::{Mat, Rect, Scalar, Size, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::VideoWriter;

pub const CLIP_WIDTH: i32 = 192;
pub const CLIP_HEIGHT: i32 = 144;
const BLOCK: i32 = 48;
const STEP: i32 = 4;

/// One frame: black background with a white ring-shaped block whose left
/// edge sits at `x`.
pub fn block_frame(x: i32) -> Mat {
    let mut frame =
        Mat::new_rows_cols_with_default(CLIP_HEIGHT, CLIP_WIDTH, CV_8UC3, Scalar::all(0.0))
            .unwrap();
    let y = (CLIP_HEIGHT - BLOCK) / 2;
    imgproc::rectangle(
        &mut frame,
        Rect::new(x, y, BLOCK, BLOCK),
        Scalar::all(255.0),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )
    .unwrap();
    imgproc::rectangle(
        &mut frame,
        Rect::new(x + 12, y + 12, BLOCK - 24, BLOCK - 24),
        Scalar::all(0.0),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )
    .unwrap();
    frame
}

/// Write `frames` frames of a block moving left to right as MJPG.
pub fn write_moving_block(path: &Path, frames: usize, fps: f64) {
    let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap();
    let mut writer = VideoWriter::new(
        path.to_str().unwrap(),
        fourcc,
        fps,
        Size::new(CLIP_WIDTH, CLIP_HEIGHT),
        true,
    )
    .unwrap();
    assert!(writer.is_opened().unwrap(), "cannot write {}", path.display());
    for i in 0..frames {
        let x = (8 + i as i32 * STEP) % (CLIP_WIDTH - BLOCK);
        writer.write(&block_frame(x)).unwrap();
    }
    writer.release().unwrap();
}

/// Decode every frame of `path` in stream order.
pub fn read_all(path: &Path) -> Vec<Mat> {
    let mut video = crate::VideoHandle::open(path).unwrap();
    let mut frames = Vec::new();
    while let Some(frame) = video.read_next().unwrap() {
        frames.push(frame);
    }
    frames
}

/// Pixels that are clearly red, i.e. drawn by the renderer and never part
/// of the grayscale source.
pub fn red_pixels(frame: &Mat) -> usize {
    frame
        .try_clone()
        .unwrap()
        .data_bytes()
        .unwrap()
        .chunks_exact(3)
        .filter(|bgr| bgr[2] > 150 && bgr[1] < 90 && bgr[0] < 90)
        .count()
}
