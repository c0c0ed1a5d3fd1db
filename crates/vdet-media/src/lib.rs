#![deny(unreachable_patterns)]
//! Video I/O and pre/post processing for violence inference.
//!
//! This crate provides:
//! - Deterministic frame sampling from arbitrary-length videos
//! - Fixed-shape RGB and optical-flow tensors for model input
//! - Fixed-window segmentation of long videos
//! - Motion-region localisation and annotated video re-encoding

pub mod error;
pub mod flow;
pub mod motion;
pub mod renderer;
pub mod sampler;
pub mod segmenter;
pub mod tensor;
pub mod video;

#[cfg(test)]
mod testing;

pub use error::{MediaError, MediaResult};
pub use flow::FarnebackParams;
pub use motion::{MotionLocalizer, MotionParams};
pub use renderer::{annotated_output_path, AnnotatedVideoRenderer, AnnotationRenderer, RenderConfig};
pub use sampler::{sample_indices, FrameSampler, SampledFrames, SamplerConfig};
pub use segmenter::SegmentPolicy;
pub use tensor::{ClipTensors, FlowTensor, FrameSize, FrameTensor, TensorBuilder};
pub use video::{VideoHandle, VideoMeta};
