//! Error types for model loading and inference.

use std::path::PathBuf;

use thiserror::Error;
use vdet_media::MediaError;
use vdet_models::{ModelKind, Segment, UnsupportedModel};

/// Result type for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    UnsupportedModel(#[from] UnsupportedModel),

    #[error("Model not loaded: {0}")]
    ModelNotLoaded(ModelKind),

    #[error("Failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("Model runtime error: {0}")]
    Runtime(String),

    #[error("Missing model input: {0}")]
    MissingInput(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("Inference failed for segment {index} {segment}")]
    SegmentFailed {
        index: usize,
        segment: Segment,
        #[source]
        source: Box<InferenceError>,
    },

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InferenceError {
    pub fn model_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap a runner failure with the segment it happened on.
    pub fn in_segment(self, index: usize, segment: Segment) -> Self {
        Self::SegmentFailed {
            index,
            segment,
            source: Box::new(self),
        }
    }

    /// Returns true if the caller sent a bad request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnsupportedModel(_))
    }
}
