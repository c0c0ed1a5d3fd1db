//! Model runners: one adapter per architecture over a shared backend seam.

use std::sync::Arc;

use vdet_media::ClipTensors;
use vdet_models::ModelKind;

use crate::backend::ModelBackend;
use crate::error::{InferenceError, InferenceResult};

/// Scores one analysis window.
pub trait ModelRunner: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Decision threshold bound to this runner's model.
    fn threshold(&self) -> f32 {
        self.kind().threshold()
    }

    /// Violence probability in `[0, 1]` for one window.
    fn predict(&self, tensors: &ClipTensors) -> InferenceResult<f32>;
}

/// Validate a raw score and clamp it into `[0, 1]`.
fn probability(raw: f32) -> InferenceResult<f32> {
    if !raw.is_finite() {
        return Err(InferenceError::invalid_output(format!(
            "non-finite probability {raw}"
        )));
    }
    Ok(raw.clamp(0.0, 1.0))
}

fn single_stream(backend: &dyn ModelBackend, tensors: &ClipTensors) -> InferenceResult<f32> {
    let out = match tensors.flow {
        Some(_) => backend.infer(&ClipTensors {
            rgb: tensors.rgb.clone(),
            flow: None,
        })?,
        None => backend.infer(tensors)?,
    };
    let raw = out
        .first()
        .copied()
        .ok_or_else(|| InferenceError::invalid_output(format!("{} returned no scores", backend.name())))?;
    probability(raw)
}

/// Frame-sampled CNN-LSTM over RGB frames.
pub struct CnnLstmRunner {
    backend: Arc<dyn ModelBackend>,
}

impl CnnLstmRunner {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }
}

impl ModelRunner for CnnLstmRunner {
    fn kind(&self) -> ModelKind {
        ModelKind::CnnLstm
    }

    fn predict(&self, tensors: &ClipTensors) -> InferenceResult<f32> {
        single_stream(self.backend.as_ref(), tensors)
    }
}

/// Single-stream I3D over RGB frames.
pub struct I3dRunner {
    backend: Arc<dyn ModelBackend>,
}

impl I3dRunner {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }
}

impl ModelRunner for I3dRunner {
    fn kind(&self) -> ModelKind {
        ModelKind::I3d
    }

    fn predict(&self, tensors: &ClipTensors) -> InferenceResult<f32> {
        single_stream(self.backend.as_ref(), tensors)
    }
}

/// Two-stream I3D over RGB frames and optical flow.
///
/// A two-score output is read as class scores and index 1 is the violent
/// class; a single score is the probability itself.
pub struct TwoStreamRunner {
    backend: Arc<dyn ModelBackend>,
}

impl TwoStreamRunner {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }
}

impl ModelRunner for TwoStreamRunner {
    fn kind(&self) -> ModelKind {
        ModelKind::I3dTwoStreams
    }

    fn predict(&self, tensors: &ClipTensors) -> InferenceResult<f32> {
        if tensors.flow.is_none() {
            return Err(InferenceError::MissingInput("optical flow".to_string()));
        }
        let out = self.backend.infer(tensors)?;
        let raw = match out.as_slice() {
            [] => {
                return Err(InferenceError::invalid_output(format!(
                    "{} returned no scores",
                    self.backend.name()
                )))
            }
            [p] => *p,
            [_, p, ..] => *p,
        };
        probability(raw)
    }
}

/// Build the runner for `kind` on top of `backend`.
pub fn runner_for(kind: ModelKind, backend: Arc<dyn ModelBackend>) -> Arc<dyn ModelRunner> {
    match kind {
        ModelKind::CnnLstm => Arc::new(CnnLstmRunner::new(backend)),
        ModelKind::I3d => Arc::new(I3dRunner::new(backend)),
        ModelKind::I3dTwoStreams => Arc::new(TwoStreamRunner::new(backend)),
    }
}
