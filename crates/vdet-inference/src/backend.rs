//! Model execution backends.
//!
//! A [`ModelBackend`] turns one window's tensors into the raw output
//! vector of a network. [`OrtBackend`] runs an ONNX export through ONNX
//! Runtime; sessions are created once and invocations are serialised per
//! model instance.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::ArrayView4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vdet_media::ClipTensors;
use vdet_models::ModelKind;

use crate::error::{InferenceError, InferenceResult};

/// Runs a loaded network on one window of input.
pub trait ModelBackend: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Run the network. RGB is always fed first; flow, when present, second.
    ///
    /// Returns the flattened output of the first model output.
    fn infer(&self, tensors: &ClipTensors) -> InferenceResult<Vec<f32>>;
}

/// Locations of the exported model files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPaths {
    pub dir: PathBuf,
    pub cnn_lstm: String,
    pub i3d: String,
    pub two_stream: String,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            cnn_lstm: "cnn_lstm.onnx".to_string(),
            i3d: "i3d.onnx".to_string(),
            two_stream: "two_stream_i3d.onnx".to_string(),
        }
    }
}

impl ModelPaths {
    pub fn path_for(&self, kind: ModelKind) -> PathBuf {
        let file = match kind {
            ModelKind::CnnLstm => &self.cnn_lstm,
            ModelKind::I3d => &self.i3d,
            ModelKind::I3dTwoStreams => &self.two_stream,
        };
        self.dir.join(file)
    }
}

/// ONNX Runtime session for one exported model.
pub struct OrtBackend {
    name: String,
    session: Mutex<Session>,
}

impl OrtBackend {
    /// Load and optimise a model from disk.
    pub fn load(model_path: &Path) -> InferenceResult<Self> {
        if !model_path.exists() {
            return Err(InferenceError::model_load(model_path, "model file not found"));
        }

        let model_bytes = std::fs::read(model_path)
            .map_err(|e| InferenceError::model_load(model_path, format!("read model file: {e}")))?;

        let session = Session::builder()
            .map_err(|e| InferenceError::model_load(model_path, format!("session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::model_load(model_path, format!("opt level: {e}")))?
            .commit_from_memory(model_bytes.as_slice())
            .map_err(|e| InferenceError::model_load(model_path, format!("load model: {e}")))?;

        let name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| model_path.display().to_string());

        info!(model = %name, "Loaded ONNX model");

        Ok(Self {
            name,
            session: Mutex::new(session),
        })
    }
}

impl ModelBackend for OrtBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&self, tensors: &ClipTensors) -> InferenceResult<Vec<f32>> {
        let rgb = batched_input(tensors.rgb.view())?;
        let flow = tensors
            .flow
            .as_ref()
            .map(|f| batched_input(f.view()))
            .transpose()?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::runtime("ORT session poisoned"))?;

        let outputs = match flow {
            Some(flow) => session.run(ort::inputs![rgb, flow]),
            None => session.run(ort::inputs![rgb]),
        }
        .map_err(|e| InferenceError::runtime(format!("ORT run failed: {e}")))?;

        if outputs.len() == 0 {
            return Err(InferenceError::invalid_output("ORT returned no outputs"));
        }

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::invalid_output(format!("ORT extract: {e}")))?;

        debug!(model = %self.name, shape = ?shape, "Model output");
        Ok(data.to_vec())
    }
}

/// Add a leading batch axis: `(N, H, W, C)` becomes `(1, N, H, W, C)`.
fn batched_input(view: ArrayView4<'_, f32>) -> InferenceResult<Value> {
    let mut shape = vec![1usize];
    shape.extend_from_slice(view.shape());
    let data: Vec<f32> = view.iter().copied().collect();
    Tensor::from_array((shape, data.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| InferenceError::runtime(format!("ORT tensor: {e}")))
}
