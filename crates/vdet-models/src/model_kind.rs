//! Model selection for violence inference.
//!
//! Each pretrained network is addressed by the name the HTTP form uses:
//!
//! - `cnn_lstm`: frame-sampled CNN-LSTM, RGB only
//! - `i3d`: single-stream I3D, RGB only
//! - `i3d_two_streams`: two-stream I3D consuming RGB and optical flow

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pretrained model architecture selectable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Frame-sampled CNN-LSTM.
    CnnLstm,

    /// Single-stream I3D over RGB frames.
    I3d,

    /// Two-stream I3D over RGB frames and dense optical flow.
    #[serde(rename = "i3d_two_streams")]
    I3dTwoStreams,
}

impl ModelKind {
    /// All supported models.
    pub const ALL: &'static [ModelKind] = &[
        ModelKind::CnnLstm,
        ModelKind::I3d,
        ModelKind::I3dTwoStreams,
    ];

    /// Returns the wire name of the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::CnnLstm => "cnn_lstm",
            ModelKind::I3d => "i3d",
            ModelKind::I3dTwoStreams => "i3d_two_streams",
        }
    }

    /// Decision threshold calibrated for this architecture.
    ///
    /// A probability strictly above the threshold is labeled violent.
    pub fn threshold(&self) -> f32 {
        match self {
            ModelKind::CnnLstm => 0.5,
            ModelKind::I3d => 0.517,
            ModelKind::I3dTwoStreams => 0.467,
        }
    }

    /// Returns true if the model consumes an optical-flow stream.
    pub fn uses_flow(&self) -> bool {
        matches!(self, ModelKind::I3dTwoStreams)
    }

    /// Returns true if long videos are split into fixed windows for this model.
    pub fn is_segmented(&self) -> bool {
        matches!(self, ModelKind::I3dTwoStreams)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = UnsupportedModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cnn_lstm" => Ok(ModelKind::CnnLstm),
            "i3d" => Ok(ModelKind::I3d),
            "i3d_two_streams" => Ok(ModelKind::I3dTwoStreams),
            _ => Err(UnsupportedModel(s.to_string())),
        }
    }
}

/// Requested model name is not one of [`ModelKind::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Model not supported: {0}")]
pub struct UnsupportedModel(pub String);
