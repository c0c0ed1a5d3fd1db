//! Per-segment verdicts, inference reports and `/predict` response shapes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model_kind::ModelKind;
use crate::segment::Segment;

/// State label used in prediction summaries for violent segments.
pub const LABEL_VIOLENT: &str = "Violence détectée";

/// State label used in prediction summaries for non-violent segments.
pub const LABEL_NON_VIOLENT: &str = "Aucune violence détectée";

/// Model output for one analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentVerdict {
    pub segment: Segment,
    /// Violence probability in `[0, 1]`.
    pub probability: f32,
    /// `probability > threshold` for the model that produced it.
    pub violent: bool,
}

impl SegmentVerdict {
    /// Label a probability against a model threshold (strict `>`).
    pub fn new(segment: Segment, probability: f32, threshold: f32) -> Self {
        Self {
            segment,
            probability,
            violent: probability > threshold,
        }
    }

    /// Human-readable summary: time range, score and state.
    ///
    /// The layout is parsed by existing clients and must stay stable.
    pub fn summary(&self) -> String {
        let state = if self.violent {
            LABEL_VIOLENT
        } else {
            LABEL_NON_VIOLENT
        };
        format!(
            "[{:.1}s, {:.1}s] score : {:.3} Etat : {}",
            self.segment.start(),
            self.segment.end(),
            self.probability,
            state
        )
    }
}

/// Ordered verdicts for one (video, model) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InferenceReport {
    pub model: ModelKind,
    /// Base name of the scored file.
    pub filename: String,
    /// Verdicts in segment order.
    pub verdicts: Vec<SegmentVerdict>,
    /// Public reference to the rendered annotated video, if any.
    pub annotated_video: Option<String>,
}

impl InferenceReport {
    /// Segments whose verdict is violent, in order.
    pub fn violent_segments(&self) -> Vec<Segment> {
        self.verdicts
            .iter()
            .filter(|v| v.violent)
            .map(|v| v.segment)
            .collect()
    }

    pub fn any_violent(&self) -> bool {
        self.verdicts.iter().any(|v| v.violent)
    }

    /// Per-segment summary lines.
    pub fn summaries(&self) -> Vec<String> {
        self.verdicts.iter().map(SegmentVerdict::summary).collect()
    }

    /// Convert to the response shape clients expect for this model.
    ///
    /// Single-stream models always produce exactly one verdict; an empty
    /// report maps to probability `0.0`.
    pub fn into_response(self) -> PredictionResponse {
        match self.model {
            ModelKind::I3dTwoStreams => PredictionResponse::TwoStream(TwoStreamResponse {
                predictions: self.summaries(),
                filename: self.filename,
                annotated_video_path: self.annotated_video,
            }),
            ModelKind::CnnLstm | ModelKind::I3d => {
                let (probability, is_violent) = self
                    .verdicts
                    .first()
                    .map(|v| (v.probability, v.violent))
                    .unwrap_or((0.0, false));
                PredictionResponse::SingleStream(SingleStreamResponse {
                    filename: self.filename,
                    probability,
                    is_violent,
                })
            }
        }
    }
}

/// `/predict` body for the two-stream model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TwoStreamResponse {
    pub filename: String,
    pub predictions: Vec<String>,
    pub annotated_video_path: Option<String>,
}

/// `/predict` body for single-stream models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SingleStreamResponse {
    pub filename: String,
    pub probability: f32,
    pub is_violent: bool,
}

/// Either `/predict` response shape, serialized without a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PredictionResponse {
    TwoStream(TwoStreamResponse),
    SingleStream(SingleStreamResponse),
}
