//! Shared data models for the violence detection service.
//!
//! This crate provides Serde-serializable types for:
//! - Model selection and per-model decision thresholds
//! - Analysis segments and per-segment verdicts
//! - Inference reports and the `/predict` response shapes
//! - Users, roles and alerts exchanged with the API layer

pub mod alert;
pub mod model_kind;
pub mod report;
pub mod segment;
pub mod user;

// Re-export common types
pub use alert::Alert;
pub use model_kind::{ModelKind, UnsupportedModel};
pub use report::{
    InferenceReport, PredictionResponse, SegmentVerdict, SingleStreamResponse,
    TwoStreamResponse, LABEL_NON_VIOLENT, LABEL_VIOLENT,
};
pub use segment::{Segment, SegmentError};
pub use user::{CreateUserRequest, Role, UserOut};
