//! Violence model inference.
//!
//! - [`backend`]: ONNX Runtime sessions behind the [`ModelBackend`] seam
//! - [`runner`]: one [`ModelRunner`] adapter per architecture
//! - [`aggregator`]: per-segment verdicts into an `InferenceReport`
//! - [`dispatcher`]: the request-level pipeline

pub mod aggregator;
pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod runner;

pub use aggregator::Aggregator;
pub use backend::{ModelBackend, ModelPaths, OrtBackend};
pub use dispatcher::{DispatcherConfig, InferenceDispatcher, ANNOTATED_ROUTE};
pub use error::{InferenceError, InferenceResult};
pub use runner::{runner_for, CnnLstmRunner, I3dRunner, ModelRunner, TwoStreamRunner};
