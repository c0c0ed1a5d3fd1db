//! Inference metrics. Recorded through the `metrics` facade; the API
//! binary installs the Prometheus recorder.

use metrics::{counter, histogram};
use vdet_models::ModelKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const INFERENCE_TOTAL: &str = "vdet_inference_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "vdet_inference_duration_seconds";
    pub const SEGMENTS_SCORED_TOTAL: &str = "vdet_segments_scored_total";
    pub const ANNOTATED_VIDEOS_TOTAL: &str = "vdet_annotated_videos_total";
}

/// Record a finished inference request.
pub fn record_inference(model: ModelKind, success: bool, duration_secs: f64) {
    let outcome = if success { "success" } else { "failure" };
    let labels = [
        ("model", model.as_str().to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::INFERENCE_TOTAL, &labels).increment(1);
    histogram!(names::INFERENCE_DURATION_SECONDS, "model" => model.as_str()).record(duration_secs);
}

/// Record one scored segment.
pub fn record_segment(model: ModelKind, violent: bool) {
    let label = if violent { "violent" } else { "non_violent" };
    counter!(names::SEGMENTS_SCORED_TOTAL, "model" => model.as_str(), "label" => label).increment(1);
}

/// Record an annotated render attempt.
pub fn record_annotation(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::ANNOTATED_VIDEOS_TOTAL, "outcome" => outcome).increment(1);
}
