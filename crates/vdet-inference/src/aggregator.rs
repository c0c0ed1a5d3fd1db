//! Collects per-segment probabilities into an [`InferenceReport`].

use tracing::debug;
use vdet_models::{InferenceReport, ModelKind, Segment, SegmentVerdict};

use crate::metrics::record_segment;

/// Accumulates verdicts for one (video, model) pair in segment order.
#[derive(Debug, Clone)]
pub struct Aggregator {
    model: ModelKind,
    threshold: f32,
    filename: String,
    verdicts: Vec<SegmentVerdict>,
}

impl Aggregator {
    pub fn new(model: ModelKind, threshold: f32, filename: impl Into<String>) -> Self {
        Self {
            model,
            threshold,
            filename: filename.into(),
            verdicts: Vec::new(),
        }
    }

    /// Label and record the probability for the next segment.
    pub fn push(&mut self, segment: Segment, probability: f32) -> &SegmentVerdict {
        let verdict = SegmentVerdict::new(segment, probability, self.threshold);
        debug!(
            model = %self.model,
            segment = %segment,
            probability,
            violent = verdict.violent,
            "Segment scored"
        );
        record_segment(self.model, verdict.violent);
        self.verdicts.push(verdict);
        &self.verdicts[self.verdicts.len() - 1]
    }

    /// Violent segments so far, in order.
    pub fn violent_segments(&self) -> Vec<Segment> {
        self.verdicts
            .iter()
            .filter(|v| v.violent)
            .map(|v| v.segment)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn finish(self, annotated_video: Option<String>) -> InferenceReport {
        InferenceReport {
            model: self.model,
            filename: self.filename,
            verdicts: self.verdicts,
            annotated_video,
        }
    }
}
