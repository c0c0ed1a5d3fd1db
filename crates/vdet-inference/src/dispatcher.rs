//! Request-level orchestration: model selection, segmentation, scoring,
//! aggregation and conditional annotation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use vdet_media::{
    AnnotationRenderer, FarnebackParams, FrameSampler, SamplerConfig, SegmentPolicy, TensorBuilder,
    VideoMeta,
};
use vdet_models::{InferenceReport, ModelKind, Segment};

use crate::aggregator::Aggregator;
use crate::backend::{ModelPaths, OrtBackend};
use crate::error::{InferenceError, InferenceResult};
use crate::metrics::{record_annotation, record_inference};
use crate::runner::{runner_for, ModelRunner};

/// Public route prefix under which annotated videos are served.
pub const ANNOTATED_ROUTE: &str = "/annotated";

/// Pre/post-processing settings shared by every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatcherConfig {
    pub sampler: SamplerConfig,
    pub flow: FarnebackParams,
    pub policy: SegmentPolicy,
}

/// Routes a request to the selected model and builds its report.
pub struct InferenceDispatcher {
    runners: HashMap<ModelKind, Arc<dyn ModelRunner>>,
    sampler: FrameSampler,
    tensors: TensorBuilder,
    policy: SegmentPolicy,
    renderer: Arc<dyn AnnotationRenderer>,
}

impl InferenceDispatcher {
    pub fn new(config: DispatcherConfig, renderer: Arc<dyn AnnotationRenderer>) -> Self {
        Self {
            runners: HashMap::new(),
            sampler: FrameSampler::new(config.sampler),
            tensors: TensorBuilder::new(config.sampler, config.flow),
            policy: config.policy,
            renderer,
        }
    }

    /// Register a runner, replacing any previous one for the same model.
    pub fn with_runner(mut self, runner: Arc<dyn ModelRunner>) -> Self {
        self.runners.insert(runner.kind(), runner);
        self
    }

    /// Load every model from disk. Any failure is returned and should abort
    /// startup.
    pub fn load(
        paths: &ModelPaths,
        config: DispatcherConfig,
        renderer: Arc<dyn AnnotationRenderer>,
    ) -> InferenceResult<Self> {
        let mut dispatcher = Self::new(config, renderer);
        for &kind in ModelKind::ALL {
            let backend = OrtBackend::load(&paths.path_for(kind))?;
            dispatcher = dispatcher.with_runner(runner_for(kind, Arc::new(backend)));
        }
        Ok(dispatcher)
    }

    /// Returns true if every model has a runner.
    pub fn is_ready(&self) -> bool {
        ModelKind::ALL.iter().all(|k| self.runners.contains_key(k))
    }

    pub fn loaded_models(&self) -> Vec<ModelKind> {
        ModelKind::ALL
            .iter()
            .copied()
            .filter(|k| self.runners.contains_key(k))
            .collect()
    }

    /// Score `video` with the model named `model`.
    ///
    /// The name is validated before any decoding. `filename` is the
    /// client-facing name echoed in the report.
    pub fn predict(&self, model: &str, video: &Path, filename: &str) -> InferenceResult<InferenceReport> {
        let kind: ModelKind = model.parse()?;
        self.predict_kind(kind, video, filename)
    }

    pub fn predict_kind(
        &self,
        kind: ModelKind,
        video: &Path,
        filename: &str,
    ) -> InferenceResult<InferenceReport> {
        let runner = self
            .runners
            .get(&kind)
            .cloned()
            .ok_or(InferenceError::ModelNotLoaded(kind))?;

        let started = Instant::now();
        let result = if kind.is_segmented() {
            let duration = VideoMeta::probe_or_empty(video).duration();
            self.segmented_report(runner.as_ref(), video, filename, duration)
        } else {
            self.whole_video_report(runner.as_ref(), video, filename)
        };
        let elapsed = started.elapsed().as_secs_f64();
        record_inference(kind, result.is_ok(), elapsed);

        match &result {
            Ok(report) => info!(
                model = %kind,
                filename,
                segments = report.verdicts.len(),
                violent = report.any_violent(),
                elapsed_secs = elapsed,
                "Inference complete"
            ),
            Err(e) => warn!(model = %kind, filename, error = %e, "Inference failed"),
        }
        result
    }

    /// One verdict over frames sampled across the whole video.
    fn whole_video_report(
        &self,
        runner: &dyn ModelRunner,
        video: &Path,
        filename: &str,
    ) -> InferenceResult<InferenceReport> {
        let sampled = self.sampler.sample_whole(video);
        let segment = Segment::whole(sampled.meta.duration());
        let tensors = self.tensors.build(&sampled, runner.kind().uses_flow())?;
        let probability = runner
            .predict(&tensors)
            .map_err(|e| e.in_segment(0, segment))?;

        let mut agg = Aggregator::new(runner.kind(), runner.threshold(), filename);
        agg.push(segment, probability);
        Ok(agg.finish(None))
    }

    /// Fixed-window scoring followed by annotation of violent windows.
    fn segmented_report(
        &self,
        runner: &dyn ModelRunner,
        video: &Path,
        filename: &str,
        duration: f64,
    ) -> InferenceResult<InferenceReport> {
        let full_video = self.policy.full_video_for(duration);
        let segments = self.policy.plan(duration, full_video);
        info!(
            model = %runner.kind(),
            duration,
            full_video,
            segments = segments.len(),
            "Planned segments"
        );

        if segments.is_empty() {
            // No usable duration: score the whole file as one window.
            return self.whole_video_report(runner, video, filename);
        }

        let mut agg = Aggregator::new(runner.kind(), runner.threshold(), filename);
        for (index, segment) in segments.into_iter().enumerate() {
            let sampled = self.sampler.sample_segment(video, &segment);
            let tensors = self.tensors.build(&sampled, runner.kind().uses_flow())?;
            let probability = runner
                .predict(&tensors)
                .map_err(|e| e.in_segment(index, segment))?;
            agg.push(segment, probability);
        }

        let violent = agg.violent_segments();
        let annotated = if violent.is_empty() {
            None
        } else {
            self.annotate(video, &violent)
        };
        Ok(agg.finish(annotated))
    }

    /// Render the annotated copy; a failure leaves the report without one.
    fn annotate(&self, video: &Path, violent: &[Segment]) -> Option<String> {
        match self.renderer.render(video, violent) {
            Ok(path) => {
                record_annotation(true);
                path.file_name()
                    .map(|name| format!("{ANNOTATED_ROUTE}/{}", name.to_string_lossy()))
            }
            Err(e) => {
                record_annotation(false);
                warn!(video = %video.display(), error = %e, "Annotated rendering failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use vdet_media::{ClipTensors, FrameSize, MediaError, MediaResult};
    use vdet_models::PredictionResponse;

    /// Runner that returns queued probabilities in order.
    struct ScriptedRunner {
        kind: ModelKind,
        scores: Mutex<Vec<InferenceResult<f32>>>,
        shapes: Mutex<Vec<[usize; 4]>>,
    }

    impl ScriptedRunner {
        fn new(kind: ModelKind, scores: Vec<InferenceResult<f32>>) -> Arc<Self> {
            let mut scores = scores;
            scores.reverse();
            Arc::new(Self {
                kind,
                scores: Mutex::new(scores),
                shapes: Mutex::new(Vec::new()),
            })
        }
    }

    impl ModelRunner for ScriptedRunner {
        fn kind(&self) -> ModelKind {
            self.kind
        }

        fn predict(&self, tensors: &ClipTensors) -> InferenceResult<f32> {
            self.shapes.lock().unwrap().push(tensors.rgb.shape());
            if self.kind.uses_flow() {
                assert!(tensors.flow.is_some());
            }
            self.scores.lock().unwrap().pop().unwrap_or(Ok(0.0))
        }
    }

    /// Renderer that records calls and optionally fails.
    struct RecordingRenderer {
        calls: Mutex<Vec<Vec<Segment>>>,
        fail: bool,
    }

    impl RecordingRenderer {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl AnnotationRenderer for RecordingRenderer {
        fn render(&self, source: &Path, violent: &[Segment]) -> MediaResult<PathBuf> {
            self.calls.lock().unwrap().push(violent.to_vec());
            if self.fail {
                return Err(MediaError::encode_failed("writer unavailable"));
            }
            Ok(vdet_media::annotated_output_path(Path::new("out"), source))
        }
    }

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            sampler: SamplerConfig {
                frame_size: FrameSize {
                    width: 16,
                    height: 16,
                },
                max_frames: 4,
            },
            ..Default::default()
        }
    }

    fn missing_video() -> PathBuf {
        PathBuf::from("/nonexistent/upload/clip.mp4")
    }

    fn seg(start: f64, end: f64) -> Segment {
        Segment::new(start, end).unwrap()
    }

    #[test]
    fn test_unsupported_model_rejected_before_decode() {
        let renderer = RecordingRenderer::new(false);
        let dispatcher = InferenceDispatcher::new(config(), renderer.clone());
        let err = dispatcher
            .predict("foo", &missing_video(), "clip.mp4")
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Model not supported: foo");
    }

    #[test]
    fn test_unloaded_model() {
        let dispatcher = InferenceDispatcher::new(config(), RecordingRenderer::new(false));
        assert!(!dispatcher.is_ready());
        assert!(matches!(
            dispatcher.predict("i3d", &missing_video(), "clip.mp4"),
            Err(InferenceError::ModelNotLoaded(ModelKind::I3d))
        ));
    }

    #[test]
    fn test_undecodable_video_scores_zero_tensor() {
        let runner = ScriptedRunner::new(ModelKind::CnnLstm, vec![Ok(0.0)]);
        let dispatcher = InferenceDispatcher::new(config(), RecordingRenderer::new(false))
            .with_runner(runner.clone());

        let report = dispatcher
            .predict("cnn_lstm", &missing_video(), "clip.mp4")
            .unwrap();
        assert_eq!(*runner.shapes.lock().unwrap(), vec![[4, 16, 16, 3]]);

        match report.into_response() {
            PredictionResponse::SingleStream(resp) => {
                assert_eq!(resp.filename, "clip.mp4");
                assert_eq!(resp.probability, 0.0);
                assert!(!resp.is_violent);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_short_video_single_prediction() {
        let runner = ScriptedRunner::new(ModelKind::I3dTwoStreams, vec![Ok(0.2)]);
        let renderer = RecordingRenderer::new(false);
        let dispatcher =
            InferenceDispatcher::new(config(), renderer.clone()).with_runner(runner.clone());

        let report = dispatcher
            .segmented_report(runner.as_ref(), &missing_video(), "clip.mp4", 3.0)
            .unwrap();
        assert_eq!(report.summaries(), vec!["[0.0s, 3.0s] score : 0.200 Etat : Aucune violence détectée"]);
        assert!(report.annotated_video.is_none());
        assert!(renderer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_long_video_segments_and_annotation() {
        let runner = ScriptedRunner::new(
            ModelKind::I3dTwoStreams,
            vec![Ok(0.9), Ok(0.1), Ok(0.5)],
        );
        let renderer = RecordingRenderer::new(false);
        let dispatcher =
            InferenceDispatcher::new(config(), renderer.clone()).with_runner(runner.clone());

        let report = dispatcher
            .segmented_report(runner.as_ref(), &missing_video(), "clip.mp4", 12.0)
            .unwrap();

        let segments: Vec<Segment> = report.verdicts.iter().map(|v| v.segment).collect();
        assert_eq!(segments, vec![seg(0.0, 5.0), seg(5.0, 10.0), seg(10.0, 12.0)]);
        assert_eq!(
            *renderer.calls.lock().unwrap(),
            vec![vec![seg(0.0, 5.0), seg(10.0, 12.0)]]
        );
        assert_eq!(
            report.annotated_video.as_deref(),
            Some("/annotated/clip_annotated.mp4")
        );
        assert!(runner
            .shapes
            .lock()
            .unwrap()
            .iter()
            .all(|s| *s == [4, 16, 16, 3]));
    }

    #[test]
    fn test_full_video_below_cutoff() {
        let runner = ScriptedRunner::new(ModelKind::I3dTwoStreams, vec![Ok(0.1)]);
        let dispatcher = InferenceDispatcher::new(config(), RecordingRenderer::new(false))
            .with_runner(runner.clone());

        let report = dispatcher
            .segmented_report(runner.as_ref(), &missing_video(), "clip.mp4", 9.0)
            .unwrap();
        assert_eq!(report.verdicts.len(), 1);
        assert_eq!(report.verdicts[0].segment, seg(0.0, 9.0));
    }

    #[test]
    fn test_renderer_failure_degrades() {
        let runner = ScriptedRunner::new(ModelKind::I3dTwoStreams, vec![Ok(0.99)]);
        let renderer = RecordingRenderer::new(true);
        let dispatcher =
            InferenceDispatcher::new(config(), renderer.clone()).with_runner(runner.clone());

        let report = dispatcher
            .segmented_report(runner.as_ref(), &missing_video(), "clip.mp4", 4.0)
            .unwrap();
        assert!(report.any_violent());
        assert!(report.annotated_video.is_none());
        assert_eq!(renderer.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_model_failure_fails_request() {
        let runner = ScriptedRunner::new(
            ModelKind::I3dTwoStreams,
            vec![Ok(0.9), Err(InferenceError::runtime("corrupt tensor"))],
        );
        let renderer = RecordingRenderer::new(false);
        let dispatcher =
            InferenceDispatcher::new(config(), renderer.clone()).with_runner(runner.clone());

        let err = dispatcher
            .segmented_report(runner.as_ref(), &missing_video(), "clip.mp4", 12.0)
            .unwrap_err();
        assert!(matches!(err, InferenceError::SegmentFailed { index: 1, .. }));
        assert!(renderer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_duration_scores_one_window() {
        let runner = ScriptedRunner::new(ModelKind::I3dTwoStreams, vec![Ok(0.3)]);
        let renderer = RecordingRenderer::new(false);
        let dispatcher =
            InferenceDispatcher::new(config(), renderer.clone()).with_runner(runner.clone());

        let report = dispatcher
            .predict("i3d_two_streams", &missing_video(), "clip.mp4")
            .unwrap();
        assert_eq!(report.verdicts.len(), 1);
        assert_eq!(report.verdicts[0].segment, Segment::whole(0.0));
        assert_eq!(*runner.shapes.lock().unwrap(), vec![[4, 16, 16, 3]]);
        assert!(renderer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_duration_violent_window_is_reported() {
        let runner = ScriptedRunner::new(ModelKind::I3dTwoStreams, vec![Ok(0.95)]);
        let dispatcher = InferenceDispatcher::new(config(), RecordingRenderer::new(false))
            .with_runner(runner.clone());

        let report = dispatcher
            .segmented_report(runner.as_ref(), &missing_video(), "clip.mp4", f64::NAN)
            .unwrap();
        assert_eq!(report.verdicts.len(), 1);
        assert!(report.any_violent());
        assert!(report.annotated_video.is_none());
    }

    #[test]
    fn test_idempotent_scoring() {
        let runner = ScriptedRunner::new(ModelKind::I3d, vec![Ok(0.6), Ok(0.6)]);
        let dispatcher = InferenceDispatcher::new(config(), RecordingRenderer::new(false))
            .with_runner(runner.clone());

        let a = dispatcher.predict("i3d", &missing_video(), "clip.mp4").unwrap();
        let b = dispatcher.predict("i3d", &missing_video(), "clip.mp4").unwrap();
        assert_eq!(a, b);
        assert!(a.any_violent());
    }
}
