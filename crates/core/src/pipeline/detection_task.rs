use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::capture::domain::frame_cell::FrameCell;
use crate::pipeline::eye_state_pipeline::EyeStatePipeline;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::scheduler::domain::periodic_task::{PeriodicTask, TickContext};
use crate::tracking::domain::event_timestamps::EventTimestamps;
use crate::tracking::domain::shared_eye_state::SharedEyeState;

/// Shared outputs the detection task writes and the consumer reads.
#[derive(Clone, Default)]
pub struct DetectionOutputs {
    pub state: Arc<SharedEyeState>,
    pub timestamps: Arc<EventTimestamps>,
    /// Latest annotated frame; stays empty unless annotation is enabled.
    pub annotated: Arc<FrameCell>,
}

/// Periodic task that runs the eye-state pipeline on each new captured frame.
///
/// Ticks without a new frame do no work; the wall time they cover is carried
/// over to the next frame, capped at one detection interval. Time spent with
/// no frame published at all is discarded. Results of a tick that finishes
/// after a stop request are dropped.
pub struct DetectionTask {
    pipeline: EyeStatePipeline,
    frames: Arc<FrameCell>,
    outputs: DetectionOutputs,
    logger: Box<dyn PipelineLogger>,
    interval: Duration,
    last_index: Option<usize>,
    pending: Duration,
}

impl DetectionTask {
    pub fn new(
        pipeline: EyeStatePipeline,
        frames: Arc<FrameCell>,
        outputs: DetectionOutputs,
        logger: Box<dyn PipelineLogger>,
        interval: Duration,
    ) -> Self {
        Self {
            pipeline,
            frames,
            outputs,
            logger,
            interval,
            last_index: None,
            pending: Duration::ZERO,
        }
    }
}

impl PeriodicTask for DetectionTask {
    fn name(&self) -> &str {
        "detect"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&mut self, ctx: &TickContext<'_>) {
        if ctx.stop_requested() {
            return;
        }
        let Some(frame) = self.frames.snapshot() else {
            self.pending = Duration::ZERO;
            return;
        };
        self.pending = (self.pending + ctx.delta).min(self.interval);
        if self.last_index.is_some_and(|last| frame.index() <= last) {
            return;
        }

        let delta = std::mem::take(&mut self.pending);
        let evaluation = self.pipeline.evaluate(&frame, delta, self.logger.as_mut());
        self.last_index = Some(frame.index());

        if ctx.stop_requested() {
            log::debug!("Dropping detection result for frame {} after stop", frame.index());
            return;
        }
        if let Some(event) = evaluation.entered {
            self.outputs.timestamps.record(event, SystemTime::now());
        }
        self.outputs
            .state
            .publish(evaluation.raw, evaluation.debounced);
        if let Some(annotated) = evaluation.annotated {
            self.outputs.annotated.publish(annotated);
        }
        self.logger.frame_processed(frame.index());
    }

    fn on_stop(&mut self) {
        self.outputs.annotated.clear();
        self.logger.summary();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection_strategy::{
        DetectionStrategy, EyeAreaMode, StrategyKind,
    };
    use crate::detection::domain::eye_status::EyeStatus;
    use crate::detection::domain::face_locator::{FaceCandidate, FaceLocator};
    use crate::detection::domain::object_detector::{DetectParams, ObjectDetector};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::scheduler::domain::periodic_task::CancelToken;
    use crate::shared::frame::Frame;
    use crate::shared::rect::Rect;
    use crate::tracking::domain::event_timestamps::TimedEvent;
    use crate::tracking::domain::temporal_state_tracker::TrackerConfig;
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Never finds a face; counts how often it was asked.
    struct NoFaces(Arc<AtomicUsize>);

    impl FaceLocator for NoFaces {
        fn locate(
            &mut self,
            _frame: &Frame,
            _gray: &GrayImage,
        ) -> Result<Vec<FaceCandidate>, Box<dyn std::error::Error>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct NoEyes;

    impl ObjectDetector for NoEyes {
        fn detect(&self, _image: &GrayImage, _params: &DetectParams) -> Vec<Rect> {
            Vec::new()
        }
    }

    struct Fixture {
        task: DetectionTask,
        frames: Arc<FrameCell>,
        outputs: DetectionOutputs,
        calls: Arc<AtomicUsize>,
    }

    fn fixture(annotate: bool) -> Fixture {
        let calls = Arc::new(AtomicUsize::new(0));
        let strategy = DetectionStrategy::new(
            StrategyKind::Cascade,
            Box::new(NoFaces(Arc::clone(&calls))),
            Box::new(NoEyes),
            EyeAreaMode::Proportional,
            DetectParams::new(1.3, 2, 4),
            0.1,
        );
        let frames = Arc::new(FrameCell::new());
        let outputs = DetectionOutputs::default();
        let task = DetectionTask::new(
            EyeStatePipeline::new(strategy, TrackerConfig::default(), annotate),
            Arc::clone(&frames),
            outputs.clone(),
            Box::new(NullPipelineLogger),
            Duration::from_millis(33),
        );
        Fixture {
            task,
            frames,
            outputs,
            calls,
        }
    }

    fn frame(index: usize) -> Frame {
        Frame::new(vec![90; 8 * 8 * 3], 8, 8, 3, index)
    }

    fn tick(task: &mut DetectionTask, cancel: &CancelToken, millis: u64) {
        task.tick(&TickContext {
            delta: Duration::from_millis(millis),
            cancel,
        });
    }

    #[test]
    fn test_idle_without_frames() {
        let mut f = fixture(false);
        tick(&mut f.task, &CancelToken::new(), 33);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.outputs.state.raw(), None);
    }

    #[test]
    fn test_each_frame_is_processed_once() {
        let mut f = fixture(false);
        let cancel = CancelToken::new();
        f.frames.publish(frame(1));
        tick(&mut f.task, &cancel, 33);
        tick(&mut f.task, &cancel, 33);
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);

        f.frames.publish(frame(2));
        tick(&mut f.task, &cancel, 33);
        assert_eq!(f.calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.outputs.state.raw(), Some(EyeStatus::Error));
    }

    #[test]
    fn test_one_frame_after_a_long_gap_keeps_eyes_open() {
        let mut f = fixture(false);
        let cancel = CancelToken::new();
        for _ in 0..100 {
            tick(&mut f.task, &cancel, 33);
        }
        f.frames.publish(frame(1));
        tick(&mut f.task, &cancel, 33);
        assert_eq!(f.outputs.state.raw(), Some(EyeStatus::Error));
        assert_eq!(f.outputs.state.debounced(), Some(EyeStatus::BothOpen));
        assert!(f.outputs.timestamps.last(TimedEvent::Blink).is_none());
    }

    #[test]
    fn test_stale_ticks_carry_at_most_one_interval() {
        let mut f = fixture(false);
        let cancel = CancelToken::new();
        f.frames.publish(frame(1));
        tick(&mut f.task, &cancel, 0);
        // The same frame stays published for three seconds.
        for _ in 0..100 {
            tick(&mut f.task, &cancel, 30);
        }
        f.frames.publish(frame(2));
        tick(&mut f.task, &cancel, 0);
        assert_eq!(f.outputs.state.debounced(), Some(EyeStatus::BothOpen));

        // A second interval of error evidence closes the eyes.
        f.frames.publish(frame(3));
        tick(&mut f.task, &cancel, 33);
        assert_eq!(f.outputs.state.debounced(), Some(EyeStatus::Blink));
        assert!(f.outputs.timestamps.last(TimedEvent::Blink).is_some());
    }

    #[test]
    fn test_stale_frame_index_is_ignored() {
        let mut f = fixture(false);
        let cancel = CancelToken::new();
        f.frames.publish(frame(5));
        tick(&mut f.task, &cancel, 33);
        f.frames.publish(frame(3));
        tick(&mut f.task, &cancel, 33);
        assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nothing_published_after_stop_request() {
        let mut f = fixture(true);
        let cancel = CancelToken::new();
        cancel.cancel();
        f.frames.publish(frame(1));
        tick(&mut f.task, &cancel, 500);
        assert_eq!(f.calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.outputs.state.raw(), None);
        assert!(f.outputs.annotated.is_empty());
        assert!(f.outputs.timestamps.last(TimedEvent::Blink).is_none());
    }

    #[test]
    fn test_annotated_frame_published_and_cleared_on_stop() {
        let mut f = fixture(true);
        f.frames.publish(frame(1));
        tick(&mut f.task, &CancelToken::new(), 33);
        assert_eq!(f.outputs.annotated.latest_index(), Some(1));

        f.task.on_stop();
        assert!(f.outputs.annotated.is_empty());
    }
}
