use std::time::{Duration, Instant};

use crate::detection::domain::detection_strategy::{DetectionStrategy, Observation};
use crate::detection::domain::eye_status::EyeStatus;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::frame::Frame;
use crate::tracking::domain::event_timestamps::TimedEvent;
use crate::tracking::domain::temporal_state_tracker::{TemporalStateTracker, TrackerConfig};

/// Result of running one frame through the pipeline.
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub raw: EyeStatus,
    pub debounced: EyeStatus,
    /// Set when the debounced status just entered a blink or wink.
    pub entered: Option<TimedEvent>,
    pub observation: Observation,
    /// The input frame with detections drawn on it, when annotation is on.
    pub annotated: Option<Frame>,
}

/// Per-frame transform from pixels to a debounced eye status.
///
/// Owns the only cross-frame state of detection: the accumulators inside
/// the tracker and the previous debounced status used for edge detection.
pub struct EyeStatePipeline {
    strategy: DetectionStrategy,
    tracker: TemporalStateTracker,
    annotate: bool,
    previous: EyeStatus,
}

impl EyeStatePipeline {
    pub fn new(strategy: DetectionStrategy, tracker: TrackerConfig, annotate: bool) -> Self {
        let tracker = TemporalStateTracker::new(tracker);
        let previous = tracker.status();
        Self {
            strategy,
            tracker,
            annotate,
            previous,
        }
    }

    pub fn tracker(&self) -> &TemporalStateTracker {
        &self.tracker
    }

    /// Classifies `frame`, folds the result into the tracker as `delta` of
    /// wall time and reports any blink or wink transition.
    ///
    /// A failing face locator is logged and treated as a frame without a
    /// face, so it decays like any other lost observation.
    pub fn evaluate(
        &mut self,
        frame: &Frame,
        delta: Duration,
        logger: &mut dyn PipelineLogger,
    ) -> Evaluation {
        let observation = match self.strategy.observe(frame) {
            Ok(observation) => observation,
            Err(e) => {
                log::warn!("Detection failed on frame {}: {e}", frame.index());
                Observation::default()
            }
        };

        let started = Instant::now();
        let raw = observation.status(self.tracker.config().missing_eyes_as_error);
        let debounced = self.tracker.update(raw, delta);
        let entered = if debounced != self.previous {
            TimedEvent::entered(debounced)
        } else {
            None
        };
        self.previous = debounced;
        let classify_ms = started.elapsed().as_secs_f64() * 1000.0;

        log::debug!("Frame {}: raw {raw}, debounced {debounced}", frame.index());
        log::trace!(
            "Frame {}: {} faces, {}+{} eye candidates",
            frame.index(),
            observation.faces.len(),
            observation.left_candidates.len(),
            observation.right_candidates.len()
        );
        logger.timing("face", observation.face_ms);
        logger.timing("eyes", observation.eyes_ms);
        logger.timing("classify", classify_ms);
        logger.metric("face_candidates", observation.faces.len() as f64);
        logger.metric(
            "eye_candidates",
            (observation.left_candidates.len() + observation.right_candidates.len()) as f64,
        );

        let annotated = self.annotate.then(|| {
            let mut copy = frame.clone();
            observation.annotate(&mut copy);
            copy
        });

        Evaluation {
            raw,
            debounced,
            entered,
            observation,
            annotated,
        }
    }
}
