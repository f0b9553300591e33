use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::capture::domain::frame_cell::FrameCell;
use crate::capture::domain::frame_preview::FramePreview;
use crate::capture::domain::frame_source::FrameSource;
use crate::capture::domain::source_liveness::SourceLiveness;
use crate::capture::domain::video_capture::VideoCapture;
use crate::detection::domain::detection_strategy::DetectionStrategy;
use crate::detection::domain::eye_status::EyeStatus;
use crate::events::event_adapter::{EventAdapter, TrackerEvent};
use crate::pipeline::detection_task::{DetectionOutputs, DetectionTask};
use crate::pipeline::eye_state_pipeline::EyeStatePipeline;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::scheduler::domain::renderer::{PreviewSink, RendererError, RendererId};
use crate::scheduler::worker_scheduler::{ExecutionMode, WorkerScheduler};
use crate::shared::frame::Frame;
use crate::shared::settings::TrackerSettings;
use crate::tracking::domain::event_timestamps::TimedEvent;

/// Runs capture and eye-state detection in the background and exposes the
/// results to a consumer loop.
///
/// The consumer calls `activate` once, then on each of its own frames
/// `pump` (needed only in cooperative mode), `poll_events` and optionally
/// `render_all`. `stop` may be called any number of times.
pub struct TrackEyesUseCase {
    scheduler: WorkerScheduler,
    frames: Arc<FrameCell>,
    outputs: DetectionOutputs,
    liveness: Arc<SourceLiveness>,
    events: EventAdapter,
    source: Arc<str>,
    preview: RendererId,
}

impl TrackEyesUseCase {
    pub fn new(
        capture: Box<dyn VideoCapture>,
        strategy: DetectionStrategy,
        settings: &TrackerSettings,
        mode: ExecutionMode,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        let source: Arc<str> = Arc::from(settings.capture.source.to_string());
        let frames = Arc::new(FrameCell::new());
        let liveness = Arc::new(SourceLiveness::new());
        let outputs = DetectionOutputs::default();

        let frame_source = FrameSource::new(
            capture,
            settings.capture.to_config(),
            Arc::clone(&frames),
            Arc::clone(&liveness),
        );
        let pipeline = EyeStatePipeline::new(
            strategy,
            settings.tracker.clone(),
            settings.detection.annotate,
        );
        let detection = DetectionTask::new(
            pipeline,
            Arc::clone(&frames),
            outputs.clone(),
            logger,
            settings.detection.interval(),
        );

        let mut scheduler = WorkerScheduler::new(mode);
        scheduler.add_task(Box::new(frame_source));
        scheduler.add_task(Box::new(detection));

        let renderers = scheduler.renderers_mut();
        let preview = renderers.add_root(Box::new(FramePreview::new(
            source.to_string(),
            Arc::clone(&frames),
        )));
        if let Err(e) = renderers.add_child(
            preview,
            Box::new(FramePreview::new(
                format!("{source} detections"),
                Arc::clone(&outputs.annotated),
            )),
        ) {
            log::warn!("Annotated preview unavailable: {e}");
        }

        let events = EventAdapter::new(
            Arc::clone(&source),
            &settings.events,
            Arc::clone(&outputs.timestamps),
            Arc::clone(&outputs.state),
            Arc::clone(&liveness),
        );

        Self {
            scheduler,
            frames,
            outputs,
            liveness,
            events,
            source,
            preview,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> ExecutionMode {
        self.scheduler.mode()
    }

    /// Starts the capture and detection tasks. Idempotent.
    pub fn activate(&mut self) {
        log::info!("Tracking eyes on {} ({:?})", self.source, self.scheduler.mode());
        self.scheduler.activate();
    }

    /// Stops both tasks and waits for them to quiesce. Idempotent.
    pub fn stop(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.scheduler.stop()
    }

    /// Drives cooperative tasks; a no-op for threaded ones.
    pub fn pump(&mut self, host_delta: Duration) {
        self.scheduler.pump(host_delta);
    }

    /// Latest captured frame, or the empty frame while no session is live.
    pub fn current_frame(&self) -> Frame {
        self.frames.latest_frame()
    }

    /// Latest frame with detections drawn, when annotation is enabled.
    pub fn annotated_frame(&self) -> Frame {
        self.outputs.annotated.latest_frame()
    }

    pub fn poll_events(&mut self) -> Vec<TrackerEvent> {
        self.events.poll()
    }

    /// Debounced status of the most recent detection.
    pub fn eye_status(&self) -> Option<EyeStatus> {
        self.outputs.state.debounced()
    }

    pub fn raw_eye_status(&self) -> Option<EyeStatus> {
        self.outputs.state.raw()
    }

    pub fn last_event_time(&self, event: TimedEvent) -> Option<SystemTime> {
        self.outputs.timestamps.last(event)
    }

    pub fn is_camera_active(&self) -> bool {
        self.liveness.is_active()
    }

    /// Shows the captured frame, then the annotated frame beneath it.
    pub fn render_all(&mut self, sink: &mut dyn PreviewSink) {
        self.scheduler.render_all(sink);
    }

    pub fn start_rendering(&mut self) -> Result<(), RendererError> {
        self.scheduler.renderers_mut().start_rendering(self.preview)
    }

    /// Disables both previews and closes their windows.
    pub fn stop_rendering(&mut self, sink: &mut dyn PreviewSink) -> Result<(), RendererError> {
        self.scheduler
            .renderers_mut()
            .stop_rendering(self.preview, sink)
    }
}
