use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capture::domain::frame_cell::FrameCell;
use crate::capture::domain::source_liveness::SourceLiveness;
use crate::capture::domain::stream_info::StreamInfo;
use crate::capture::domain::video_capture::VideoCapture;
use crate::capture::domain::video_source::VideoSource;
use crate::scheduler::domain::periodic_task::{PeriodicTask, TickContext};
use crate::shared::constants::MIN_RESIZE_DIMENSION;
use crate::shared::frame::Frame;

#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
    pub source: VideoSource,
    /// Time between capture ticks.
    pub refresh_rate: Duration,
    /// Output size; ignored unless both dimensions exceed 2.
    pub resize: Option<(u32, u32)>,
    /// Delay before retrying after a failed open.
    pub open_cooldown: Duration,
}

impl CaptureConfig {
    pub fn new(source: VideoSource) -> Self {
        Self {
            source,
            refresh_rate: Duration::from_secs_f64(1.0 / 30.0),
            resize: Some((1280, 720)),
            open_cooldown: Duration::from_secs(1),
        }
    }
}

/// Keeps a capture session alive and publishes its frames.
///
/// Inactive ticks try to open the source (at most once per cooldown);
/// active ticks read one frame and publish it to the shared cell. Any read
/// failure or end of stream closes the session, clears the cell and drops
/// back to inactive, so the next tick reopens (which loops video files).
pub struct FrameSource {
    capture: Box<dyn VideoCapture>,
    config: CaptureConfig,
    cell: Arc<FrameCell>,
    liveness: Arc<SourceLiveness>,
    active: bool,
    next_index: usize,
    retry_at: Option<Instant>,
    stream: Option<StreamInfo>,
}

impl FrameSource {
    pub fn new(
        capture: Box<dyn VideoCapture>,
        config: CaptureConfig,
        cell: Arc<FrameCell>,
        liveness: Arc<SourceLiveness>,
    ) -> Self {
        Self {
            capture,
            config,
            cell,
            liveness,
            active: false,
            next_index: 1,
            retry_at: None,
            stream: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream.as_ref()
    }

    pub fn frame_cell(&self) -> Arc<FrameCell> {
        Arc::clone(&self.cell)
    }

    /// Attempts to open the source. Returns whether a session is active.
    pub fn open(&mut self) -> bool {
        if self.active {
            return true;
        }
        match self.capture.open(&self.config.source) {
            Ok(info) => {
                log::info!("Video stream opened: {info}");
                self.stream = Some(info);
                self.active = true;
                self.retry_at = None;
                self.liveness.mark_opened();
                true
            }
            Err(e) => {
                log::error!(
                    "Video stream {} could not be initialised: {e}",
                    self.config.source
                );
                self.retry_at = Some(Instant::now() + self.config.open_cooldown);
                false
            }
        }
    }

    /// Reads and publishes one frame. Returns `None` when nothing was
    /// published, which also demotes an active session.
    pub fn read_next(&mut self) -> Option<Frame> {
        if !self.active {
            return None;
        }
        let started = Instant::now();
        match self.capture.read() {
            Ok(Some(frame)) if !frame.is_empty() => {
                let frame = self.prepare(frame);
                self.next_index += 1;
                self.cell.publish(frame.clone());
                log::trace!(
                    "Published frame {} in {:.1}ms",
                    frame.index(),
                    started.elapsed().as_secs_f64() * 1000.0
                );
                Some(frame)
            }
            Ok(_) => {
                log::info!("Video stream {} reached end of stream", self.config.source);
                self.demote();
                None
            }
            Err(e) => {
                log::error!("Video stream {} read failed: {e}", self.config.source);
                self.demote();
                None
            }
        }
    }

    pub fn latest_frame(&self) -> Frame {
        self.cell.latest_frame()
    }

    /// Releases the session and withdraws the published frame. Idempotent.
    pub fn close(&mut self) {
        if self.active {
            log::info!("Closing video stream {}", self.config.source);
        }
        self.demote();
    }

    fn prepare(&self, frame: Frame) -> Frame {
        let frame = match self.config.resize {
            Some((w, h)) if w > MIN_RESIZE_DIMENSION && h > MIN_RESIZE_DIMENSION => {
                frame.resized(w, h)
            }
            _ => frame,
        };
        frame.with_index(self.next_index)
    }

    fn demote(&mut self) {
        self.capture.close();
        self.cell.clear();
        if self.active {
            self.liveness.mark_lost();
        }
        self.active = false;
        self.stream = None;
    }

    fn cooling_down(&self) -> bool {
        self.retry_at.is_some_and(|at| Instant::now() < at)
    }
}

impl PeriodicTask for FrameSource {
    fn name(&self) -> &str {
        "capture"
    }

    fn interval(&self) -> Duration {
        self.config.refresh_rate
    }

    fn tick(&mut self, ctx: &TickContext<'_>) {
        if ctx.stop_requested() {
            return;
        }
        if !self.active && (self.cooling_down() || !self.open()) {
            return;
        }
        self.read_next();
    }

    fn on_stop(&mut self) {
        self.close();
    }
}
