use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::capture::domain::source_liveness::SourceLiveness;
use crate::detection::domain::eye_status::EyeStatus;
use crate::shared::settings::EventSettings;
use crate::tracking::domain::event_timestamps::{EventTimestamps, TimedEvent};
use crate::tracking::domain::shared_eye_state::SharedEyeState;

/// Discrete events delivered to the consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EyeEvent {
    Blink,
    LeftWink,
    RightWink,
    BothEyesOpen,
    CameraFound,
    CameraLost,
}

impl fmt::Display for EyeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EyeEvent::Blink => "blink",
            EyeEvent::LeftWink => "left eye wink",
            EyeEvent::RightWink => "right eye wink",
            EyeEvent::BothEyesOpen => "both eyes open",
            EyeEvent::CameraFound => "camera found",
            EyeEvent::CameraLost => "camera lost",
        })
    }
}

impl From<TimedEvent> for EyeEvent {
    fn from(event: TimedEvent) -> Self {
        match event {
            TimedEvent::Blink => EyeEvent::Blink,
            TimedEvent::LeftWink => EyeEvent::LeftWink,
            TimedEvent::RightWink => EyeEvent::RightWink,
        }
    }
}

/// An event together with the tracker instance that emitted it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerEvent {
    pub source: Arc<str>,
    pub event: EyeEvent,
}

/// Turns a monotonic timestamp into at-most-once firings.
///
/// A new timestamp fires when it is the first one seen or when at least
/// `reset` has passed since the previous timestamp. Timestamps arriving
/// faster than that belong to the same burst and are absorbed.
#[derive(Clone, Debug)]
struct EdgeTrigger {
    reset: Duration,
    last_seen: Option<SystemTime>,
}

impl EdgeTrigger {
    fn new(reset: Duration) -> Self {
        Self {
            reset,
            last_seen: None,
        }
    }

    fn observe(&mut self, current: Option<SystemTime>) -> bool {
        let Some(ts) = current else {
            return false;
        };
        let fire = match self.last_seen {
            None => true,
            Some(last) if ts > last => ts.duration_since(last).is_ok_and(|gap| gap >= self.reset),
            Some(_) => return false,
        };
        self.last_seen = Some(ts);
        fire
    }
}

/// Consumer-side poller over the tracker's shared outputs.
///
/// Nothing here blocks or touches the workers: each `poll` reads the
/// timestamps, the debounced status and the capture liveness, and returns
/// the events that became due since the previous poll.
pub struct EventAdapter {
    source: Arc<str>,
    timestamps: Arc<EventTimestamps>,
    state: Arc<SharedEyeState>,
    liveness: Arc<SourceLiveness>,
    triggers: [(TimedEvent, EdgeTrigger); 3],
    last_status: Option<EyeStatus>,
    last_sessions: u64,
    last_active: bool,
}

impl EventAdapter {
    pub fn new(
        source: Arc<str>,
        settings: &EventSettings,
        timestamps: Arc<EventTimestamps>,
        state: Arc<SharedEyeState>,
        liveness: Arc<SourceLiveness>,
    ) -> Self {
        let window = |secs: f64| Duration::from_secs_f64(secs.max(0.0));
        Self {
            source,
            timestamps,
            state,
            liveness,
            triggers: [
                (TimedEvent::Blink, EdgeTrigger::new(window(settings.blink_reset_secs))),
                (TimedEvent::LeftWink, EdgeTrigger::new(window(settings.left_wink_reset_secs))),
                (TimedEvent::RightWink, EdgeTrigger::new(window(settings.right_wink_reset_secs))),
            ],
            last_status: None,
            last_sessions: 0,
            last_active: false,
        }
    }

    pub fn poll(&mut self) -> Vec<TrackerEvent> {
        let mut events = Vec::new();

        let sessions = self.liveness.sessions();
        let active = self.liveness.is_active();
        let opened = sessions > self.last_sessions;
        if opened {
            events.push(EyeEvent::CameraFound);
        }
        if (self.last_active || opened) && !active {
            events.push(EyeEvent::CameraLost);
        }
        self.last_sessions = sessions;
        self.last_active = active;

        for (event, trigger) in &mut self.triggers {
            if trigger.observe(self.timestamps.last(*event)) {
                events.push((*event).into());
            }
        }

        let status = self.state.debounced();
        if status == Some(EyeStatus::BothOpen)
            && self
                .last_status
                .is_some_and(|previous| previous != EyeStatus::BothOpen)
        {
            events.push(EyeEvent::BothEyesOpen);
        }
        if status.is_some() {
            self.last_status = status;
        }

        events
            .into_iter()
            .map(|event| {
                log::debug!("{}: {event}", self.source);
                TrackerEvent {
                    source: Arc::clone(&self.source),
                    event,
                }
            })
            .collect()
    }
}
