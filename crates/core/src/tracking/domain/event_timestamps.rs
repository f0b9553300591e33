use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::detection::domain::eye_status::EyeStatus;

/// Eye events that carry a last-occurrence timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimedEvent {
    Blink,
    LeftWink,
    RightWink,
}

impl TimedEvent {
    pub const ALL: [TimedEvent; 3] = [TimedEvent::Blink, TimedEvent::LeftWink, TimedEvent::RightWink];

    /// The event stamped when the debounced status enters `status`.
    pub fn entered(status: EyeStatus) -> Option<TimedEvent> {
        match status {
            EyeStatus::Blink => Some(TimedEvent::Blink),
            EyeStatus::WinkLeft => Some(TimedEvent::LeftWink),
            EyeStatus::WinkRight => Some(TimedEvent::RightWink),
            EyeStatus::BothOpen | EyeStatus::Error => None,
        }
    }
}

/// Last wall-clock time each eye event was detected.
///
/// Written by the detection worker, read by the consumer. Each slot is a
/// single atomic holding microseconds since the Unix epoch (0 = never), and
/// writes use `fetch_max`, so a reader can never see a torn value and a
/// timestamp can never move backwards.
#[derive(Debug, Default)]
pub struct EventTimestamps {
    blink: AtomicU64,
    left_wink: AtomicU64,
    right_wink: AtomicU64,
}

impl EventTimestamps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: TimedEvent, at: SystemTime) {
        let micros = to_micros(at).max(1);
        self.slot(event).fetch_max(micros, Ordering::SeqCst);
    }

    pub fn last(&self, event: TimedEvent) -> Option<SystemTime> {
        match self.slot(event).load(Ordering::SeqCst) {
            0 => None,
            micros => Some(UNIX_EPOCH + Duration::from_micros(micros)),
        }
    }

    fn slot(&self, event: TimedEvent) -> &AtomicU64 {
        match event {
            TimedEvent::Blink => &self.blink,
            TimedEvent::LeftWink => &self.left_wink,
            TimedEvent::RightWink => &self.right_wink,
        }
    }
}

fn to_micros(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
