use std::sync::atomic::{AtomicU8, Ordering};

use crate::detection::domain::eye_status::EyeStatus;

const UNKNOWN: u8 = u8::MAX;

/// Latest raw and debounced statuses, readable from any thread.
#[derive(Debug)]
pub struct SharedEyeState {
    raw: AtomicU8,
    debounced: AtomicU8,
}

impl SharedEyeState {
    pub fn new() -> Self {
        Self {
            raw: AtomicU8::new(UNKNOWN),
            debounced: AtomicU8::new(UNKNOWN),
        }
    }

    pub fn publish(&self, raw: EyeStatus, debounced: EyeStatus) {
        self.raw.store(raw.to_u8(), Ordering::SeqCst);
        self.debounced.store(debounced.to_u8(), Ordering::SeqCst);
    }

    /// `None` until the first frame has been classified.
    pub fn raw(&self) -> Option<EyeStatus> {
        EyeStatus::from_u8(self.raw.load(Ordering::SeqCst))
    }

    pub fn debounced(&self) -> Option<EyeStatus> {
        EyeStatus::from_u8(self.debounced.load(Ordering::SeqCst))
    }
}

impl Default for SharedEyeState {
    fn default() -> Self {
        Self::new()
    }
}
