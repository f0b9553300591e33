use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Cross-thread view of whether a capture session is live.
///
/// `sessions` counts successful opens, so a consumer that polls slowly can
/// still tell that a session was lost and re-established between polls.
#[derive(Debug, Default)]
pub struct SourceLiveness {
    active: AtomicBool,
    sessions: AtomicU64,
}

impl SourceLiveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_opened(&self) {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn mark_lost(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn sessions(&self) -> u64 {
        self.sessions.load(Ordering::SeqCst)
    }
}
