use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared stop request for one activation of a task.
///
/// Cloning yields a handle to the same flag, so a task can check whether a
/// stop was requested while it is still finishing a tick.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-tick inputs handed to a task by whichever executor drives it.
pub struct TickContext<'a> {
    /// Wall-clock time since this task's previous tick.
    pub delta: Duration,
    pub cancel: &'a CancelToken,
}

impl TickContext<'_> {
    pub fn stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A unit of periodic background work with explicit start/tick/stop hooks.
///
/// Ticks never return errors: a task absorbs and logs its own failures so
/// the loop driving it keeps running until it is stopped.
pub trait PeriodicTask: Send {
    fn name(&self) -> &str;

    /// Target time between tick starts.
    fn interval(&self) -> Duration;

    fn on_start(&mut self) {}

    fn tick(&mut self, ctx: &TickContext<'_>);

    fn on_stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_cancel_twice_stays_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_context_reports_stop_request() {
        let token = CancelToken::new();
        let ctx = TickContext {
            delta: Duration::from_millis(10),
            cancel: &token,
        };
        assert!(!ctx.stop_requested());
        token.cancel();
        assert!(ctx.stop_requested());
    }
}
