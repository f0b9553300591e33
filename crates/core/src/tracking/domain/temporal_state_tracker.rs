use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::domain::eye_status::EyeStatus;
use crate::tracking::domain::eye_accumulator::EyeAccumulator;

/// Debounce parameters. Multipliers are seconds of "closed" evidence gained
/// (or, for `open_multiplier`, lost) per second of wall time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Upper bound of each accumulator, in seconds.
    pub sample_window: f64,
    /// Closed-time fraction of the window at which an eye counts as closed.
    pub closed_eye_threshold: f64,
    pub open_multiplier: f64,
    pub wink_multiplier: f64,
    pub blink_multiplier: f64,
    pub error_multiplier: f64,
    /// Treat "face found, both eyes missing" like a lost face.
    pub missing_eyes_as_error: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sample_window: 0.4,
            closed_eye_threshold: 0.33,
            open_multiplier: 1.5,
            wink_multiplier: 1.0,
            blink_multiplier: 3.5,
            error_multiplier: 2.5,
            missing_eyes_as_error: false,
        }
    }
}

/// Turns noisy per-frame statuses into a stable one.
///
/// Each eye has an accumulator that grows while the frame evidence says the
/// eye is closed and decays while it says open. An eye is considered closed
/// once its accumulator covers `closed_eye_threshold` of the window.
#[derive(Clone, Debug)]
pub struct TemporalStateTracker {
    config: TrackerConfig,
    left: EyeAccumulator,
    right: EyeAccumulator,
}

impl TemporalStateTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let left = EyeAccumulator::new(config.sample_window);
        let right = EyeAccumulator::new(config.sample_window);
        Self {
            config,
            left,
            right,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Feeds one raw observation covering `delta` of wall time and returns
    /// the debounced status.
    pub fn update(&mut self, raw: EyeStatus, delta: Duration) -> EyeStatus {
        let dt = delta.as_secs_f64();
        let (left_rate, right_rate) = self.rates(raw);
        self.left.apply(dt, left_rate);
        self.right.apply(dt, right_rate);
        self.status()
    }

    pub fn status(&self) -> EyeStatus {
        EyeStatus::from_closed(self.is_closed(&self.left), self.is_closed(&self.right))
    }

    pub fn left(&self) -> &EyeAccumulator {
        &self.left
    }

    pub fn right(&self) -> &EyeAccumulator {
        &self.right
    }

    fn is_closed(&self, eye: &EyeAccumulator) -> bool {
        eye.closed_ratio() >= self.config.closed_eye_threshold
    }

    fn rates(&self, raw: EyeStatus) -> (f64, f64) {
        let c = &self.config;
        match raw {
            EyeStatus::BothOpen => (-c.open_multiplier, -c.open_multiplier),
            EyeStatus::WinkLeft => (c.wink_multiplier, -c.open_multiplier),
            EyeStatus::WinkRight => (-c.open_multiplier, c.wink_multiplier),
            EyeStatus::Blink => (c.blink_multiplier, c.blink_multiplier),
            EyeStatus::Error => (c.error_multiplier, c.error_multiplier),
        }
    }
}

impl Default for TemporalStateTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const FRAME: Duration = Duration::from_nanos(33_333_333);

    fn feed(tracker: &mut TemporalStateTracker, raw: EyeStatus, frames: usize) -> EyeStatus {
        let mut status = tracker.status();
        for _ in 0..frames {
            status = tracker.update(raw, FRAME);
        }
        status
    }

    #[test]
    fn test_initially_open() {
        let tracker = TemporalStateTracker::default();
        assert_eq!(tracker.status(), EyeStatus::BothOpen);
        assert_relative_eq!(tracker.left().closed_time(), 0.0);
        assert_relative_eq!(tracker.right().closed_time(), 0.0);
    }

    // ── Blink debounce ───────────────────────────────────────────────

    #[rstest]
    #[case::single_frame(1, EyeStatus::BothOpen)]
    #[case::two_frames(2, EyeStatus::Blink)]
    #[case::sustained(12, EyeStatus::Blink)]
    fn test_blink_needs_enough_closed_time(#[case] blink_frames: usize, #[case] expected: EyeStatus) {
        let mut tracker = TemporalStateTracker::default();
        feed(&mut tracker, EyeStatus::BothOpen, 10);
        assert_eq!(feed(&mut tracker, EyeStatus::Blink, blink_frames), expected);
    }

    #[test]
    fn test_isolated_blink_frame_is_absorbed() {
        let mut tracker = TemporalStateTracker::default();
        for _ in 0..20 {
            assert_eq!(tracker.update(EyeStatus::Blink, FRAME), EyeStatus::BothOpen);
            assert_eq!(feed(&mut tracker, EyeStatus::BothOpen, 3), EyeStatus::BothOpen);
        }
    }

    #[test]
    fn test_eyes_reopen_after_blink() {
        let mut tracker = TemporalStateTracker::default();
        feed(&mut tracker, EyeStatus::Blink, 12);
        assert_eq!(feed(&mut tracker, EyeStatus::BothOpen, 30), EyeStatus::BothOpen);
        assert_relative_eq!(tracker.left().closed_time(), 0.0);
    }

    // ── Error decay ──────────────────────────────────────────────────

    #[test]
    fn test_sustained_error_reads_as_blink() {
        let mut tracker = TemporalStateTracker::default();
        assert_eq!(feed(&mut tracker, EyeStatus::Error, 1), EyeStatus::BothOpen);
        assert_eq!(feed(&mut tracker, EyeStatus::Error, 1), EyeStatus::Blink);
    }

    // ── Winks ────────────────────────────────────────────────────────

    #[test]
    fn test_left_wink_only_moves_left_accumulator() {
        let mut tracker = TemporalStateTracker::default();
        assert_eq!(feed(&mut tracker, EyeStatus::WinkLeft, 3), EyeStatus::BothOpen);
        assert_eq!(feed(&mut tracker, EyeStatus::WinkLeft, 1), EyeStatus::WinkLeft);
        assert_relative_eq!(tracker.right().closed_time(), 0.0);
    }

    #[test]
    fn test_right_wink() {
        let mut tracker = TemporalStateTracker::default();
        assert_eq!(feed(&mut tracker, EyeStatus::WinkRight, 6), EyeStatus::WinkRight);
    }

    #[test]
    fn test_wink_turns_into_blink_when_other_eye_closes() {
        let mut tracker = TemporalStateTracker::default();
        feed(&mut tracker, EyeStatus::WinkLeft, 6);
        assert_eq!(feed(&mut tracker, EyeStatus::Blink, 2), EyeStatus::Blink);
    }

    // ── Bounds ───────────────────────────────────────────────────────

    #[test]
    fn test_accumulators_stay_within_window_under_any_sequence() {
        let mut tracker = TemporalStateTracker::default();
        let sequence = [
            EyeStatus::Blink,
            EyeStatus::Error,
            EyeStatus::WinkLeft,
            EyeStatus::BothOpen,
            EyeStatus::WinkRight,
        ];
        for (i, raw) in sequence.iter().cycle().take(500).enumerate() {
            let delta = Duration::from_millis((i as u64 * 37) % 900);
            tracker.update(*raw, delta);
            for eye in [tracker.left(), tracker.right()] {
                assert!(eye.closed_time() >= 0.0);
                assert!(eye.closed_time() <= 0.4);
            }
        }
    }

    #[test]
    fn test_config_json_uses_defaults_for_missing_fields() {
        let config: TrackerConfig = serde_json::from_str(r#"{"blink_multiplier": 5.0}"#).unwrap();
        assert_relative_eq!(config.blink_multiplier, 5.0);
        assert_relative_eq!(config.sample_window, 0.4);
        assert!(!config.missing_eyes_as_error);
    }
}
