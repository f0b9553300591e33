/// Bounded "time closed" evidence for one eye, in seconds.
///
/// The value always stays within `[0, window]`: updates that would leave
/// the range are clamped, and non-finite updates are ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeAccumulator {
    closed_time: f64,
    window: f64,
}

impl EyeAccumulator {
    pub fn new(window: f64) -> Self {
        Self {
            closed_time: 0.0,
            window: window.max(0.0),
        }
    }

    /// Adds `delta_seconds * rate`; negative rates decay toward open.
    pub fn apply(&mut self, delta_seconds: f64, rate: f64) {
        let next = self.closed_time + delta_seconds * rate;
        if next.is_finite() {
            self.closed_time = next.clamp(0.0, self.window);
        }
    }

    pub fn closed_time(&self) -> f64 {
        self.closed_time
    }

    pub fn window(&self) -> f64 {
        self.window
    }

    /// Fraction of the window spent closed, in `[0, 1]`.
    pub fn closed_ratio(&self) -> f64 {
        if self.window > 0.0 {
            self.closed_time / self.window
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_starts_open() {
        let acc = EyeAccumulator::new(0.4);
        assert_relative_eq!(acc.closed_time(), 0.0);
        assert_relative_eq!(acc.closed_ratio(), 0.0);
    }

    #[test]
    fn test_accumulates_and_decays() {
        let mut acc = EyeAccumulator::new(0.4);
        acc.apply(0.1, 2.0);
        assert_relative_eq!(acc.closed_time(), 0.2);
        acc.apply(0.1, -1.5);
        assert_relative_eq!(acc.closed_time(), 0.05, epsilon = 1e-12);
        assert_relative_eq!(acc.closed_ratio(), 0.125, epsilon = 1e-12);
    }

    #[rstest]
    #[case::large_positive(10.0, 3.5)]
    #[case::large_negative(10.0, -3.5)]
    #[case::negative_delta(-5.0, 2.5)]
    #[case::negative_both(-5.0, -2.5)]
    #[case::zero(0.0, 1.0)]
    #[case::tiny(1e-9, 1e-9)]
    fn test_value_stays_within_window(#[case] delta: f64, #[case] rate: f64) {
        let mut acc = EyeAccumulator::new(0.4);
        acc.apply(0.1, 2.0);
        for _ in 0..5 {
            acc.apply(delta, rate);
            assert!((0.0..=0.4).contains(&acc.closed_time()));
        }
    }

    #[test]
    fn test_non_finite_update_is_ignored() {
        let mut acc = EyeAccumulator::new(0.4);
        acc.apply(0.1, 1.0);
        acc.apply(f64::NAN, 1.0);
        acc.apply(f64::INFINITY, -1.0);
        assert_relative_eq!(acc.closed_time(), 0.1);
    }

    #[test]
    fn test_saturates_at_window() {
        let mut acc = EyeAccumulator::new(0.4);
        acc.apply(1.0, 5.0);
        assert_relative_eq!(acc.closed_time(), 0.4);
        assert_relative_eq!(acc.closed_ratio(), 1.0);
    }
}
