//! Scalar tweening

use std::time::Duration;

use super::Easing;

/// Interpolates a scalar from `start` to `end` over `duration`
#[derive(Debug, Clone, PartialEq)]
pub struct Tween {
    pub start: f32,
    pub end: f32,
    pub duration: Duration,
    /// Linear progress (0-1) before easing
    pub progress: f32,
    pub easing: Easing,
}

impl Tween {
    pub fn new(start: f32, end: f32, duration: Duration) -> Self {
        Self {
            start,
            end,
            duration,
            progress: 0.0,
            easing: Easing::Linear,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Advance by `dt` and return the time left over once the tween
    /// completes, so chained tweens consume exactly the elapsed time
    pub fn advance(&mut self, dt: Duration) -> Duration {
        if self.is_complete() {
            return dt;
        }

        let total = self.duration.as_secs_f32();
        if total <= 0.0 {
            self.progress = 1.0;
            return dt;
        }

        let remaining = self.duration.mul_f32(1.0 - self.progress);
        if dt >= remaining {
            self.progress = 1.0;
            dt - remaining
        } else {
            self.progress = (self.progress + dt.as_secs_f32() / total).min(1.0);
            Duration::ZERO
        }
    }

    /// Current eased value
    pub fn value(&self) -> f32 {
        let t = self.easing.apply(self.progress);
        self.start + (self.end - self.start) * t
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn reset(&mut self) {
        self.progress = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halfway_linear() {
        let mut t = Tween::new(0.0, 1.0, Duration::from_millis(1500));
        let left = t.advance(Duration::from_millis(750));
        assert_eq!(left, Duration::ZERO);
        assert!((t.value() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_overshoot_returns_leftover() {
        let mut t = Tween::new(0.25, 0.85, Duration::from_millis(250));
        let left = t.advance(Duration::from_millis(400));
        assert!(t.is_complete());
        assert_eq!(t.value(), 0.85);
        assert_eq!(left, Duration::from_millis(150));
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let mut t = Tween::new(0.0, 2.0, Duration::ZERO);
        t.advance(Duration::from_millis(1));
        assert!(t.is_complete());
        assert_eq!(t.value(), 2.0);
    }
}
