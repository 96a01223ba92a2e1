//! Windowed stuck detection.
//!
//! The runner's position is compared against the start of the current
//! window once the window length has elapsed. Low-displacement windows add
//! their duration to an accumulator; any window with enough movement clears
//! it. Every window restarts from the position where the previous ended.

use std::time::Duration;

use crate::geometry::Point;

/// Sampling window length.
pub const STUCK_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct StuckDetector {
    threshold: Duration,
    min_move: f32,
    window: Duration,
    anchor: Option<(Duration, Point)>,
    accumulated: Duration,
}

impl StuckDetector {
    pub fn new(threshold: Duration, min_move: f32) -> Self {
        Self {
            threshold,
            min_move,
            window: STUCK_WINDOW,
            anchor: None,
            accumulated: Duration::ZERO,
        }
    }

    /// Starts the first window at `now`/`pos` and clears the accumulator.
    pub fn arm(&mut self, now: Duration, pos: Point) {
        self.anchor = Some((now, pos));
        self.accumulated = Duration::ZERO;
    }

    /// Feeds one position sample. Returns true once the accumulated stuck
    /// time reaches the threshold.
    pub fn sample(&mut self, now: Duration, pos: Point) -> bool {
        let Some((started, anchor)) = self.anchor else {
            self.arm(now, pos);
            return false;
        };
        let elapsed = now.saturating_sub(started);
        if elapsed < self.window {
            return false;
        }

        if anchor.distance(pos) < self.min_move {
            self.accumulated += elapsed;
        } else {
            self.accumulated = Duration::ZERO;
        }
        self.anchor = Some((now, pos));
        self.accumulated >= self.threshold
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_fires_after_threshold_of_stillness() {
        let mut d = StuckDetector::new(ms(1000), 8.0);
        d.arm(ms(0), Point::ZERO);
        let mut fired_at = None;
        for t in (10..=2000).step_by(10) {
            // micro-jitter below the threshold
            let jitter = if t % 20 == 0 { 2.0 } else { -2.0 };
            if d.sample(ms(t), Point::new(jitter, 0.0)) {
                fired_at = Some(t);
                break;
            }
        }
        assert_eq!(fired_at, Some(1000));
    }

    #[test]
    fn test_movement_every_window_never_fires() {
        let mut d = StuckDetector::new(ms(400), 8.0);
        d.arm(ms(0), Point::ZERO);
        for t in (10..=10_000u64).step_by(10) {
            let x = t as f32 * 0.05; // 10 px per 200ms window
            assert!(!d.sample(ms(t), Point::new(x, 0.0)));
        }
    }

    #[test]
    fn test_movement_resets_accumulator() {
        let mut d = StuckDetector::new(ms(600), 8.0);
        d.arm(ms(0), Point::ZERO);
        assert!(!d.sample(ms(200), Point::ZERO));
        assert!(!d.sample(ms(400), Point::ZERO));
        assert_eq!(d.accumulated(), ms(400));
        assert!(!d.sample(ms(600), Point::new(50.0, 0.0)));
        assert_eq!(d.accumulated(), Duration::ZERO);
        assert!(!d.sample(ms(800), Point::new(50.0, 0.0)));
        assert!(!d.sample(ms(1000), Point::new(50.0, 0.0)));
        assert!(d.sample(ms(1200), Point::new(50.0, 0.0)));
    }

    #[test]
    fn test_samples_inside_window_are_ignored() {
        let mut d = StuckDetector::new(ms(200), 8.0);
        d.arm(ms(0), Point::ZERO);
        assert!(!d.sample(ms(100), Point::ZERO));
        assert_eq!(d.accumulated(), Duration::ZERO);
        assert!(d.sample(ms(200), Point::ZERO));
    }
}
