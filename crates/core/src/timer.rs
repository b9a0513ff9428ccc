//! Timers for frame timing and rate limiting.

use std::time::Instant;

/// Wall-clock stopwatch for measuring load and render work.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_lap: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_lap: now,
        }
    }

    /// Milliseconds since the timer was created.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Milliseconds since the previous lap (or creation).
    pub fn lap_ms(&mut self) -> f64 {
        let now = Instant::now();
        let lap = now.duration_since(self.last_lap);
        self.last_lap = now;
        lap.as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limiter driven by caller-supplied timestamps.
///
/// An attempt only consumes the interval when it actually fires, so a
/// quiet period never delays the next real event.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: f64,
    last_fire_ms: f64,
}

impl Throttle {
    /// Create a throttle that allows one firing per `interval_ms`.
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_fire_ms: f64::NEG_INFINITY,
        }
    }

    /// Returns true and records `now_ms` when there is pending work and
    /// the interval has elapsed. Otherwise the last firing time is kept.
    pub fn try_fire(&mut self, now_ms: f64, pending: bool) -> bool {
        if pending && now_ms - self.last_fire_ms > self.interval_ms {
            self.last_fire_ms = now_ms;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_requires_pending_work() {
        let mut throttle = Throttle::new(50.0);
        assert!(!throttle.try_fire(100.0, false));
        assert!(throttle.try_fire(100.0, true));
    }

    #[test]
    fn test_throttle_spacing() {
        let mut throttle = Throttle::new(50.0);
        assert!(throttle.try_fire(0.0, true));
        assert!(!throttle.try_fire(30.0, true));
        assert!(!throttle.try_fire(50.0, true));
        assert!(throttle.try_fire(51.0, true));
    }

    #[test]
    fn test_throttle_keeps_old_time_when_idle() {
        let mut throttle = Throttle::new(50.0);
        assert!(throttle.try_fire(0.0, true));
        // idle attempts must not push the window forward
        assert!(!throttle.try_fire(40.0, false));
        assert!(throttle.try_fire(60.0, true));
    }

    #[test]
    fn test_timer_laps_never_exceed_total() {
        let mut timer = Timer::new();
        let first = timer.lap_ms();
        let second = timer.lap_ms();
        assert!(first >= 0.0 && second >= 0.0);
        assert!(timer.elapsed_ms() >= first + second);
    }
}
