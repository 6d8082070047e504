// SPDX-License-Identifier: GPL-3.0-only

use std::time::{Duration, Instant};

/// Rate limiter for the per-frame callback
///
/// Fires on the first frame, then only once more than `interval` has passed
/// since the last firing.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the callback should run for a frame seen at `now`
    pub fn should_fire(&mut self, now: Instant) -> bool {
        let due = match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        };
        if due {
            self.last_fired = Some(now);
        }
        due
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_at_most_once_per_interval() {
        let mut throttle = FrameThrottle::new(Duration::from_secs(1));
        let start = Instant::now();

        let fired: Vec<bool> = [0, 16, 500, 1000, 1001, 1500, 2002]
            .iter()
            .map(|ms| throttle.should_fire(start + Duration::from_millis(*ms)))
            .collect();

        assert_eq!(fired, vec![true, false, false, false, true, false, true]);
    }

    #[test]
    fn test_reset_fires_again() {
        let mut throttle = FrameThrottle::new(Duration::from_secs(1));
        let now = Instant::now();
        assert!(throttle.should_fire(now));
        throttle.reset();
        assert!(throttle.should_fire(now));
    }
}
