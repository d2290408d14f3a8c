//! Rate limit for progress snapshots.
//!
//! Presentation only: the fold never waits on it.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SnapshotThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl SnapshotThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true (and records `now`) when a snapshot may be emitted.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_snapshot_is_immediate_then_rate_limited() {
        let t0 = Instant::now();
        let mut throttle = SnapshotThrottle::new(Duration::from_millis(150));
        assert!(throttle.ready(t0));
        assert!(!throttle.ready(t0 + Duration::from_millis(149)));
        assert!(throttle.ready(t0 + Duration::from_millis(150)));
        assert!(!throttle.ready(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn reset_allows_immediate_snapshot() {
        let t0 = Instant::now();
        let mut throttle = SnapshotThrottle::new(Duration::from_secs(10));
        assert!(throttle.ready(t0));
        throttle.reset();
        assert!(throttle.ready(t0));
    }
}
