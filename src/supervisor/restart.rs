//! Restart budget tracking
//!
//! Each worker gets a bounded number of restarts inside a sliding time
//! window. Crashes beyond the budget leave the worker crashed for good
//! and the failure is reported upward.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window restart budget for one worker
#[derive(Debug)]
pub struct RestartTracker {
    max_restarts: u32,
    window: Duration,
    restarts: VecDeque<Instant>,
}

impl RestartTracker {
    /// Create a tracker allowing `max_restarts` per `window`
    pub fn new(max_restarts: u32, window: Duration) -> Self {
        Self {
            max_restarts,
            window,
            restarts: VecDeque::new(),
        }
    }

    /// Record a crash at `now`; returns whether a restart is allowed
    pub fn allow(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.restarts.front() {
            if now.duration_since(oldest) > self.window {
                self.restarts.pop_front();
            } else {
                break;
            }
        }

        if (self.restarts.len() as u32) < self.max_restarts {
            self.restarts.push_back(now);
            true
        } else {
            false
        }
    }

    /// Restarts currently counted against the budget
    pub fn used(&self) -> usize {
        self.restarts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_of_three() {
        // Three consecutive crashes restart; the fourth does not.
        let mut tracker = RestartTracker::new(3, Duration::from_secs(60));
        let t0 = Instant::now();

        assert!(tracker.allow(t0));
        assert!(tracker.allow(t0 + Duration::from_secs(1)));
        assert!(tracker.allow(t0 + Duration::from_secs(2)));
        assert!(!tracker.allow(t0 + Duration::from_secs(3)));
        assert_eq!(tracker.used(), 3);
    }

    #[test]
    fn test_window_expiry_refreshes_budget() {
        let mut tracker = RestartTracker::new(2, Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(tracker.allow(t0));
        assert!(tracker.allow(t0 + Duration::from_secs(1)));
        assert!(!tracker.allow(t0 + Duration::from_secs(2)));

        // Past the window, the earliest entries age out.
        assert!(tracker.allow(t0 + Duration::from_secs(12)));
    }

    #[test]
    fn test_zero_budget() {
        let mut tracker = RestartTracker::new(0, Duration::from_secs(60));
        assert!(!tracker.allow(Instant::now()));
    }
}
