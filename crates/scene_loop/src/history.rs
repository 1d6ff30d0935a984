//! Recent tick durations
//!
//! Fixed-size window over the last ticks, used to spot a loop that cannot
//! keep up with its wall period.

use std::time::Duration;

use ringbuf::{traits::*, HeapRb};

/// Ticks kept in the window
pub const DEFAULT_HISTORY_LEN: usize = 128;

/// Sliding window of tick processing times
pub struct TickHistory {
    durations: HeapRb<Duration>,
    overruns: u64,
}

impl std::fmt::Debug for TickHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHistory")
            .field("len", &self.durations.occupied_len())
            .field("overruns", &self.overruns)
            .finish()
    }
}

impl Default for TickHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl TickHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            durations: HeapRb::new(capacity.max(1)),
            overruns: 0,
        }
    }

    /// Record a tick; returns true when it took longer than `budget`.
    pub fn push(&mut self, duration: Duration, budget: Duration) -> bool {
        self.durations.push_overwrite(duration);
        let overrun = duration > budget;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    pub fn len(&self) -> usize {
        self.durations.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Ticks over budget since construction
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn mean(&self) -> Option<Duration> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let total: Duration = self.durations.iter().sum();
        Some(total / len as u32)
    }

    pub fn max(&self) -> Option<Duration> {
        self.durations.iter().max().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_overwrites_oldest() {
        let mut history = TickHistory::new(3);
        for ms in [10, 1, 2, 3] {
            history.push(Duration::from_millis(ms), Duration::from_millis(100));
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.max(), Some(Duration::from_millis(3)));
        assert_eq!(history.mean(), Some(Duration::from_millis(2)));
    }

    #[test]
    fn test_overrun_counted() {
        let mut history = TickHistory::default();
        assert!(!history.push(Duration::from_millis(5), Duration::from_millis(10)));
        assert!(history.push(Duration::from_millis(15), Duration::from_millis(10)));
        assert_eq!(history.overruns(), 1);
    }

    #[test]
    fn test_empty_history() {
        let history = TickHistory::default();
        assert!(history.is_empty());
        assert_eq!(history.mean(), None);
        assert_eq!(history.max(), None);
    }
}
