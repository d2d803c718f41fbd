//! Moving window of recent processing durations

use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// Keeps the last `capacity` job durations, oldest evicted first
#[derive(Debug, Clone)]
pub struct ProcessingHistory {
    durations: VecDeque<Duration>,
    capacity: usize,
}

impl Default for ProcessingHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }
}

impl ProcessingHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            durations: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.durations.len() == self.capacity {
            self.durations.pop_front();
        }
        self.durations.push_back(duration);
    }

    /// Mean duration in seconds, `None` while empty
    pub fn average(&self) -> Option<f64> {
        if self.durations.is_empty() {
            return None;
        }
        let total: f64 = self.durations.iter().map(Duration::as_secs_f64).sum();
        Some(total / self.durations.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Duration> {
        self.durations.iter()
    }
}
