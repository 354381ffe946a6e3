//! Bounded history of per-second samples with rolling sums.

use std::collections::VecDeque;

/// Samples kept for the one-hour sum.
pub const HOUR_SAMPLES: usize = 3600;

/// Samples summed for the one-minute sum.
pub const MINUTE_SAMPLES: usize = 60;

/// Sliding window of per-second pulse counts, oldest first.
///
/// Holds at most [`HOUR_SAMPLES`] entries. Both windowed sums are kept as
/// running totals: pushing a sample adds it and subtracts whatever falls out
/// of each window, so a tick costs O(1) instead of a pass over the hour.
#[derive(Debug, Clone, Default)]
pub struct SlidingWindow {
    samples: VecDeque<u64>,
    minute_sum: u64,
    hour_sum: u64,
}

impl SlidingWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HOUR_SAMPLES + 1),
            minute_sum: 0,
            hour_sum: 0,
        }
    }

    /// Append the newest sample, evicting the oldest once the hour is full.
    pub fn push(&mut self, sample: u64) {
        self.samples.push_back(sample);
        self.minute_sum += sample;
        self.hour_sum += sample;

        // The sample that just left the minute window is still in the deque.
        if self.samples.len() > MINUTE_SAMPLES {
            let left = self.samples[self.samples.len() - 1 - MINUTE_SAMPLES];
            self.minute_sum -= left;
        }

        if self.samples.len() > HOUR_SAMPLES {
            if let Some(evicted) = self.samples.pop_front() {
                self.hour_sum -= evicted;
            }
        }
    }

    /// Sum of the last `min(60, len)` samples.
    pub fn minute_sum(&self) -> u64 {
        self.minute_sum
    }

    /// Sum of the last `min(3600, len)` samples.
    pub fn hour_sum(&self) -> u64 {
        self.hour_sum
    }

    /// Number of samples held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True before the first sample.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sum of the newest `n` samples, computed by walking the deque.
    pub fn sum_last(&self, n: usize) -> u64 {
        self.samples.iter().rev().take(n).sum()
    }
}
