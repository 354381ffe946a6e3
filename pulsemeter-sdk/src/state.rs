//! Shared pulse counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe pulse tally shared by the inputs and the aggregator.
///
/// Each logical counter is a single atomic, so the edge loop, the reset
/// callback and the tick task never need a lock between them.
#[derive(Debug, Default)]
pub struct Tally {
    /// Pulses since the last tick. Read-and-zeroed once per tick.
    current: AtomicU64,
    /// Pulses since startup or the last reset.
    cumulative: AtomicU64,
}

impl Tally {
    /// Count one pulse in both counters.
    pub fn record_pulse(&self) {
        self.current.fetch_add(1, Ordering::Relaxed);
        self.cumulative.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the current interval's count, leaving zero behind.
    pub fn take_current(&self) -> u64 {
        self.current.swap(0, Ordering::Relaxed)
    }

    /// Pulses counted since the last tick, without resetting.
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    /// Pulses since startup or the last reset.
    pub fn cumulative(&self) -> u64 {
        self.cumulative.load(Ordering::Relaxed)
    }

    /// Zero the cumulative count. The current interval is left alone.
    pub fn reset_cumulative(&self) {
        self.cumulative.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_pulse_increments_both_counters() {
        let tally = Tally::default();

        tally.record_pulse();
        tally.record_pulse();

        assert_eq!(tally.current(), 2);
        assert_eq!(tally.cumulative(), 2);
    }

    #[test]
    fn take_current_zeroes_only_the_interval() {
        let tally = Tally::default();
        for _ in 0..4 {
            tally.record_pulse();
        }

        assert_eq!(tally.take_current(), 4);
        assert_eq!(tally.take_current(), 0);
        assert_eq!(tally.cumulative(), 4);
    }

    #[test]
    fn reset_zeroes_cumulative_regardless_of_prior_value() {
        let tally = Tally::default();
        for _ in 0..1000 {
            tally.record_pulse();
        }

        tally.reset_cumulative();
        assert_eq!(tally.cumulative(), 0);

        // Resetting twice is the same as resetting once
        tally.reset_cumulative();
        assert_eq!(tally.cumulative(), 0);

        tally.record_pulse();
        assert_eq!(tally.cumulative(), 1);
    }

    #[test]
    fn reset_leaves_current_interval_untouched() {
        let tally = Tally::default();
        tally.record_pulse();
        tally.record_pulse();

        tally.reset_cumulative();

        assert_eq!(tally.current(), 2);
    }

    #[test]
    fn concurrent_increments_are_thread_safe() {
        use std::thread;

        let tally = Arc::new(Tally::default());

        let mut handles = vec![];
        for _ in 0..10 {
            let t = tally.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    t.record_pulse();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(tally.current(), 1000);
        assert_eq!(tally.cumulative(), 1000);
    }

    #[test]
    fn concurrent_take_never_loses_or_duplicates_pulses() {
        use std::thread;

        let tally = Arc::new(Tally::default());

        let writer = {
            let t = tally.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    t.record_pulse();
                }
            })
        };

        let mut taken = 0;
        while !writer.is_finished() {
            taken += tally.take_current();
        }
        writer.join().unwrap();
        taken += tally.take_current();

        assert_eq!(taken, 10_000);
        assert_eq!(tally.cumulative(), 10_000);
    }
}
