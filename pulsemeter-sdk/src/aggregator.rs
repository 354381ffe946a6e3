//! Per-tick aggregation of the tally into snapshots.

use std::sync::Arc;

use pulsemeter_types::Snapshot;

use crate::state::Tally;
use crate::window::SlidingWindow;

/// Identity and scaling stamped onto every snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotLabels {
    /// Device identifier.
    pub uuid: String,
    /// Physical pin of the pulse input.
    pub gpio: u8,
    /// Scale factor for the `*_mult` fields.
    pub multiplier: f64,
}

impl Default for SnapshotLabels {
    fn default() -> Self {
        Self {
            uuid: String::new(),
            gpio: 0,
            multiplier: 1.0,
        }
    }
}

/// Turns the shared tally into one [`Snapshot`] per tick.
///
/// Owns the [`SlidingWindow`]; nothing else touches it, so the aggregator
/// needs `&mut self` and no lock.
#[derive(Debug)]
pub struct Aggregator {
    tally: Arc<Tally>,
    window: SlidingWindow,
    labels: SnapshotLabels,
}

impl Aggregator {
    /// Create an aggregator over a shared tally.
    pub fn new(tally: Arc<Tally>, labels: SnapshotLabels) -> Self {
        Self {
            tally,
            window: SlidingWindow::new(),
            labels,
        }
    }

    /// Sample the tally and produce this tick's snapshot.
    ///
    /// The current-second count is read and zeroed in one atomic swap; a
    /// pulse racing the swap lands in either this tick or the next, never
    /// both.
    pub fn on_tick(&mut self) -> Snapshot {
        let second = self.tally.take_current();
        self.window.push(second);

        Snapshot::builder()
            .uuid(self.labels.uuid.clone())
            .gpio(self.labels.gpio)
            .per_second(second)
            .per_minute(self.window.minute_sum())
            .per_hour(self.window.hour_sum())
            .pulse_count(self.tally.cumulative())
            .multiplier(self.labels.multiplier)
            .build()
    }

    /// The sample history.
    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// The labels stamped on each snapshot.
    pub fn labels(&self) -> &SnapshotLabels {
        &self.labels
    }
}
