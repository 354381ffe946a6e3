//! The main PulseMeter type tying the tally, aggregator and outputs together.

use std::sync::Arc;
use std::time::Duration;

use crate::aggregator::{Aggregator, SnapshotLabels};
use crate::handle::PulseHandle;
use crate::output::{Output, Publisher};
use crate::state::Tally;
use crate::ticker::Ticker;

/// Default tick period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// The main entry point for metering a pulse input.
///
/// A PulseMeter owns the shared tally. Inputs record into it through
/// [`PulseHandle`]s, and once [`start`](Self::start)ed the meter aggregates
/// it into a snapshot every interval and delivers that to its outputs.
///
/// # Example
///
/// ```rust,no_run
/// use pulsemeter_sdk::{LatestSnapshot, Output, PulseMeter};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let latest = LatestSnapshot::new();
///     let meter = PulseMeter::builder()
///         .uuid("device-1")
///         .gpio(37)
///         .multiplier(0.5)
///         .output(Output::pull(latest.clone()))
///         .build();
///
///     let handle = meter.handle();
///     let ticker = meter.start();
///
///     handle.record_pulse();
///
///     tokio::time::sleep(Duration::from_secs(2)).await;
///     println!("{:?}", latest.get());
///
///     ticker.cancel();
///     ticker.join().await;
/// }
/// ```
#[derive(Debug)]
pub struct PulseMeter {
    tally: Arc<Tally>,
    labels: SnapshotLabels,
    publisher: Publisher,
    interval: Duration,
}

impl PulseMeter {
    /// Create a meter with default settings.
    ///
    /// By default, no outputs are configured, the multiplier is 1 and the
    /// interval is 1 second.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the meter.
    pub fn builder() -> MeterBuilder {
        MeterBuilder::new()
    }

    /// Get a handle for recording pulses.
    pub fn handle(&self) -> PulseHandle {
        PulseHandle::new(self.tally.clone())
    }

    /// An aggregator over this meter's tally, for driving ticks by hand.
    ///
    /// Do not combine with [`start`](Self::start): both would drain the
    /// same per-second counter.
    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(self.tally.clone(), self.labels.clone())
    }

    /// The labels stamped on every snapshot.
    pub fn labels(&self) -> &SnapshotLabels {
        &self.labels
    }

    /// The tick period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking on the current tokio runtime.
    ///
    /// Each tick aggregates the tally into a snapshot and publishes it to
    /// every output. Handles taken earlier keep recording into the same
    /// tally.
    pub fn start(self) -> Ticker {
        let mut aggregator = Aggregator::new(self.tally, self.labels);
        let publisher = self.publisher;

        Ticker::start(self.interval, move || {
            let snapshot = aggregator.on_tick();
            publisher.publish(&snapshot);
            std::future::ready(())
        })
    }
}

impl Default for PulseMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring a PulseMeter.
#[derive(Debug, Default)]
pub struct MeterBuilder {
    labels: SnapshotLabels,
    outputs: Vec<Output>,
    interval: Option<Duration>,
}

impl MeterBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device identifier.
    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.labels.uuid = uuid.into();
        self
    }

    /// Set the pulse input's physical pin, reported in snapshots.
    pub fn gpio(mut self, pin: u8) -> Self {
        self.labels.gpio = pin;
        self
    }

    /// Set the scale factor for the `*_mult` fields.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.labels.multiplier = multiplier;
        self
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; snapshots will be delivered to all of
    /// them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the tick period. Defaults to 1 second if not specified.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Build the meter.
    pub fn build(self) -> PulseMeter {
        PulseMeter {
            tally: Arc::new(Tally::default()),
            labels: self.labels,
            publisher: Publisher::new(self.outputs),
            interval: self.interval.unwrap_or(DEFAULT_INTERVAL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pull::LatestSnapshot;

    #[test]
    fn test_meter_new() {
        let meter = PulseMeter::new();
        assert_eq!(meter.interval(), Duration::from_secs(1));
        assert_eq!(meter.labels().multiplier, 1.0);
        assert!(meter.publisher.is_empty());
    }

    #[test]
    fn test_builder() {
        let meter = PulseMeter::builder()
            .uuid("abc")
            .gpio(11)
            .multiplier(2.5)
            .interval(Duration::from_millis(500))
            .output(Output::pull(LatestSnapshot::new()))
            .output(Output::channel(1).0)
            .build();

        assert_eq!(meter.interval(), Duration::from_millis(500));
        assert_eq!(meter.labels().uuid, "abc");
        assert_eq!(meter.labels().gpio, 11);
        assert_eq!(meter.labels().multiplier, 2.5);
        assert_eq!(meter.publisher.len(), 2);
    }

    #[test]
    fn handles_and_aggregator_share_the_tally() {
        let meter = PulseMeter::builder().uuid("dev").gpio(37).build();
        let handle = meter.handle();
        let mut aggregator = meter.aggregator();

        handle.record_pulse();
        handle.record_pulse();

        let snapshot = aggregator.on_tick();
        assert_eq!(snapshot.pulse_per_second, 2);
        assert_eq!(snapshot.pulse_count, 2);
        assert_eq!(snapshot.uuid, "dev");
    }

    #[tokio::test(start_paused = true)]
    async fn started_meter_publishes_every_interval() {
        let (output, mut rx) = Output::channel(16);
        let meter = PulseMeter::builder().multiplier(2.0).output(output).build();
        let handle = meter.handle();
        let ticker = meter.start();

        for _ in 0..5 {
            handle.record_pulse();
        }
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let first = rx.try_recv().unwrap();
        assert_eq!(first.pulse_per_second, 5);
        assert_eq!(first.pps_mult, 10.0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = rx.try_recv().unwrap();
        assert_eq!(second.pulse_per_second, 0);
        assert_eq!(second.pulse_per_minute, 5);
        assert_eq!(second.pulse_count, 5);

        ticker.cancel();
        ticker.join().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pull_output_sees_each_tick() {
        let latest = LatestSnapshot::new();
        let meter = PulseMeter::builder()
            .output(Output::pull(latest.clone()))
            .build();
        let handle = meter.handle();
        let ticker = meter.start();

        assert!(latest.get().is_none());

        handle.record_pulse();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(latest.get().unwrap().pulse_count, 1);

        handle.reset();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(latest.get().unwrap().pulse_count, 0);

        ticker.cancel();
        ticker.join().await;
    }
}
