//! Output backends for delivering snapshots.

use std::sync::Arc;

use pulsemeter_types::{Snapshot, TOPIC};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::pull::LatestSnapshot;

/// A message broker the push sink publishes through.
///
/// Publishing is fire-and-forget: implementations enqueue the payload and
/// return without waiting for delivery.
pub trait Broker: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Publish one payload to `topic`.
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), SinkError>;

    /// End the session. Publishing afterwards may fail.
    fn close(&self) {}
}

/// Output destination for snapshots.
///
/// Configure where the meter delivers each tick's snapshot.
pub enum Output {
    /// Publish snapshots as JSON to the broker topic [`TOPIC`].
    Broker(Arc<dyn Broker>),

    /// Replace the snapshot served by the pull sink.
    Pull(LatestSnapshot),

    /// Send snapshots through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    Channel(mpsc::Sender<Snapshot>),
}

impl Output {
    /// Create a broker output.
    pub fn broker(broker: impl Broker + 'static) -> Self {
        Output::Broker(Arc::new(broker))
    }

    /// Create a pull output feeding `latest`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pulsemeter_sdk::{LatestSnapshot, Output};
    ///
    /// let latest = LatestSnapshot::new();
    /// let output = Output::pull(latest.clone());
    /// ```
    pub fn pull(latest: LatestSnapshot) -> Self {
        Output::Pull(latest)
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// The channel is best effort: a snapshot is dropped when the buffer is
    /// full.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pulsemeter_sdk::Output;
    ///
    /// let (output, mut rx) = Output::channel(16);
    ///
    /// // Later, receive snapshots
    /// // while let Some(snapshot) = rx.recv().await {
    /// //     println!("{} pulses", snapshot.pulse_count);
    /// // }
    /// ```
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Snapshot>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Sink name for logging.
    pub fn name(&self) -> &str {
        match self {
            Output::Broker(broker) => broker.name(),
            Output::Pull(_) => "pull",
            Output::Channel(_) => "channel",
        }
    }

    /// Deliver a snapshot to this output.
    pub(crate) fn emit(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        match self {
            Output::Broker(broker) => {
                let payload = serde_json::to_vec(snapshot)?;
                broker.publish(TOPIC, &payload)?;
            }
            Output::Pull(latest) => latest.store(snapshot.clone()),
            Output::Channel(tx) => {
                // Best effort send (don't block the tick if the channel is full)
                let _ = tx.try_send(snapshot.clone());
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Broker(broker) => f.debug_tuple("Broker").field(&broker.name()).finish(),
            Output::Pull(latest) => f.debug_tuple("Pull").field(latest).finish(),
            Output::Channel(_) => f.debug_tuple("Channel").finish(),
        }
    }
}

/// Fans a snapshot out to every configured output.
///
/// A failing output is logged and skipped; it never stops delivery to the
/// others or the next tick.
#[derive(Debug, Default)]
pub struct Publisher {
    outputs: Vec<Output>,
}

impl Publisher {
    /// Create a publisher over `outputs`.
    pub fn new(outputs: Vec<Output>) -> Self {
        Self { outputs }
    }

    /// Deliver `snapshot` to every output.
    pub fn publish(&self, snapshot: &Snapshot) {
        debug!(
            pps = snapshot.pulse_per_second,
            ppm = snapshot.pulse_per_minute,
            pph = snapshot.pulse_per_hour,
            count = snapshot.pulse_count,
            "Snapshot"
        );

        for output in &self.outputs {
            if let Err(e) = output.emit(snapshot) {
                warn!(sink = output.name(), error = %e, "Dropping snapshot for this tick");
            }
        }
    }

    /// Number of outputs.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// True when snapshots go nowhere.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
