//! # pulsemeter-sdk
//!
//! Pulse counting and sliding-window aggregation engine.
//!
//! Edges from an input line are counted into a shared tally. Once per
//! interval the tally is drained into a one-hour window of per-second
//! samples and a [`Snapshot`] is built with the per-second, per-minute and
//! per-hour sums, scaled by a multiplier. Snapshots go to a broker topic
//! (push), to a small TCP responder (pull), or both.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pulsemeter_sdk::sim::SimulatedLine;
//! use pulsemeter_sdk::{EdgeCounter, LatestSnapshot, Output, PullServer, PulseMeter, Shutdown};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let shutdown = Shutdown::new();
//!     let latest = LatestSnapshot::new();
//!
//!     let meter = PulseMeter::builder()
//!         .uuid("device-1")
//!         .gpio(37)
//!         .output(Output::pull(latest.clone()))
//!         .build();
//!
//!     // Count edges on a blocking thread
//!     let counter = EdgeCounter::new(meter.handle(), Duration::from_millis(200));
//!     let mut line = SimulatedLine::new();
//!     let token = shutdown.token();
//!     std::thread::spawn(move || counter.run(&mut line, &token));
//!
//!     // Serve the latest snapshot and start ticking
//!     let server = PullServer::bind("0.0.0.0:7575").await.unwrap();
//!     tokio::spawn(server.serve(latest, shutdown.token()));
//!     let ticker = meter.start();
//!
//!     tokio::signal::ctrl_c().await.unwrap();
//!     shutdown.trigger();
//!     ticker.cancel();
//!     ticker.join().await;
//! }
//! ```
//!
//! ## Features
//!
//! - `mqtt` (default): MQTT push sink via `rumqttc`

mod aggregator;
mod edge;
mod error;
mod handle;
mod meter;
mod output;
mod pull;
mod shutdown;
mod sink;
mod state;
mod ticker;
mod window;

pub mod sim;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use aggregator::{Aggregator, SnapshotLabels};
pub use edge::{
    attach_reset, EdgeCounter, PulseInput, ResetCallback, ResetInput, EDGE_POLL, RESET_DEBOUNCE,
};
pub use error::{GpioError, SinkError};
pub use handle::PulseHandle;
pub use meter::{MeterBuilder, PulseMeter, DEFAULT_INTERVAL};
pub use output::{Broker, Output, Publisher};
pub use pull::{format_response, LatestSnapshot, PullServer};
pub use shutdown::{Shutdown, ShutdownToken};
pub use sink::{BrokerStatus, SinkPlan};
pub use state::Tally;
pub use ticker::Ticker;
pub use window::{SlidingWindow, HOUR_SAMPLES, MINUTE_SAMPLES};

#[cfg(feature = "mqtt")]
pub use mqtt::MqttBroker;

// Re-export types for convenience
pub use pulsemeter_types::{Snapshot, PULL_PORT, TOPIC};
