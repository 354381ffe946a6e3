//! # pulsemeter
//!
//! Daemon wiring for the pulse meter: settings loading and the GPIO
//! platform. The counting and aggregation engine lives in
//! [`pulsemeter_sdk`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  edges   ┌───────┐  tick   ┌────────────┐  Snapshot  ┌───────────┐
//! │ gpio     │─────────▶│ Tally │────────▶│ Aggregator │───────────▶│ Publisher │
//! │ (lines)  │  reset   │       │         │ (window)   │            │           │
//! └──────────┘─────────▶└───────┘         └────────────┘            └─────┬─────┘
//!                                                                         │
//!                                                   MQTT `pulse_data` ◀───┤
//!                                                   TCP :7575 (pull)  ◀───┘
//! ```
//!
//! - **[`settings`]**: file, environment and CLI layering with lenient parsing
//! - **[`gpio`]**: physical-pin mapping, Raspberry Pi lines (feature `rpi`)
//!   and simulated lines
//! - **[`daemon`]**: startup wiring and ordered shutdown
//!
//! ## Usage
//!
//! ```bash
//! # On a Pi, pushing to a broker
//! MQTT_ADDRESS=mqtt pulsemeter
//!
//! # Anywhere, with a synthetic 2 Hz pulse train on the pull port
//! pulsemeter --simulate 2
//! curl http://localhost:7575/
//! ```
//!
//! ### As a library
//!
//! ```
//! use pulsemeter::settings::Settings;
//! use pulsemeter::gpio::{open, LineSource};
//! use pulsemeter_sdk::Shutdown;
//!
//! let settings = Settings::default();
//! let shutdown = Shutdown::new();
//! let lines = open(&settings, LineSource::Simulated(10.0), shutdown.token()).unwrap();
//! shutdown.trigger();
//! # lines.generator.map(|g| g.join());
//! ```

pub mod daemon;
pub mod gpio;
pub mod settings;

pub use daemon::Daemon;
pub use gpio::{board_to_bcm, LineSource, Lines};
pub use settings::{Overrides, Polarity, Settings};
