//! # pulsemeter-types
//!
//! Wire types for pulsemeter. A [`Snapshot`] is the aggregated view of a
//! pulse input produced once per tick; the same object is published to the
//! broker topic [`TOPIC`] and served by the pull sink on [`PULL_PORT`].
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use pulsemeter_types::Snapshot;
//!
//! let snapshot = Snapshot::builder()
//!     .uuid("4f2a9c")
//!     .gpio(37)
//!     .per_second(5)
//!     .per_minute(120)
//!     .per_hour(7200)
//!     .pulse_count(10_000)
//!     .multiplier(0.5)
//!     .build();
//!
//! assert_eq!(snapshot.pps_mult, 2.5);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod snapshot;

pub use snapshot::*;

/// Broker topic every snapshot is published to.
pub const TOPIC: &str = "pulse_data";

/// TCP port the pull sink listens on by default.
pub const PULL_PORT: u16 = 7575;
