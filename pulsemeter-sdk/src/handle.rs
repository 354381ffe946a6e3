//! Pulse handle for recording edges from any thread.

use std::sync::Arc;

use crate::state::Tally;

/// A cloneable handle onto the shared [`Tally`].
///
/// This is what the inputs hold. The edge loop calls
/// [`record_pulse`](Self::record_pulse) and the reset callback calls
/// [`reset`](Self::reset); both may run on different threads.
///
/// # Example
///
/// ```rust
/// use pulsemeter_sdk::PulseMeter;
///
/// let meter = PulseMeter::new();
/// let handle = meter.handle();
///
/// handle.record_pulse();
/// handle.record_pulse();
/// assert_eq!(handle.cumulative(), 2);
///
/// handle.reset();
/// assert_eq!(handle.cumulative(), 0);
/// ```
#[derive(Clone)]
pub struct PulseHandle {
    pub(crate) tally: Arc<Tally>,
}

impl PulseHandle {
    /// Create a handle over an existing tally.
    pub fn new(tally: Arc<Tally>) -> Self {
        Self { tally }
    }

    /// Record one pulse.
    pub fn record_pulse(&self) {
        self.tally.record_pulse();
    }

    /// Zero the cumulative count.
    pub fn reset(&self) {
        self.tally.reset_cumulative();
    }

    /// Pulses since startup or the last reset.
    pub fn cumulative(&self) -> u64 {
        self.tally.cumulative()
    }

    /// Pulses recorded since the last tick.
    pub fn pending(&self) -> u64 {
        self.tally.current()
    }
}

impl std::fmt::Debug for PulseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseHandle")
            .field("pending", &self.pending())
            .field("cumulative", &self.cumulative())
            .finish()
    }
}
