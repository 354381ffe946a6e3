//! Input line abstractions and the blocking edge-counting loop.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::GpioError;
use crate::handle::PulseHandle;
use crate::shutdown::ShutdownToken;

/// How long a single edge wait may block before shutdown is re-checked.
pub const EDGE_POLL: Duration = Duration::from_millis(100);

/// Debounce window the platform applies to the reset line.
pub const RESET_DEBOUNCE: Duration = Duration::from_millis(200);

/// A pulse input line.
///
/// Implementations latch edges in the platform (kernel event queue,
/// interrupt flag, ...) so an edge that arrives between two waits is not
/// lost.
pub trait PulseInput: Send {
    /// Block until the line transitions to its active level or `timeout`
    /// elapses. Returns `true` if an edge was observed.
    fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool, GpioError>;

    /// Sample the line now. Returns `true` at the active level.
    fn is_active(&mut self) -> Result<bool, GpioError>;

    /// Discard edges latched since the last wait.
    fn clear_pending(&mut self) -> Result<(), GpioError> {
        while self.wait_for_edge(Duration::ZERO)? {}
        Ok(())
    }
}

/// Callback invoked from the platform's interrupt thread on a reset edge.
pub type ResetCallback = Box<dyn FnMut() + Send + 'static>;

/// A reset input line that calls back on each debounced falling edge.
pub trait ResetInput: Send {
    /// Register the callback. The platform owns debouncing
    /// ([`RESET_DEBOUNCE`]) and the thread the callback runs on.
    fn on_falling_edge(&mut self, callback: ResetCallback) -> Result<(), GpioError>;
}

/// Wire a reset input to zero the cumulative count of `handle`.
pub fn attach_reset<R: ResetInput + ?Sized>(
    input: &mut R,
    handle: PulseHandle,
) -> Result<(), GpioError> {
    input.on_falling_edge(Box::new(move || {
        info!(previous = handle.cumulative(), "Pulse count reset");
        handle.reset();
    }))
}

/// Counts edges from a [`PulseInput`] into a [`PulseHandle`].
///
/// With a non-zero debounce, each edge is followed by a sleep of that length
/// and the line is sampled again; the pulse only counts if the line is
/// still active. Edges latched during the sleep are discarded after the
/// re-check, so a bouncing contact counts at most once per window.
#[derive(Debug, Clone)]
pub struct EdgeCounter {
    handle: PulseHandle,
    debounce: Duration,
    poll: Duration,
}

impl EdgeCounter {
    /// Create a counter. A zero `debounce` disables the re-check.
    pub fn new(handle: PulseHandle, debounce: Duration) -> Self {
        Self {
            handle,
            debounce,
            poll: EDGE_POLL,
        }
    }

    /// Override how often a blocked wait re-checks for shutdown.
    pub fn poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Run until `shutdown` fires. Blocks the calling thread.
    ///
    /// Line errors end the loop and are returned to the caller.
    pub fn run<I: PulseInput + ?Sized>(
        &self,
        input: &mut I,
        shutdown: &ShutdownToken,
    ) -> Result<(), GpioError> {
        while !shutdown.is_cancelled() {
            if !input.wait_for_edge(self.poll)? {
                continue;
            }

            if self.debounce.is_zero() {
                self.handle.record_pulse();
                continue;
            }

            std::thread::sleep(self.debounce);
            if input.is_active()? {
                self.handle.record_pulse();
            } else {
                debug!("Edge rejected by debounce");
            }
            input.clear_pending()?;
        }

        debug!("Edge loop stopped");
        Ok(())
    }
}
