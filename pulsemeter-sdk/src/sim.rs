//! In-memory input lines for tests and hosts without GPIO.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::edge::{PulseInput, ResetCallback, ResetInput, EDGE_POLL};
use crate::error::GpioError;
use crate::shutdown::ShutdownToken;

#[derive(Debug, Default)]
struct LineState {
    active: bool,
    /// Edges latched but not yet consumed by a wait.
    pending: u64,
    fault: Option<String>,
}

/// A pulse line driven from code.
///
/// Edges are latched like a kernel GPIO event queue: every call to
/// [`pulse`](Self::pulse) or [`rise`](Self::rise) is returned by exactly one
/// [`wait_for_edge`](PulseInput::wait_for_edge). Clones share the line.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLine {
    inner: Arc<(Mutex<LineState>, Condvar)>,
}

impl SimulatedLine {
    /// A line at the inactive level with no pending edges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch an edge and leave the line inactive, like a pulse much shorter
    /// than any debounce window. A debounced counter rejects these.
    pub fn pulse(&self) {
        self.update(|s| s.pending += 1);
    }

    /// Drive the line active, latching an edge if it was inactive.
    pub fn rise(&self) {
        self.update(|s| {
            if !s.active {
                s.active = true;
                s.pending += 1;
            }
        });
    }

    /// Drive the line inactive.
    pub fn fall(&self) {
        self.update(|s| s.active = false);
    }

    /// Make every later wait or sample fail with `reason`.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.update(|s| s.fault = Some(reason));
    }

    fn update(&self, f: impl FnOnce(&mut LineState)) {
        let (lock, cvar) = &*self.inner;
        f(&mut lock.lock());
        cvar.notify_all();
    }
}

impl PulseInput for SimulatedLine {
    fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool, GpioError> {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut state = lock.lock();

        loop {
            if let Some(reason) = &state.fault {
                return Err(GpioError::Line(reason.clone()));
            }
            if state.pending > 0 {
                state.pending -= 1;
                return Ok(true);
            }
            if cvar.wait_until(&mut state, deadline).timed_out() {
                return Ok(false);
            }
        }
    }

    fn is_active(&mut self) -> Result<bool, GpioError> {
        let state = self.inner.0.lock();
        match &state.fault {
            Some(reason) => Err(GpioError::Line(reason.clone())),
            None => Ok(state.active),
        }
    }

    fn clear_pending(&mut self) -> Result<(), GpioError> {
        let mut state = self.inner.0.lock();
        match &state.fault {
            Some(reason) => Err(GpioError::Line(reason.clone())),
            None => {
                state.pending = 0;
                Ok(())
            }
        }
    }
}

/// A reset button pressed from code.
///
/// [`press`](Self::press) runs the registered callback on the caller's
/// thread. Clones share the callback.
#[derive(Clone, Default)]
pub struct SimulatedButton {
    callback: Arc<Mutex<Option<ResetCallback>>>,
}

impl SimulatedButton {
    /// A button with no callback attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire one falling edge. Does nothing before a callback is attached.
    pub fn press(&self) {
        if let Some(callback) = self.callback.lock().as_mut() {
            callback();
        }
    }
}

impl ResetInput for SimulatedButton {
    fn on_falling_edge(&mut self, callback: ResetCallback) -> Result<(), GpioError> {
        *self.callback.lock() = Some(callback);
        Ok(())
    }
}

impl std::fmt::Debug for SimulatedButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedButton")
            .field("attached", &self.callback.lock().is_some())
            .finish()
    }
}

/// Pulse `line` at a steady `hz` on a background thread until `shutdown`.
///
/// Each pulse holds the line active for half a period, so it survives a
/// debounce shorter than that. Rising edges are scheduled on absolute
/// deadlines so the rate does not drift. A rate that is not a positive
/// finite number spawns a thread that only waits for shutdown.
pub fn spawn_generator(line: SimulatedLine, hz: f64, shutdown: ShutdownToken) -> JoinHandle<()> {
    let period = (hz > 0.0 && hz.is_finite())
        .then(|| Duration::try_from_secs_f64(1.0 / hz).ok())
        .flatten();

    std::thread::spawn(move || {
        let mut next = Instant::now();
        let mut fall_at: Option<Instant> = None;

        while !shutdown.is_cancelled() {
            let Some(period) = period else {
                std::thread::sleep(EDGE_POLL);
                continue;
            };

            let now = Instant::now();
            // Fall before rising so a late schedule still produces an edge
            if fall_at.is_some_and(|at| now >= at) {
                line.fall();
                fall_at = None;
                continue;
            }
            if now >= next {
                line.rise();
                fall_at = Some(next + period / 2);
                next += period;
                continue;
            }

            let wake = fall_at.map_or(next, |at| at.min(next));
            std::thread::sleep((wake - now).min(EDGE_POLL));
        }
        line.fall();
    })
}
