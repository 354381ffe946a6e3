//! Drift-corrected periodic ticker.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::shutdown::Shutdown;

/// Fires a callback once per period until cancelled.
///
/// Deadlines are absolute: the next fire time advances by exactly one
/// period after each tick, so time spent in the callback never accumulates
/// as drift. A callback that overruns its period makes the following ticks
/// fire back-to-back until the schedule has caught up; no tick is skipped.
///
/// Dropping the `Ticker` stops it as well.
///
/// # Example
///
/// ```rust,no_run
/// use pulsemeter_sdk::Ticker;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let ticker = Ticker::start(Duration::from_secs(1), || async {
///         println!("tick");
///     });
///
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     ticker.cancel();
///     ticker.join().await;
/// }
/// ```
pub struct Ticker {
    stop: Shutdown,
    task: JoinHandle<()>,
}

impl Ticker {
    /// Spawn the ticking task. The first tick fires one `period` from now.
    pub fn start<F, Fut>(period: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let stop = Shutdown::new();
        let mut token = stop.token();

        let task = tokio::spawn(async move {
            let mut next_fire = Instant::now() + period;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep_until(next_fire) => {}
                }

                callback().await;
                next_fire += period;
            }
        });

        Self { stop, task }
    }

    /// Stop ticking. A callback already running is allowed to finish.
    pub fn cancel(&self) {
        self.stop.trigger();
    }

    /// Wait for the ticking task to exit.
    pub async fn join(self) {
        let Self { stop, task } = self;
        let _ = task.await;
        drop(stop);
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("cancelled", &self.stop.is_triggered())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
