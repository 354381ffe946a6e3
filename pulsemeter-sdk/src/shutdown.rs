//! Cooperative cancellation shared by every blocking wait.

use tokio::sync::watch;

/// Owner side of a cancellation event.
///
/// Hand out [`ShutdownToken`]s to anything that blocks; call
/// [`trigger`](Self::trigger) once to release all of them.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create an untriggered shutdown.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Get a token observing this shutdown.
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Signal every token. Later calls are no-ops.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// True once triggered.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a [`Shutdown`].
///
/// Usable from blocking threads through [`is_cancelled`](Self::is_cancelled)
/// and from async code through [`cancelled`](Self::cancelled). A token whose
/// [`Shutdown`] has been dropped counts as cancelled.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Non-blocking check.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once the shutdown is triggered or its owner is dropped.
    pub async fn cancelled(&mut self) {
        // wait_for errors only when the sender is gone, which also means stop
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn token_starts_uncancelled() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();
        assert!(!token.is_cancelled());
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn trigger_is_seen_by_every_token() {
        let shutdown = Shutdown::new();
        let a = shutdown.token();
        let b = a.clone();

        shutdown.trigger();
        shutdown.trigger();

        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn dropped_owner_cancels_tokens() {
        let shutdown = Shutdown::new();
        let token = shutdown.token();
        drop(shutdown);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let mut token = shutdown.token();

        let waiter = tokio::spawn(async move { token.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("token should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_triggered() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let mut token = shutdown.token();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already triggered");
    }
}
