//! Shutdown coordination for the relay.
//!
//! A single `watch` flag carries the shutdown request. Subscribers created
//! after the trigger still see it, and dropping the coordinator releases
//! every waiter the same way a trigger does.

use std::time::Duration;

use axum_server::Handle;
use tokio::sync::watch;

/// How long in-flight relays may run after shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Owns the shutdown flag and the drain window handed to subscribers.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
    grace: Duration,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::with_grace(SHUTDOWN_GRACE)
    }

    pub fn with_grace(grace: Duration) -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx, grace }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
            grace: self.grace,
        }
    }

    /// Request shutdown. Idempotent, and harmless with no subscribers.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
    grace: Duration,
}

impl ShutdownSignal {
    /// Resolves once shutdown is requested or the coordinator is gone.
    pub async fn triggered(&mut self) {
        // An error means the sender was dropped, which also ends the wait.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Wait for shutdown, then stop accepting on `handle` and give open
    /// connections the grace window before they are closed.
    pub async fn drain(mut self, handle: Handle) {
        self.triggered().await;
        tracing::info!(grace_secs = self.grace.as_secs(), "Shutting down server");
        handle.graceful_shutdown(Some(self.grace));
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = a.clone();

        shutdown.trigger();
        assert!(timeout(WAIT, a.triggered()).await.is_ok());
        assert!(timeout(WAIT, b.triggered()).await.is_ok());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn late_subscriber_sees_earlier_trigger() {
        let shutdown = Shutdown::default();
        shutdown.trigger();
        let mut late = shutdown.subscribe();
        assert!(timeout(WAIT, late.triggered()).await.is_ok());
    }

    #[tokio::test]
    async fn untriggered_signal_keeps_waiting() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        assert!(timeout(Duration::from_millis(50), signal.triggered()).await.is_err());
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn dropping_the_coordinator_releases_waiters() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        drop(shutdown);
        assert!(timeout(WAIT, signal.triggered()).await.is_ok());
    }

    #[tokio::test]
    async fn drain_returns_after_trigger() {
        let shutdown = Shutdown::with_grace(Duration::from_millis(10));
        let signal = shutdown.subscribe();
        assert_eq!(signal.grace(), Duration::from_millis(10));

        let task = tokio::spawn(signal.drain(Handle::new()));
        shutdown.trigger();
        assert!(matches!(timeout(WAIT, task).await, Ok(Ok(()))));
    }

    #[test]
    fn trigger_without_subscribers_is_harmless() {
        let shutdown = Shutdown::default();
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }
}
