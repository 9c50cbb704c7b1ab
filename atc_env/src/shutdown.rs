//! Shutdown signal shared by an actor's loops.

use tokio::sync::watch;

/// Factory for a trigger/listener pair.
pub struct Shutdown;

impl Shutdown {
    /// Creates a fresh, unraised signal.
    pub fn new() -> (ShutdownTrigger, ShutdownListener) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, ShutdownListener { rx })
    }
}

/// Owner side: raising it wakes every listener.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Raises the signal. Raising twice is harmless.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once the signal has been raised.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Creates another listener for a task spawned later.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

/// Task side: select on [`ShutdownListener::cancelled`] next to every receive.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolves once the signal is raised or the trigger is dropped.
    pub async fn cancelled(&mut self) {
        // A dropped trigger counts as shutdown.
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    /// Non-blocking check.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_listener() {
        let (trigger, mut listener) = Shutdown::new();
        assert!(!listener.is_cancelled());

        let waiter = tokio::spawn(async move {
            listener.cancelled().await;
            true
        });

        trigger.trigger();
        assert!(trigger.is_triggered());
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_trigger_counts_as_shutdown() {
        let (trigger, mut listener) = Shutdown::new();
        drop(trigger);

        tokio::time::timeout(Duration::from_secs(1), listener.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_late_listener_sees_raised_signal() {
        let (trigger, _listener) = Shutdown::new();
        trigger.trigger();

        let mut late = trigger.listener();
        assert!(late.is_cancelled());
        late.cancelled().await;
    }
}
