//! Production implementation of AtcContext using Tokio.

use crate::AtcContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, Instrument};

/// Production context backed by the Tokio runtime.
///
/// Time comes from `tokio::time`, so a paused test runtime drives every
/// actor deterministically.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across actors.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AtcContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!("spawning task {}", name);
        let span = tracing::debug_span!("actor_task", task = %name);
        tokio::spawn(future.instrument(span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_tokio_context_spawn_joins() {
        let ctx = TokioContext::new();
        let (tx, rx) = tokio::sync::oneshot::channel();

        let handle = ctx.spawn("probe", async move {
            let _ = tx.send(7u32);
        });

        handle.await.unwrap();
        assert_eq!(rx.await.unwrap(), 7);
    }
}
