//! Core environment context trait for ATC actors.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The central interface for environment interaction.
///
/// Actors never call the runtime directly; they ask the context for the
/// clock, for sleeps and for new tasks. This keeps tick loops testable under
/// a paused clock.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `tokio::spawn`
#[async_trait]
pub trait AtcContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Suspends the calling task for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Spawns a named background task and returns its join handle.
    ///
    /// The handle must be joined by the owning actor's `stop()`.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;
}
