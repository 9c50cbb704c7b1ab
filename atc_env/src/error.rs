//! Error types for the ATC environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// The receiving side of a channel is gone (actor stopped or never started)
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// The receiver accepted the message but dropped it without replying
    #[error("Reply dropped: {0}")]
    ReplyDropped(String),

    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a channel-closed error.
    pub fn closed(channel: impl Into<String>) -> Self {
        Self::ChannelClosed(channel.into())
    }

    /// Creates a reply-dropped error.
    pub fn dropped(channel: impl Into<String>) -> Self {
        Self::ReplyDropped(channel.into())
    }

    /// Returns true for errors caused by the peer having shut down.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ChannelClosed(_) | Self::ReplyDropped(_))
    }
}
