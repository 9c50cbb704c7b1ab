//! Typed rendezvous channel with request/reply and one-way push.
//!
//! A channel carries envelopes. Each envelope holds the message and a reply
//! slot, so the sender stays parked until the receiver either replies
//! (request) or accepts (push, `R = ()`). Dropping an envelope without
//! replying wakes the sender with `ReplyDropped`.
//!
//! ```text
//! Sender::request(q) ──► [ capacity 1 ] ──► Receiver::recv() -> Envelope
//!        ▲                                        │
//!        └──────────── oneshot reply ◄────────────┘
//! ```

use crate::error::EnvError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Creates a named rendezvous channel.
///
/// The name is only used in error messages and logs.
pub fn rendezvous<Q, R>(name: &str) -> (Sender<Q, R>, Receiver<Q, R>) {
    let (tx, rx) = mpsc::channel(1);
    let name: Arc<str> = Arc::from(name);
    (
        Sender {
            name: Arc::clone(&name),
            tx,
        },
        Receiver { name, rx },
    )
}

/// A message paired with the slot its reply goes into.
pub struct Envelope<Q, R> {
    message: Q,
    reply: oneshot::Sender<R>,
}

impl<Q, R> Envelope<Q, R> {
    /// Borrows the carried message.
    pub fn message(&self) -> &Q {
        &self.message
    }

    /// Answers the request.
    ///
    /// Fails when the requester stopped waiting (timed out or was dropped);
    /// the reply is discarded in that case.
    pub fn reply(self, response: R) -> Result<(), EnvError> {
        self.reply
            .send(response)
            .map_err(|_| EnvError::dropped("requester gone"))
    }

    /// Splits the envelope so the message can be consumed before replying.
    pub fn into_parts(self) -> (Q, Responder<R>) {
        (self.message, Responder(self.reply))
    }
}

impl<Q> Envelope<Q, ()> {
    /// Acknowledges a one-way push and hands back the message.
    pub fn accept(self) -> Q {
        let _ = self.reply.send(());
        self.message
    }
}

/// The reply half of a split envelope.
pub struct Responder<R>(oneshot::Sender<R>);

impl<R> Responder<R> {
    /// Sends the reply. See [`Envelope::reply`].
    pub fn respond(self, response: R) -> Result<(), EnvError> {
        self.0
            .send(response)
            .map_err(|_| EnvError::dropped("requester gone"))
    }
}

/// Sending half of a rendezvous channel. Cheap to clone.
pub struct Sender<Q, R> {
    name: Arc<str>,
    tx: mpsc::Sender<Envelope<Q, R>>,
}

impl<Q, R> Clone for Sender<Q, R> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            tx: self.tx.clone(),
        }
    }
}

impl<Q, R> fmt::Debug for Sender<Q, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("name", &self.name)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<Q, R> Sender<Q, R> {
    /// Sends a request and waits for the reply.
    ///
    /// # Returns
    /// * `Ok(reply)` - The receiver answered
    /// * `Err(EnvError::ChannelClosed)` - The receiver is gone
    /// * `Err(EnvError::ReplyDropped)` - The receiver discarded the request
    pub async fn request(&self, message: Q) -> Result<R, EnvError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            reply: reply_tx,
        };

        self.tx
            .send(envelope)
            .await
            .map_err(|_| EnvError::closed(self.name.as_ref()))?;

        reply_rx
            .await
            .map_err(|_| EnvError::dropped(self.name.as_ref()))
    }

    /// Like [`Sender::request`], but gives up after `timeout`.
    ///
    /// A request that times out while still queued is answered into the
    /// void; the late reply is discarded.
    pub async fn request_timeout(&self, message: Q, timeout: Duration) -> Result<R, EnvError> {
        match tokio::time::timeout(timeout, self.request(message)).await {
            Ok(result) => result,
            Err(_) => Err(EnvError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Returns true once the receiving half has been dropped or closed.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns true when both senders feed the same receiver.
    pub fn same_channel(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }

    /// Returns the channel name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<Q> Sender<Q, ()> {
    /// One-way send: waits until the receiver has accepted the message.
    pub async fn push(&self, message: Q) -> Result<(), EnvError> {
        self.request(message).await
    }

    /// One-way send bounded by `timeout`.
    pub async fn push_timeout(&self, message: Q, timeout: Duration) -> Result<(), EnvError> {
        self.request_timeout(message, timeout).await
    }
}

/// Receiving half of a rendezvous channel.
pub struct Receiver<Q, R> {
    name: Arc<str>,
    rx: mpsc::Receiver<Envelope<Q, R>>,
}

impl<Q, R> Receiver<Q, R> {
    /// Waits for the next envelope.
    ///
    /// Returns `ChannelClosed` once every sender is gone, or after
    /// [`Receiver::close`] once the buffered envelope has been drained.
    pub async fn recv(&mut self) -> Result<Envelope<Q, R>, EnvError> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| EnvError::closed(self.name.as_ref()))
    }

    /// Refuses further sends. Parked and future senders fail with `ChannelClosed`.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Returns the channel name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_reply() {
        let (link, mut inbox) = rendezvous::<u32, u32>("double");

        let server = tokio::spawn(async move {
            let envelope = inbox.recv().await.unwrap();
            let value = *envelope.message();
            envelope.reply(value * 2).unwrap();
        });

        assert_eq!(link.request(21).await.unwrap(), 42);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_push_waits_for_accept() {
        let (link, mut inbox) = rendezvous::<&'static str, ()>("push");

        let server = tokio::spawn(async move {
            let envelope = inbox.recv().await.unwrap();
            envelope.accept()
        });

        link.push("hello").await.unwrap();
        assert_eq!(server.await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver_fails() {
        let (link, inbox) = rendezvous::<u32, u32>("gone");
        drop(inbox);

        assert!(link.is_closed());
        let err = link.request(1).await.unwrap_err();
        assert!(matches!(err, EnvError::ChannelClosed(_)));
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_dropped_envelope_reports_reply_dropped() {
        let (link, mut inbox) = rendezvous::<u32, u32>("discard");

        let server = tokio::spawn(async move {
            let envelope = inbox.recv().await.unwrap();
            drop(envelope);
            inbox
        });

        let err = link.request(1).await.unwrap_err();
        assert!(matches!(err, EnvError::ReplyDropped(_)));
        drop(server.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_without_receiver_activity() {
        let (link, _inbox) = rendezvous::<u32, u32>("silent");

        let err = link
            .request_timeout(1, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, EnvError::Timeout(50));
    }

    #[tokio::test]
    async fn test_late_reply_is_discarded() {
        let (link, mut inbox) = rendezvous::<u32, u32>("late");

        // Queue a request that gives up before anyone reads it.
        let err = link
            .request_timeout(5, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvError::Timeout(_)));

        let envelope = inbox.recv().await.unwrap();
        assert_eq!(*envelope.message(), 5);
        assert!(envelope.reply(10).is_err());
    }

    #[tokio::test]
    async fn test_close_rejects_new_senders() {
        let (link, mut inbox) = rendezvous::<u32, ()>("closing");
        inbox.close();

        assert!(link.push(1).await.is_err());
        assert!(inbox.recv().await.is_err());
    }

    #[test]
    fn test_clone_shares_channel() {
        let (a, _inbox) = rendezvous::<u32, ()>("shared");
        let b = a.clone();
        let (c, _other) = rendezvous::<u32, ()>("other");

        assert!(a.same_channel(&b));
        assert!(!a.same_channel(&c));
        assert_eq!(b.name(), "shared");
    }
}
