//! ATC Environment Abstraction Layer
//!
//! This crate provides the plumbing every actor in the ATC loop is built on:
//! - Time and task spawning (`AtcContext`, `TokioContext`)
//! - A typed rendezvous channel with request/reply and one-way push
//! - A shutdown signal that unblocks parked receive loops
//!
//! # Core Concept: Rendezvous Messaging
//!
//! Actors never share state. They exchange messages over a bounded channel
//! where the sender waits until the receiver has accepted (push) or replied
//! to (request) the message:
//!
//! ```text
//! Radar                      Channel                    Aircraft
//!   |                           |                          |
//!   |-- request(StateQuery) --->|                          |
//!   |        (parked)           |-- recv() --------------->|
//!   |                           |<------ reply(StateReply)-|
//!   |<-- Ok(StateReply) --------|                          |
//! ```
//!
//! # Example
//!
//! ```ignore
//! use atc_env::{rendezvous, Shutdown};
//!
//! let (link, mut inbox) = rendezvous::<Ping, Pong>("ping");
//! let (trigger, mut listener) = Shutdown::new();
//!
//! loop {
//!     tokio::select! {
//!         _ = listener.cancelled() => break,
//!         envelope = inbox.recv() => { /* answer */ }
//!     }
//! }
//! ```

mod context;
mod channel;
mod error;
mod shutdown;
mod tokio_impl;

pub use context::AtcContext;
pub use channel::{rendezvous, Envelope, Receiver, Responder, Sender};
pub use error::EnvError;
pub use shutdown::{Shutdown, ShutdownListener, ShutdownTrigger};
pub use tokio_impl::TokioContext;
