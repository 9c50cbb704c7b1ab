//! The aircraft actor - owns one aircraft's kinematic state.
//!
//! Each running aircraft has three tasks:
//!
//! ```text
//! ┌──────────────────────── Aircraft ────────────────────────┐
//! │   motion loop        query responder    correction rx    │
//! │  p += v * dt/tick   StateQuery→Reply   v = new_velocity  │
//! │        │                  │                  │           │
//! │        └────────── RwLock<Kinematics> ───────┘           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! `stop()` raises the shutdown signal every loop selects on, then joins all
//! three tasks.

use atc_env::{rendezvous, AtcContext, Shutdown, ShutdownListener, ShutdownTrigger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AircraftConfig;
use crate::error::AircraftError;
use crate::messages::{CorrectionInbox, CorrectionLink, QueryInbox, QueryLink, StateReply};
use crate::types::{PlaneId, Vector};

#[derive(Debug, Clone, Copy)]
struct Kinematics {
    position: Vector,
    velocity: Vector,
}

/// State shared between the actor handle and its tasks.
struct Shared {
    id: PlaneId,
    kinematics: RwLock<Kinematics>,
    running: AtomicBool,
}

impl Shared {
    fn read(&self) -> Kinematics {
        *self.kinematics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, dt: f64) {
        let mut k = self.kinematics.write().unwrap_or_else(PoisonError::into_inner);
        let velocity = k.velocity;
        k.position += velocity * dt;
    }

    fn set_velocity(&self, velocity: Vector) {
        let mut k = self.kinematics.write().unwrap_or_else(PoisonError::into_inner);
        k.velocity = velocity;
    }

    fn reply(&self) -> StateReply {
        let k = self.read();
        StateReply {
            id: self.id,
            position: k.position,
            velocity: k.velocity,
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// One simulated aircraft.
pub struct Aircraft<Ctx: AtcContext> {
    context: Arc<Ctx>,
    config: AircraftConfig,
    shared: Arc<Shared>,

    query_link: QueryLink,
    correction_link: CorrectionLink,

    /// Taken by `start()`
    inboxes: Option<(QueryInbox, CorrectionInbox)>,

    shutdown: ShutdownTrigger,
    tasks: Vec<JoinHandle<()>>,
}

impl<Ctx: AtcContext> Aircraft<Ctx> {
    /// Creates a stopped aircraft.
    pub fn new(
        context: Arc<Ctx>,
        id: PlaneId,
        position: Vector,
        velocity: Vector,
        config: AircraftConfig,
    ) -> Self {
        let (query_link, query_inbox) = rendezvous(&format!("{id}/query"));
        let (correction_link, correction_inbox) = rendezvous(&format!("{id}/correction"));
        let (shutdown, _) = Shutdown::new();

        Self {
            context,
            config,
            shared: Arc::new(Shared {
                id,
                kinematics: RwLock::new(Kinematics { position, velocity }),
                running: AtomicBool::new(false),
            }),
            query_link,
            correction_link,
            inboxes: Some((query_inbox, correction_inbox)),
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Spawns the motion, query and correction tasks.
    ///
    /// An aircraft runs once; starting it again fails with `AlreadyStarted`.
    pub fn start(&mut self) -> Result<(), AircraftError> {
        let id = self.shared.id;
        let (query_inbox, correction_inbox) =
            self.inboxes.take().ok_or(AircraftError::AlreadyStarted(id))?;

        self.shared.running.store(true, Ordering::SeqCst);

        let motion = run_motion(
            Arc::clone(&self.context),
            Arc::clone(&self.shared),
            self.config.tick(),
            self.config.dt,
            self.shutdown.listener(),
        );
        let queries = run_queries(
            Arc::clone(&self.shared),
            query_inbox,
            self.shutdown.listener(),
        );
        let corrections = run_corrections(
            Arc::clone(&self.shared),
            correction_inbox,
            self.shutdown.listener(),
        );

        self.tasks.push(self.context.spawn(&format!("{id}/motion"), motion));
        self.tasks.push(self.context.spawn(&format!("{id}/query"), queries));
        self.tasks.push(self.context.spawn(&format!("{id}/correction"), corrections));

        info!("aircraft {} started", id);
        Ok(())
    }

    /// Stops all three tasks and waits for them to finish.
    ///
    /// Requests that are still queued fail on the sender side. Calling
    /// `stop()` again is a no-op.
    pub async fn stop(&mut self) {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        self.shutdown.trigger();
        self.inboxes = None;

        if !was_running && self.tasks.is_empty() {
            return;
        }

        for handle in self.tasks.drain(..) {
            if let Err(e) = handle.await {
                warn!("aircraft {} task ended abnormally: {}", self.shared.id, e);
            }
        }
        info!("aircraft {} stopped", self.shared.id);
    }

    pub fn id(&self) -> PlaneId {
        self.shared.id
    }

    pub fn position(&self) -> Vector {
        self.shared.read().position
    }

    pub fn velocity(&self) -> Vector {
        self.shared.read().velocity
    }

    /// Consistent id/position/velocity triple.
    pub fn state(&self) -> StateReply {
        self.shared.reply()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Sender onto this aircraft's query inbox.
    pub fn query_link(&self) -> QueryLink {
        self.query_link.clone()
    }

    /// Sender onto this aircraft's correction inbox.
    pub fn correction_link(&self) -> CorrectionLink {
        self.correction_link.clone()
    }
}

impl<Ctx: AtcContext> Drop for Aircraft<Ctx> {
    fn drop(&mut self) {
        // Unjoined tasks still exit on their own.
        self.shutdown.trigger();
    }
}

async fn run_motion<Ctx: AtcContext>(
    context: Arc<Ctx>,
    shared: Arc<Shared>,
    tick: Duration,
    dt: f64,
    mut shutdown: ShutdownListener,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = context.sleep(tick) => shared.advance(dt),
        }
    }
    debug!("aircraft {} motion loop exited", shared.id);
}

async fn run_queries(shared: Arc<Shared>, mut inbox: QueryInbox, mut shutdown: ShutdownListener) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = inbox.recv() => match received {
                Ok(envelope) => envelope,
                Err(_) => break,
            },
        };

        if envelope.reply(shared.reply()).is_err() {
            debug!("aircraft {}: requester gave up before the reply", shared.id);
        }
    }
    debug!("aircraft {} query loop exited", shared.id);
}

async fn run_corrections(
    shared: Arc<Shared>,
    mut inbox: CorrectionInbox,
    mut shutdown: ShutdownListener,
) {
    loop {
        let (command, ack) = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = inbox.recv() => match received {
                Ok(envelope) => envelope.into_parts(),
                Err(_) => break,
            },
        };

        if !shared.is_running() {
            debug!("aircraft {}: correction after stop ignored", shared.id);
            break;
        }

        if command.target != shared.id {
            warn!(
                "aircraft {}: ignoring correction addressed to {}",
                shared.id, command.target
            );
        } else if !command.new_velocity.iter().all(|c| c.is_finite()) {
            warn!("aircraft {}: ignoring non-finite velocity", shared.id);
        } else {
            shared.set_velocity(command.new_velocity);
            info!(
                "aircraft {} velocity set to ({:.2}, {:.2}, {:.2})",
                shared.id, command.new_velocity.x, command.new_velocity.y, command.new_velocity.z
            );
        }

        // Acknowledge only once the override is visible to queries.
        let _ = ack.respond(());
    }
    debug!("aircraft {} correction loop exited", shared.id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{CorrectionCommand, StateQuery};
    use approx::assert_relative_eq;
    use atc_env::{EnvError, TokioContext};

    fn plane(id: &str, position: Vector, velocity: Vector) -> Aircraft<TokioContext> {
        Aircraft::new(
            TokioContext::shared(),
            PlaneId::new(id).unwrap(),
            position,
            velocity,
            AircraftConfig::default(),
        )
    }

    #[test]
    fn test_new_aircraft_is_stopped() {
        let a = plane("A1", Vector::new(1.0, 2.0, 3.0), Vector::new(4.0, 5.0, 6.0));
        assert!(!a.is_running());
        assert_eq!(a.id().as_str(), "A1");
        assert_eq!(a.position(), Vector::new(1.0, 2.0, 3.0));
        assert_eq!(a.velocity(), Vector::new(4.0, 5.0, 6.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_advances_each_tick() {
        let mut a = plane("A1", Vector::new(1.0, 2.0, 3.0), Vector::new(4.0, 5.0, 6.0));
        a.start().unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let p = a.position();
        assert_relative_eq!(p.x, 5.0);
        assert_relative_eq!(p.y, 7.0);
        assert_relative_eq!(p.z, 9.0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_relative_eq!(a.position().x, 9.0);

        a.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_returns_consistent_state() {
        let mut a = plane("Q1", Vector::new(0.0, 0.0, 10.0), Vector::new(1.0, 0.0, 0.0));
        a.start().unwrap();

        let reply = a.query_link().request(StateQuery).await.unwrap();
        assert_eq!(reply.id.as_str(), "Q1");
        assert_eq!(reply.position, Vector::new(0.0, 0.0, 10.0));
        assert_eq!(reply.velocity, Vector::new(1.0, 0.0, 0.0));

        a.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_correction_overwrites_velocity() {
        let mut a = plane("C1", Vector::zeros(), Vector::new(1.0, 1.0, 0.0));
        a.start().unwrap();

        let command = CorrectionCommand {
            target: a.id(),
            new_velocity: Vector::new(0.0, 0.0, 2.0),
        };
        a.correction_link().push(command).await.unwrap();

        let reply = a.query_link().request(StateQuery).await.unwrap();
        assert_eq!(reply.velocity, Vector::new(0.0, 0.0, 2.0));

        a.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_misaddressed_correction_is_ignored() {
        let mut a = plane("C2", Vector::zeros(), Vector::new(1.0, 0.0, 0.0));
        a.start().unwrap();

        let command = CorrectionCommand {
            target: PlaneId::new("OTHER").unwrap(),
            new_velocity: Vector::new(9.0, 9.0, 9.0),
        };
        a.correction_link().push(command).await.unwrap();

        let bad = CorrectionCommand {
            target: a.id(),
            new_velocity: Vector::new(f64::NAN, 0.0, 0.0),
        };
        a.correction_link().push(bad).await.unwrap();

        let reply = a.query_link().request(StateQuery).await.unwrap();
        assert_eq!(reply.velocity, Vector::new(1.0, 0.0, 0.0));

        a.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_fails() {
        let mut a = plane("S1", Vector::zeros(), Vector::zeros());
        a.start().unwrap();
        assert!(matches!(a.start(), Err(AircraftError::AlreadyStarted(_))));
        a.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_joins_and_closes_links() {
        let mut a = plane("S2", Vector::zeros(), Vector::new(1.0, 0.0, 0.0));
        let query = a.query_link();
        let correction = a.correction_link();
        a.start().unwrap();
        assert!(a.is_running());

        a.stop().await;
        assert!(!a.is_running());
        assert!(query.is_closed());
        assert!(correction.is_closed());

        let err = query.request(StateQuery).await.unwrap_err();
        assert!(err.is_disconnect());

        // Second stop is a no-op.
        a.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_with_queries_in_flight() {
        let mut a = plane("S3", Vector::zeros(), Vector::zeros());
        a.start().unwrap();

        let link = a.query_link();
        let hammer = tokio::spawn(async move {
            loop {
                match link.request(StateQuery).await {
                    Ok(_) => tokio::task::yield_now().await,
                    Err(e) => return e,
                }
            }
        });

        tokio::task::yield_now().await;
        tokio::time::timeout(Duration::from_secs(1), a.stop())
            .await
            .expect("stop must not deadlock");

        let err = hammer.await.unwrap();
        assert!(matches!(
            err,
            EnvError::ChannelClosed(_) | EnvError::ReplyDropped(_)
        ));
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let mut a = plane("S4", Vector::zeros(), Vector::zeros());
        let link = a.query_link();
        a.stop().await;
        assert!(link.is_closed());
    }
}
