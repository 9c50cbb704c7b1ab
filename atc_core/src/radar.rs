//! The radar - aircraft roster, polling and the airspace bounds filter.
//!
//! One polling cycle:
//!
//! ```text
//! roster ──copy links──► query each (timeout) ──► drop stale serials
//!        ──► split by Bounds ──► push AggregateSnapshot ──► remove leavers
//! ```
//!
//! The roster lock is only held to copy, insert or detach entries. Queries,
//! pushes and aircraft shutdown all happen with the lock released.

use atc_env::{AtcContext, Shutdown, ShutdownListener, ShutdownTrigger};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::aircraft::Aircraft;
use crate::config::RadarConfig;
use crate::error::RadarError;
use crate::messages::{
    AggregateSnapshot, AircraftState, CorrectionLink, QueryLink, SnapshotLink, StateQuery,
    RADAR_SNAPSHOT_CAP,
};
use crate::types::{PlaneId, Vector};

/// What one polling cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Aircraft that answered the state query
    pub polled: usize,

    /// Aircraft that failed to answer in time
    pub skipped: usize,

    /// States included in the pushed aggregate
    pub tracked: usize,

    /// Aircraft dropped for leaving the airspace
    pub removed: Vec<PlaneId>,

    /// Whether the controller accepted the aggregate
    pub pushed: bool,
}

struct RosterEntry<Ctx: AtcContext> {
    serial: u64,
    aircraft: Aircraft<Ctx>,
    query: QueryLink,
    correction: CorrectionLink,
}

struct RadarShared<Ctx: AtcContext> {
    context: Arc<Ctx>,
    config: RadarConfig,
    controller: SnapshotLink,
    roster: Mutex<Vec<RosterEntry<Ctx>>>,
    next_serial: AtomicU64,
    stopped: AtomicBool,
}

impl<Ctx: AtcContext> RadarShared<Ctx> {
    async fn add_plane(
        &self,
        id: PlaneId,
        position: Vector,
        velocity: Vector,
    ) -> Result<(), RadarError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(RadarError::Stopped);
        }

        let mut roster = self.roster.lock().await;
        if roster.iter().any(|entry| entry.aircraft.id() == id) {
            return Err(RadarError::DuplicatePlane(id));
        }

        let mut aircraft = Aircraft::new(
            Arc::clone(&self.context),
            id,
            position,
            velocity,
            self.config.aircraft.clone(),
        );
        aircraft.start()?;

        roster.push(RosterEntry {
            serial: self.next_serial.fetch_add(1, Ordering::Relaxed),
            query: aircraft.query_link(),
            correction: aircraft.correction_link(),
            aircraft,
        });
        info!("radar tracking {} ({} aircraft)", id, roster.len());
        Ok(())
    }

    /// Unlinks the first entry matching `predicate`; the caller stops it.
    async fn detach<F>(&self, predicate: F) -> Option<RosterEntry<Ctx>>
    where
        F: Fn(&RosterEntry<Ctx>) -> bool,
    {
        let mut roster = self.roster.lock().await;
        let index = roster.iter().position(predicate)?;
        Some(roster.remove(index))
    }

    async fn remove_plane(&self, id: PlaneId) -> Result<(), RadarError> {
        let mut entry = self
            .detach(|entry| entry.aircraft.id() == id)
            .await
            .ok_or(RadarError::PlaneNotFound(id))?;

        entry.aircraft.stop().await;
        info!("radar released {}", id);
        Ok(())
    }

    async fn poll_once(&self) -> PollReport {
        let targets: Vec<(u64, PlaneId, QueryLink, CorrectionLink)> = self
            .roster
            .lock()
            .await
            .iter()
            .map(|entry| {
                (
                    entry.serial,
                    entry.aircraft.id(),
                    entry.query.clone(),
                    entry.correction.clone(),
                )
            })
            .collect();

        let mut report = PollReport::default();
        let mut replies = Vec::with_capacity(targets.len());
        for (serial, id, query, correction) in targets {
            match query
                .request_timeout(StateQuery, self.config.query_timeout())
                .await
            {
                Ok(reply) => replies.push((serial, reply, correction)),
                Err(e) => {
                    warn!("radar: no state from {} this cycle: {}", id, e);
                    report.skipped += 1;
                }
            }
        }
        report.polled = replies.len();

        let live: HashSet<u64> = self
            .roster
            .lock()
            .await
            .iter()
            .map(|entry| entry.serial)
            .collect();

        let mut in_bounds = Vec::with_capacity(replies.len());
        let mut leaving = Vec::new();
        for (serial, reply, correction) in replies {
            if !live.contains(&serial) {
                debug!("radar: discarding reply from removed aircraft {}", reply.id);
                continue;
            }
            if self.config.bounds.contains(&reply.position) {
                in_bounds.push(AircraftState::new(reply, correction));
            } else {
                info!(
                    "{} left the airspace at ({:.1}, {:.1}, {:.1})",
                    reply.id, reply.position.x, reply.position.y, reply.position.z
                );
                leaving.push((serial, reply.id));
            }
        }

        let aggregate = AggregateSnapshot::bounded(in_bounds, RADAR_SNAPSHOT_CAP);
        report.tracked = aggregate.count();
        match self
            .controller
            .push_timeout(aggregate, self.config.push_timeout())
            .await
        {
            Ok(()) => report.pushed = true,
            Err(e) => warn!("radar: aggregate dropped this cycle: {}", e),
        }

        for (serial, id) in leaving {
            if let Some(mut entry) = self.detach(|entry| entry.serial == serial).await {
                entry.aircraft.stop().await;
                report.removed.push(id);
            }
        }

        debug!("radar cycle: {:?}", report);
        report
    }

    async fn release_all(&self) -> usize {
        let entries = std::mem::take(&mut *self.roster.lock().await);
        let count = entries.len();
        for mut entry in entries {
            entry.aircraft.stop().await;
        }
        count
    }
}

/// The radar actor. Sole owner of every aircraft it tracks.
pub struct Radar<Ctx: AtcContext> {
    shared: Arc<RadarShared<Ctx>>,
    shutdown: ShutdownTrigger,
    poller: Option<JoinHandle<()>>,
}

impl<Ctx: AtcContext> Radar<Ctx> {
    /// Creates a stopped radar that will push aggregates into `controller`.
    pub fn new(context: Arc<Ctx>, config: RadarConfig, controller: SnapshotLink) -> Self {
        let (shutdown, _) = Shutdown::new();
        Self {
            shared: Arc::new(RadarShared {
                context,
                config,
                controller,
                roster: Mutex::new(Vec::new()),
                next_serial: AtomicU64::new(0),
                stopped: AtomicBool::new(false),
            }),
            shutdown,
            poller: None,
        }
    }

    /// Creates, starts and registers a new aircraft.
    pub async fn add_plane(
        &self,
        id: PlaneId,
        position: Vector,
        velocity: Vector,
    ) -> Result<(), RadarError> {
        self.shared.add_plane(id, position, velocity).await
    }

    /// Detaches the aircraft, then stops and joins it.
    pub async fn remove_plane(&self, id: PlaneId) -> Result<(), RadarError> {
        self.shared.remove_plane(id).await
    }

    /// Runs one polling cycle immediately.
    pub async fn poll_once(&self) -> PollReport {
        self.shared.poll_once().await
    }

    /// Spawns the polling loop.
    pub fn start(&mut self) -> Result<(), RadarError> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(RadarError::Stopped);
        }
        if self.poller.is_some() {
            warn!("radar already started");
            return Ok(());
        }

        let task = run_poller(Arc::clone(&self.shared), self.shutdown.listener());
        self.poller = Some(self.shared.context.spawn("radar/poller", task));
        info!(
            "radar started, polling every {:?}",
            self.shared.config.poll_interval()
        );
        Ok(())
    }

    /// Stops the polling loop, then every tracked aircraft. Idempotent.
    pub async fn stop(&mut self) {
        let already = self.shared.stopped.swap(true, Ordering::SeqCst);
        self.shutdown.trigger();

        if let Some(handle) = self.poller.take() {
            if let Err(e) = handle.await {
                warn!("radar poller ended abnormally: {}", e);
            }
        }

        let released = self.shared.release_all().await;
        if !already {
            info!("radar stopped, released {} aircraft", released);
        }
    }

    pub fn is_running(&self) -> bool {
        self.poller.is_some() && !self.shared.stopped.load(Ordering::SeqCst)
    }

    /// Tracked ids in roster order.
    pub async fn plane_ids(&self) -> Vec<PlaneId> {
        self.shared
            .roster
            .lock()
            .await
            .iter()
            .map(|entry| entry.aircraft.id())
            .collect()
    }

    pub async fn plane_count(&self) -> usize {
        self.shared.roster.lock().await.len()
    }
}

impl<Ctx: AtcContext> Drop for Radar<Ctx> {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

async fn run_poller<Ctx: AtcContext>(
    shared: Arc<RadarShared<Ctx>>,
    mut shutdown: ShutdownListener,
) {
    let interval = shared.config.poll_interval();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = shared.context.sleep(interval) => {
                shared.poll_once().await;
            }
        }
    }
    debug!("radar poller exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bounds;
    use crate::messages::StateReply;
    use atc_env::{rendezvous, TokioContext};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn fake_controller() -> (SnapshotLink, mpsc::UnboundedReceiver<AggregateSnapshot>) {
        let (link, mut inbox) = rendezvous("controller");
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok(envelope) = inbox.recv().await {
                if tx.send(envelope.accept()).is_err() {
                    break;
                }
            }
        });
        (link, rx)
    }

    fn radar(
        config: RadarConfig,
    ) -> (Radar<TokioContext>, mpsc::UnboundedReceiver<AggregateSnapshot>) {
        let (link, rx) = fake_controller();
        (Radar::new(TokioContext::shared(), config, link), rx)
    }

    fn id(s: &str) -> PlaneId {
        PlaneId::new(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_added_plane_appears_in_next_push() {
        let (mut radar, mut pushes) = radar(RadarConfig::default());
        radar
            .add_plane(id("AC1"), Vector::new(10.0, 20.0, 30.0), Vector::zeros())
            .await
            .unwrap();

        let report = radar.poll_once().await;
        assert_eq!(report.polled, 1);
        assert!(report.pushed);

        let snapshot = pushes.recv().await.unwrap();
        assert_eq!(snapshot.count(), 1);
        let state = &snapshot.states()[0];
        assert_eq!(state.id, id("AC1"));
        assert_eq!(state.position, Vector::new(10.0, 20.0, 30.0));
        assert_eq!(state.velocity, Vector::zeros());

        radar.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_id_rejected() {
        let (mut radar, _pushes) = radar(RadarConfig::default());
        radar
            .add_plane(id("DUP"), Vector::zeros(), Vector::zeros())
            .await
            .unwrap();

        let err = radar
            .add_plane(id("DUP"), Vector::new(1.0, 1.0, 1.0), Vector::zeros())
            .await
            .unwrap_err();
        assert!(matches!(err, RadarError::DuplicatePlane(_)));
        assert_eq!(radar.plane_count().await, 1);

        radar.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_unknown_leaves_roster() {
        let (mut radar, _pushes) = radar(RadarConfig::default());
        radar
            .add_plane(id("A"), Vector::zeros(), Vector::zeros())
            .await
            .unwrap();
        radar
            .add_plane(id("B"), Vector::zeros(), Vector::zeros())
            .await
            .unwrap();

        let err = radar.remove_plane(id("GHOST")).await.unwrap_err();
        assert!(matches!(err, RadarError::PlaneNotFound(_)));
        assert_eq!(radar.plane_ids().await, vec![id("A"), id("B")]);

        radar.remove_plane(id("A")).await.unwrap();
        assert_eq!(radar.plane_ids().await, vec![id("B")]);

        radar.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_bounds_plane_is_dropped() {
        let bounds = Bounds::new(Vector::new(0.0, 0.0, 0.0), Vector::new(100.0, 100.0, 50.0));
        let (mut radar, mut pushes) = radar(RadarConfig::default().with_bounds(bounds));
        radar
            .add_plane(id("IN"), Vector::new(50.0, 50.0, 10.0), Vector::zeros())
            .await
            .unwrap();
        radar
            .add_plane(id("OUT"), Vector::new(500.0, 50.0, 10.0), Vector::zeros())
            .await
            .unwrap();

        let report = radar.poll_once().await;
        assert_eq!(report.polled, 2);
        assert_eq!(report.tracked, 1);
        assert_eq!(report.removed, vec![id("OUT")]);
        assert_eq!(radar.plane_ids().await, vec![id("IN")]);

        let first = pushes.recv().await.unwrap();
        assert!(first.get(id("OUT")).is_none());

        radar.poll_once().await;
        let second = pushes.recv().await.unwrap();
        assert_eq!(second.count(), 1);
        assert!(second.get(id("IN")).is_some());

        radar.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_roster_still_pushes() {
        let (mut radar, mut pushes) = radar(RadarConfig::default());
        let report = radar.poll_once().await;

        assert!(report.pushed);
        assert_eq!(report.polled, 0);
        assert!(pushes.recv().await.unwrap().is_empty());

        radar.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_failure_is_contained() {
        let (link, inbox) = rendezvous::<AggregateSnapshot, ()>("controller");
        drop(inbox);
        let mut radar = Radar::new(TokioContext::shared(), RadarConfig::default(), link);
        radar
            .add_plane(id("A"), Vector::zeros(), Vector::zeros())
            .await
            .unwrap();

        let report = radar.poll_once().await;
        assert_eq!(report.polled, 1);
        assert!(!report.pushed);
        assert_eq!(radar.plane_count().await, 1);

        radar.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_with_five_planes() {
        let (mut radar, mut pushes) = radar(RadarConfig::default());
        for i in 0..5 {
            radar
                .add_plane(
                    id(&format!("P{i}")),
                    Vector::new(i as f64 * 10.0, 0.0, 20.0),
                    Vector::new(1.0, 0.0, 0.0),
                )
                .await
                .unwrap();
        }

        radar.start().unwrap();
        assert!(radar.is_running());
        tokio::time::sleep(Duration::from_millis(3500)).await;

        let first = pushes.recv().await.unwrap();
        assert_eq!(first.count(), 5);
        let links: Vec<_> = first
            .states()
            .iter()
            .map(|s| s.correction.clone())
            .collect();

        tokio::time::timeout(Duration::from_secs(5), radar.stop())
            .await
            .expect("radar stop must complete");

        assert!(!radar.is_running());
        assert_eq!(radar.plane_count().await, 0);
        assert!(links.iter().all(|link| link.is_closed()));

        // Idempotent and closed for business.
        radar.stop().await;
        let err = radar
            .add_plane(id("LATE"), Vector::zeros(), Vector::zeros())
            .await;
        assert!(matches!(err, Err(RadarError::Stopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_aircraft_is_skipped_not_removed() {
        let (mut radar, mut pushes) = radar(RadarConfig::default());
        radar
            .add_plane(id("MUTE"), Vector::new(1.0, 1.0, 10.0), Vector::zeros())
            .await
            .unwrap();
        radar
            .add_plane(id("LOUD"), Vector::new(2.0, 2.0, 10.0), Vector::zeros())
            .await
            .unwrap();

        // MUTE's queries land in an inbox nobody answers.
        let (silent, _inbox) = rendezvous::<StateQuery, StateReply>("silent");
        radar.shared.roster.lock().await[0].query = silent;

        let report = radar.poll_once().await;
        assert_eq!(report.skipped, 1);
        assert_eq!(report.polled, 1);
        assert_eq!(report.tracked, 1);
        assert!(report.removed.is_empty());
        assert_eq!(radar.plane_ids().await, vec![id("MUTE"), id("LOUD")]);

        let snapshot = pushes.recv().await.unwrap();
        assert!(snapshot.get(id("MUTE")).is_none());
        assert!(snapshot.get(id("LOUD")).is_some());

        radar.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_from_removed_aircraft_is_discarded() {
        let config = RadarConfig {
            query_timeout_ms: 5_000,
            ..RadarConfig::default()
        };
        let (mut radar, mut pushes) = radar(config);
        radar
            .add_plane(id("GONE"), Vector::new(1.0, 1.0, 10.0), Vector::zeros())
            .await
            .unwrap();
        radar
            .add_plane(id("STAY"), Vector::new(2.0, 2.0, 10.0), Vector::zeros())
            .await
            .unwrap();

        // GONE is removed while its query is in flight, then answered.
        let (slow, mut inbox) = rendezvous::<StateQuery, StateReply>("slow");
        radar.shared.roster.lock().await[0].query = slow;
        let shared = Arc::clone(&radar.shared);
        let responder = tokio::spawn(async move {
            let envelope = inbox.recv().await.unwrap();
            shared.remove_plane(id("GONE")).await.unwrap();
            envelope
                .reply(StateReply {
                    id: id("GONE"),
                    position: Vector::new(1.0, 1.0, 10.0),
                    velocity: Vector::zeros(),
                })
                .unwrap();
        });

        let report = radar.poll_once().await;
        responder.await.unwrap();

        assert_eq!(report.polled, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.tracked, 1);
        assert!(report.removed.is_empty());
        assert_eq!(radar.plane_ids().await, vec![id("STAY")]);

        let snapshot = pushes.recv().await.unwrap();
        assert_eq!(snapshot.count(), 1);
        assert!(snapshot.get(id("GONE")).is_none());

        radar.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_stop_after_start() {
        let (mut radar, _pushes) = radar(RadarConfig::default());
        for i in 0..5 {
            radar
                .add_plane(
                    id(&format!("Q{i}")),
                    Vector::new(i as f64 * 10.0, 0.0, 20.0),
                    Vector::new(1.0, 0.0, 0.0),
                )
                .await
                .unwrap();
        }
        let links: Vec<(QueryLink, CorrectionLink)> = radar
            .shared
            .roster
            .lock()
            .await
            .iter()
            .map(|entry| (entry.query.clone(), entry.correction.clone()))
            .collect();

        radar.start().unwrap();
        tokio::time::timeout(Duration::from_secs(1), radar.stop())
            .await
            .expect("radar stop must complete");

        assert!(!radar.is_running());
        assert_eq!(radar.plane_count().await, 0);
        assert_eq!(links.len(), 5);
        assert!(links
            .iter()
            .all(|(query, correction)| query.is_closed() && correction.is_closed()));
    }
}
