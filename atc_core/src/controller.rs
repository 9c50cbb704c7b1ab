//! The controller - conflict detection and the command engine.
//!
//! # Architecture
//!
//! ```text
//!             SnapshotLink            DisplayLink           OperatorLink
//!                  │                       │                      │
//!        ┌─────────▼───────┐   ┌───────────▼──────┐   ┌───────────▼───────┐
//!        │  radar inbox    │   │ display responder │   │ operator responder│
//!        └─────────┬───────┘   └───────────┬──────┘   └───────────┬───────┘
//!                  │   Mutex<snapshot + lookahead>                 │
//!                  └───────────────┬──────────────────────────────┘
//!                           ┌──────▼──────┐
//!                           │   scanner   │──CorrectionCommand──► Aircraft
//!                           └─────────────┘
//! ```
//!
//! The scanner copies the snapshot under the lock and releases it before the
//! O(n²) pass, so radar pushes are never blocked for a whole scan.

use atc_env::{rendezvous, AtcContext, Shutdown, ShutdownListener, ShutdownTrigger};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::messages::{
    AggregateSnapshot, AircraftState, CorrectionCommand, DisplayInbox, DisplayLink,
    OperatorCommand, OperatorInbox, OperatorLink, OperatorReply, OperatorResult, SnapshotInbox,
    SnapshotLink, DISPLAY_SNAPSHOT_CAP,
};
use crate::separation::{corrected_velocity, find_violations};
use crate::types::{PlaneId, Vector};

/// Outcome of one conflict scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub aircraft: usize,
    pub violations: usize,
    pub corrections_sent: usize,
    pub corrections_failed: usize,
}

/// Running totals since the controller was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub scans: u64,
    pub snapshots_received: u64,
    pub violations: u64,
    pub corrections_sent: u64,
    pub corrections_failed: u64,
}

#[derive(Default)]
struct Counters {
    scans: AtomicU64,
    snapshots_received: AtomicU64,
    violations: AtomicU64,
    corrections_sent: AtomicU64,
    corrections_failed: AtomicU64,
}

struct Tracked {
    snapshot: Vec<AircraftState>,
    lookahead: f64,
}

/// Everything the controller's tasks share.
pub struct ControllerState {
    config: ControllerConfig,
    tracked: Mutex<Tracked>,
    counters: Counters,
}

impl ControllerState {
    pub fn new(config: ControllerConfig) -> Self {
        let lookahead = config.lookahead_secs;
        Self {
            config,
            tracked: Mutex::new(Tracked {
                snapshot: Vec::new(),
                lookahead,
            }),
            counters: Counters::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the stored snapshot wholesale.
    pub fn receive_snapshot(&self, aggregate: AggregateSnapshot) {
        let count = aggregate.count();
        self.lock().snapshot = aggregate.into_states();
        self.counters
            .snapshots_received
            .fetch_add(1, Ordering::Relaxed);
        debug!("controller received {} aircraft from radar", count);
    }

    /// Copy of the stored snapshot, truncated to `cap` in storage order.
    pub fn snapshot(&self, cap: usize) -> AggregateSnapshot {
        let states = self.lock().snapshot.clone();
        AggregateSnapshot::bounded(states, cap)
    }

    pub fn lookahead(&self) -> f64 {
        self.lock().lookahead
    }

    /// Copy of the stored state for `id`.
    pub fn find(&self, id: PlaneId) -> Option<AircraftState> {
        self.lock()
            .snapshot
            .iter()
            .find(|state| state.id == id)
            .cloned()
    }

    fn set_velocity(&self, id: PlaneId, velocity: Vector) {
        let mut tracked = self.lock();
        if let Some(state) = tracked.snapshot.iter_mut().find(|state| state.id == id) {
            state.velocity = velocity;
        }
    }

    pub fn stats(&self) -> ControllerStats {
        let c = &self.counters;
        ControllerStats {
            scans: c.scans.load(Ordering::Relaxed),
            snapshots_received: c.snapshots_received.load(Ordering::Relaxed),
            violations: c.violations.load(Ordering::Relaxed),
            corrections_sent: c.corrections_sent.load(Ordering::Relaxed),
            corrections_failed: c.corrections_failed.load(Ordering::Relaxed),
        }
    }

    /// Runs one pairwise separation scan over a copy of the snapshot.
    ///
    /// Each violation raises one alert and sends one correction to the first
    /// aircraft of the pair. Undeliverable corrections are logged and counted.
    pub async fn scan_once(&self) -> ScanReport {
        let (states, lookahead) = {
            let tracked = self.lock();
            (tracked.snapshot.clone(), tracked.lookahead)
        };

        let separation = &self.config.separation;
        let violations = find_violations(&states, lookahead, separation);
        let mut report = ScanReport {
            aircraft: states.len(),
            violations: violations.len(),
            ..ScanReport::default()
        };

        for violation in &violations {
            let first = &states[violation.first];
            let second = &states[violation.second];
            warn!(
                target: "atc::alert",
                "ALERT: potential violation between {} and {} within {:.1} units \
                 (horizontal {:.2}, vertical {:.2})",
                first.id, second.id, lookahead, violation.horizontal, violation.vertical
            );

            let command = CorrectionCommand {
                target: first.id,
                new_velocity: corrected_velocity(&first.velocity, separation),
            };
            match first
                .correction
                .push_timeout(command, self.config.correction_timeout())
                .await
            {
                Ok(()) => {
                    report.corrections_sent += 1;
                    info!("course correction sent to {}", first.id);
                }
                Err(e) => {
                    report.corrections_failed += 1;
                    warn!("course correction to {} not delivered: {}", first.id, e);
                }
            }
        }

        let c = &self.counters;
        c.scans.fetch_add(1, Ordering::Relaxed);
        c.violations
            .fetch_add(report.violations as u64, Ordering::Relaxed);
        c.corrections_sent
            .fetch_add(report.corrections_sent as u64, Ordering::Relaxed);
        c.corrections_failed
            .fetch_add(report.corrections_failed as u64, Ordering::Relaxed);
        report
    }

    /// Applies one operator command. Every command gets a reply or an error.
    pub async fn apply_operator_command(&self, command: OperatorCommand) -> OperatorResult {
        debug!("operator command {}", command.kind());
        match command {
            OperatorCommand::ListPlanes => {
                Ok(OperatorReply::Planes(self.snapshot(DISPLAY_SNAPSHOT_CAP).reports()))
            }
            OperatorCommand::DisplayPlane { id } => self
                .find(id)
                .map(|state| OperatorReply::Plane(state.report()))
                .ok_or(ControllerError::PlaneNotFound(id)),
            OperatorCommand::UpdatePlaneVelocity { id, velocity } => {
                self.update_velocity(id, velocity).await
            }
            OperatorCommand::SetLookahead { seconds } => {
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(ControllerError::InvalidLookahead(seconds));
                }
                self.lock().lookahead = seconds;
                info!("lookahead set to {} units", seconds);
                Ok(OperatorReply::Ack)
            }
            other @ OperatorCommand::UpdatePlanePosition { .. } => {
                warn!("rejecting unsupported command {}", other.kind());
                Err(ControllerError::Unsupported(other.kind()))
            }
        }
    }

    async fn update_velocity(&self, id: PlaneId, velocity: Vector) -> OperatorResult {
        if !velocity.iter().all(|c| c.is_finite()) {
            return Err(ControllerError::InvalidVelocity(id));
        }

        let link = self
            .find(id)
            .map(|state| state.correction)
            .ok_or(ControllerError::PlaneNotFound(id))?;

        let command = CorrectionCommand {
            target: id,
            new_velocity: velocity,
        };
        link.push_timeout(command, self.config.correction_timeout())
            .await?;

        self.set_velocity(id, velocity);
        info!("operator set velocity of {}", id);
        Ok(OperatorReply::Ack)
    }
}

/// The controller actor.
pub struct Controller<Ctx: AtcContext> {
    context: Arc<Ctx>,
    state: Arc<ControllerState>,
    running: AtomicBool,

    snapshot_link: SnapshotLink,
    display_link: DisplayLink,
    operator_link: OperatorLink,

    /// Taken by `start()`
    inboxes: Option<(SnapshotInbox, DisplayInbox, OperatorInbox)>,

    shutdown: ShutdownTrigger,
    tasks: Vec<JoinHandle<()>>,
}

impl<Ctx: AtcContext> Controller<Ctx> {
    /// Creates a stopped controller with its three inboxes.
    pub fn new(context: Arc<Ctx>, config: ControllerConfig) -> Self {
        let (snapshot_link, snapshot_inbox) = rendezvous("controller/radar");
        let (display_link, display_inbox) = rendezvous("controller/display");
        let (operator_link, operator_inbox) = rendezvous("controller/operator");
        let (shutdown, _) = Shutdown::new();

        Self {
            context,
            state: Arc::new(ControllerState::new(config)),
            running: AtomicBool::new(false),
            snapshot_link,
            display_link,
            operator_link,
            inboxes: Some((snapshot_inbox, display_inbox, operator_inbox)),
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Spawns the scanner and the three responders. Starting twice is a no-op.
    pub fn start(&mut self) {
        let Some((snapshot_inbox, display_inbox, operator_inbox)) = self.inboxes.take() else {
            warn!("controller already started");
            return;
        };
        self.running.store(true, Ordering::SeqCst);

        let scanner = run_scanner(
            Arc::clone(&self.context),
            Arc::clone(&self.state),
            self.shutdown.listener(),
        );
        let radar = run_radar_inbox(
            Arc::clone(&self.state),
            snapshot_inbox,
            self.shutdown.listener(),
        );
        let display = run_display_responder(
            Arc::clone(&self.state),
            display_inbox,
            self.shutdown.listener(),
        );
        let operator = run_operator_responder(
            Arc::clone(&self.state),
            operator_inbox,
            self.shutdown.listener(),
        );

        self.tasks.push(self.context.spawn("controller/scanner", scanner));
        self.tasks.push(self.context.spawn("controller/radar", radar));
        self.tasks.push(self.context.spawn("controller/display", display));
        self.tasks.push(self.context.spawn("controller/operator", operator));
        info!("controller started");
    }

    /// Signals every task and joins them.
    pub async fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.shutdown.trigger();
        self.inboxes = None;

        if !was_running {
            return;
        }
        for handle in self.tasks.drain(..) {
            if let Err(e) = handle.await {
                warn!("controller task ended abnormally: {}", e);
            }
        }
        info!("controller stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Sender the radar pushes aggregates into.
    pub fn snapshot_link(&self) -> SnapshotLink {
        self.snapshot_link.clone()
    }

    /// Sender display clients poll with `SnapshotRequest`.
    pub fn display_link(&self) -> DisplayLink {
        self.display_link.clone()
    }

    /// Sender console clients submit `OperatorCommand`s to.
    pub fn operator_link(&self) -> OperatorLink {
        self.operator_link.clone()
    }

    pub fn state(&self) -> &Arc<ControllerState> {
        &self.state
    }

    pub fn receive_snapshot(&self, aggregate: AggregateSnapshot) {
        self.state.receive_snapshot(aggregate);
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        self.state.snapshot(DISPLAY_SNAPSHOT_CAP)
    }

    pub async fn scan_once(&self) -> ScanReport {
        self.state.scan_once().await
    }

    pub async fn apply_operator_command(&self, command: OperatorCommand) -> OperatorResult {
        self.state.apply_operator_command(command).await
    }

    pub fn lookahead(&self) -> f64 {
        self.state.lookahead()
    }

    pub fn stats(&self) -> ControllerStats {
        self.state.stats()
    }
}

impl<Ctx: AtcContext> Drop for Controller<Ctx> {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

async fn run_scanner<Ctx: AtcContext>(
    context: Arc<Ctx>,
    state: Arc<ControllerState>,
    mut shutdown: ShutdownListener,
) {
    let interval = state.config.scan_interval();
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = context.sleep(interval) => {
                let report = state.scan_once().await;
                if report.violations > 0 {
                    debug!("scan: {:?}", report);
                }
            }
        }
    }
    debug!("controller scanner exited");
}

async fn run_radar_inbox(
    state: Arc<ControllerState>,
    mut inbox: SnapshotInbox,
    mut shutdown: ShutdownListener,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = inbox.recv() => match received {
                Ok(envelope) => envelope,
                Err(_) => break,
            },
        };

        let (aggregate, ack) = envelope.into_parts();
        state.receive_snapshot(aggregate);
        let _ = ack.respond(());
    }
    debug!("controller radar inbox exited");
}

async fn run_display_responder(
    state: Arc<ControllerState>,
    mut inbox: DisplayInbox,
    mut shutdown: ShutdownListener,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = inbox.recv() => match received {
                Ok(envelope) => envelope,
                Err(_) => break,
            },
        };

        let augmented = envelope.message().augmented;
        let snapshot = state.snapshot(DISPLAY_SNAPSHOT_CAP);
        let count = snapshot.count();
        match envelope.reply(snapshot) {
            Ok(()) => debug!("sent {} aircraft to display (augmented={})", count, augmented),
            Err(e) => warn!("failed to send data to display: {}", e),
        }
    }
    debug!("controller display responder exited");
}

async fn run_operator_responder(
    state: Arc<ControllerState>,
    mut inbox: OperatorInbox,
    mut shutdown: ShutdownListener,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = inbox.recv() => match received {
                Ok(envelope) => envelope,
                Err(_) => break,
            },
        };

        let (command, responder) = envelope.into_parts();
        let result = state.apply_operator_command(command).await;
        if responder.respond(result).is_err() {
            warn!("operator went away before the reply");
        }
    }
    debug!("controller operator responder exited");
}
