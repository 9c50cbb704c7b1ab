//! Message shapes exchanged between aircraft, radar, controller and clients.
//!
//! ```text
//! Radar ──StateQuery──────────► Aircraft ──StateReply──► Radar
//! Radar ──AggregateSnapshot──► Controller                 (push)
//! Controller ──CorrectionCommand──► Aircraft              (push)
//! Display ──SnapshotRequest──► Controller ──AggregateSnapshot──► Display
//! Console ──OperatorCommand──► Controller ──OperatorResult──► Console
//! ```

use atc_env::{Receiver, Sender};
use tracing::debug;

use crate::error::ControllerError;
use crate::types::{PlaneId, PlaneReport, Vector};

/// Maximum states in a radar → controller push.
pub const RADAR_SNAPSHOT_CAP: usize = 100;

/// Maximum states in a controller → display reply.
pub const DISPLAY_SNAPSHOT_CAP: usize = 50;

pub type QueryLink = Sender<StateQuery, StateReply>;
pub type QueryInbox = Receiver<StateQuery, StateReply>;
pub type CorrectionLink = Sender<CorrectionCommand, ()>;
pub type CorrectionInbox = Receiver<CorrectionCommand, ()>;
pub type SnapshotLink = Sender<AggregateSnapshot, ()>;
pub type SnapshotInbox = Receiver<AggregateSnapshot, ()>;
pub type DisplayLink = Sender<SnapshotRequest, AggregateSnapshot>;
pub type DisplayInbox = Receiver<SnapshotRequest, AggregateSnapshot>;
pub type OperatorLink = Sender<OperatorCommand, OperatorResult>;
pub type OperatorInbox = Receiver<OperatorCommand, OperatorResult>;

/// Radar → aircraft state poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateQuery;

/// Aircraft → radar answer, taken under one lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateReply {
    pub id: PlaneId,
    pub position: Vector,
    pub velocity: Vector,
}

/// Controller → aircraft velocity override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionCommand {
    pub target: PlaneId,
    pub new_velocity: Vector,
}

/// One tracked aircraft as seen by the last radar cycle.
#[derive(Debug, Clone)]
pub struct AircraftState {
    pub id: PlaneId,
    pub position: Vector,
    pub velocity: Vector,

    /// Direct line to the aircraft's correction inbox
    pub correction: CorrectionLink,
}

impl AircraftState {
    pub fn new(reply: StateReply, correction: CorrectionLink) -> Self {
        Self {
            id: reply.id,
            position: reply.position,
            velocity: reply.velocity,
            correction,
        }
    }

    /// Dead-reckoned position `horizon` time units ahead.
    pub fn project(&self, horizon: f64) -> Vector {
        self.position + self.velocity * horizon
    }

    pub fn report(&self) -> PlaneReport {
        PlaneReport::new(self.id, self.position, self.velocity)
    }
}

/// Point-in-time set of aircraft states, capped at construction.
#[derive(Debug, Clone, Default)]
pub struct AggregateSnapshot {
    states: Vec<AircraftState>,
}

impl AggregateSnapshot {
    /// Builds a snapshot, keeping at most `cap` states in their given order.
    pub fn bounded(mut states: Vec<AircraftState>, cap: usize) -> Self {
        if states.len() > cap {
            debug!("truncating snapshot from {} to {} aircraft", states.len(), cap);
            states.truncate(cap);
        }
        Self { states }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[AircraftState] {
        &self.states
    }

    pub fn into_states(self) -> Vec<AircraftState> {
        self.states
    }

    pub fn get(&self, id: PlaneId) -> Option<&AircraftState> {
        self.states.iter().find(|state| state.id == id)
    }

    pub fn reports(&self) -> Vec<PlaneReport> {
        self.states.iter().map(AircraftState::report).collect()
    }
}

/// Display → controller poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotRequest {
    /// The display wants velocity columns for its augmented aircraft
    pub augmented: bool,
}

/// Console → controller command.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    ListPlanes,
    DisplayPlane { id: PlaneId },
    UpdatePlaneVelocity { id: PlaneId, velocity: Vector },
    UpdatePlanePosition { id: PlaneId, position: Vector },
    SetLookahead { seconds: f64 },
}

impl OperatorCommand {
    /// Wire-style name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            OperatorCommand::ListPlanes => "LIST_PLANES",
            OperatorCommand::DisplayPlane { .. } => "DISPLAY_PLANE_DATA",
            OperatorCommand::UpdatePlaneVelocity { .. } => "UPDATE_PLANE_VELOCITY",
            OperatorCommand::UpdatePlanePosition { .. } => "UPDATE_PLANE_POSITION",
            OperatorCommand::SetLookahead { .. } => "SET_LOOKAHEAD",
        }
    }
}

/// Successful command outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorReply {
    Planes(Vec<PlaneReport>),
    Plane(PlaneReport),
    Ack,
}

pub type OperatorResult = Result<OperatorReply, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use atc_env::rendezvous;

    fn state(id: &str, x: f64) -> AircraftState {
        let (link, _inbox) = rendezvous("test");
        AircraftState::new(
            StateReply {
                id: PlaneId::new(id).unwrap(),
                position: Vector::new(x, 0.0, 0.0),
                velocity: Vector::new(1.0, 0.0, 0.5),
            },
            link,
        )
    }

    #[test]
    fn test_bounded_snapshot_truncates_in_order() {
        let states: Vec<_> = (0..60).map(|i| state(&format!("P{i}"), i as f64)).collect();
        let snapshot = AggregateSnapshot::bounded(states, DISPLAY_SNAPSHOT_CAP);

        assert_eq!(snapshot.count(), 50);
        assert_eq!(snapshot.states()[0].id.as_str(), "P0");
        assert_eq!(snapshot.states()[49].id.as_str(), "P49");
    }

    #[test]
    fn test_projection() {
        let s = state("A", 2.0);
        assert_eq!(s.project(3.0), Vector::new(5.0, 0.0, 1.5));
        assert_eq!(s.project(0.0), s.position);
    }

    #[test]
    fn test_lookup_by_id() {
        let snapshot = AggregateSnapshot::bounded(vec![state("A", 0.0), state("B", 1.0)], 10);
        let b = PlaneId::new("B").unwrap();

        assert_eq!(snapshot.get(b).map(|s| s.position.x), Some(1.0));
        assert!(snapshot.get(PlaneId::new("C").unwrap()).is_none());
        assert!(AggregateSnapshot::empty().is_empty());
    }

    #[test]
    fn test_command_kinds() {
        assert_eq!(OperatorCommand::ListPlanes.kind(), "LIST_PLANES");
        assert_eq!(
            OperatorCommand::SetLookahead { seconds: 1.0 }.kind(),
            "SET_LOOKAHEAD"
        );
    }
}
