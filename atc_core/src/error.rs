//! Error types for the aircraft, radar and controller actors.

use atc_env::EnvError;
use thiserror::Error;

use crate::types::{PlaneId, PLANE_ID_CAPACITY};

/// Rejected plane identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaneIdError {
    #[error("plane id is empty")]
    Empty,

    #[error("plane id '{0}' exceeds {max} bytes", max = PLANE_ID_CAPACITY)]
    TooLong(String),

    #[error("plane id '{0}' contains whitespace")]
    Whitespace(String),
}

/// Errors raised while constructing or starting an aircraft actor.
#[derive(Debug, Error)]
pub enum AircraftError {
    #[error("aircraft {0} already started")]
    AlreadyStarted(PlaneId),

    #[error("invalid plane id: {0}")]
    InvalidId(#[from] PlaneIdError),
}

/// Errors reported by the radar's roster operations.
#[derive(Debug, Error)]
pub enum RadarError {
    #[error("plane {0} is already tracked")]
    DuplicatePlane(PlaneId),

    #[error("plane {0} not found")]
    PlaneNotFound(PlaneId),

    #[error("radar is stopped")]
    Stopped,

    #[error("aircraft error: {0}")]
    Aircraft(#[from] AircraftError),

    #[error("transport error: {0}")]
    Transport(#[from] EnvError),
}

/// Errors returned to operators and display clients by the controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerError {
    #[error("plane {0} not found")]
    PlaneNotFound(PlaneId),

    #[error("unsupported command: {0}")]
    Unsupported(&'static str),

    #[error("invalid lookahead {0}: must be finite and non-negative")]
    InvalidLookahead(f64),

    #[error("velocity for plane {0} must be finite")]
    InvalidVelocity(PlaneId),

    #[error("transport error: {0}")]
    Transport(#[from] EnvError),
}

/// Rejected configuration value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("bounds min exceeds max on the {axis} axis")]
    InvertedBounds { axis: char },

    #[error("lookahead {0} must be finite and non-negative")]
    Lookahead(f64),
}
