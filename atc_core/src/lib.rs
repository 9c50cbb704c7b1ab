//! ATC Core - aircraft, radar and controller actors for a simulated airspace.
//!
//! Three actor kinds cooperate over `atc_env` rendezvous channels:
//! 1. **Aircraft**: dead-reckon their own position and answer state queries
//! 2. **Radar**: owns the roster, polls every aircraft and filters by bounds
//! 3. **Controller**: predicts separation losses and sends course corrections
//!
//! # Wiring
//!
//! ```ignore
//! let ctx = TokioContext::shared();
//! let mut controller = Controller::new(ctx.clone(), config.controller);
//! let mut radar = Radar::new(ctx, config.radar, controller.snapshot_link());
//! controller.start();
//! radar.start()?;
//! ```

pub mod aircraft;
pub mod config;
pub mod controller;
pub mod error;
pub mod messages;
pub mod radar;
pub mod separation;
pub mod types;

pub use aircraft::Aircraft;
pub use config::{
    AircraftConfig, AtcConfig, Bounds, ControllerConfig, RadarConfig, SeparationConfig,
};
pub use controller::{Controller, ControllerState, ControllerStats, ScanReport};
pub use error::{AircraftError, ConfigError, ControllerError, PlaneIdError, RadarError};
pub use messages::{
    AggregateSnapshot, AircraftState, CorrectionCommand, OperatorCommand, OperatorReply,
    OperatorResult, SnapshotRequest, StateQuery, StateReply, DISPLAY_SNAPSHOT_CAP,
    RADAR_SNAPSHOT_CAP,
};
pub use radar::{PollReport, Radar};
pub use separation::Violation;
pub use types::{PlaneId, PlaneReport, Vector, PLANE_ID_CAPACITY};
