//! Tunables for every actor, with the reference defaults.
//!
//! All structs deserialize with `#[serde(default)]`, so a scenario file can
//! override any subset. Durations are stored in milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::Vector;

/// One simulation time unit in milliseconds.
pub const DEFAULT_TIME_UNIT_MS: u64 = 1000;

/// Static airspace box. Positions on the faces are in bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub min: Vector,
    pub max: Vector,
}

impl Bounds {
    pub fn new(min: Vector, max: Vector) -> Self {
        Self { min, max }
    }

    /// Returns true when `position` lies inside the box on every axis.
    pub fn contains(&self, position: &Vector) -> bool {
        (0..3).all(|axis| position[axis] >= self.min[axis] && position[axis] <= self.max[axis])
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (axis, name) in ['x', 'y', 'z'].into_iter().enumerate() {
            if self.min[axis] > self.max[axis] {
                return Err(ConfigError::InvertedBounds { axis: name });
            }
        }
        Ok(())
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vector::new(-1000.0, -1000.0, 0.0),
            max: Vector::new(1000.0, 1000.0, 100.0),
        }
    }
}

/// Configuration for one aircraft actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AircraftConfig {
    /// Wall time between position updates (default: one time unit)
    pub tick_ms: u64,

    /// Simulated time advanced per tick, in time units (default: 1.0)
    pub dt: f64,
}

impl AircraftConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for AircraftConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TIME_UNIT_MS,
            dt: 1.0,
        }
    }
}

/// Configuration for the radar poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    /// Time between polling cycles (default: one time unit)
    pub poll_interval_ms: u64,

    /// Bounded wait for each aircraft's state reply
    pub query_timeout_ms: u64,

    /// Bounded wait for the controller to accept the aggregate
    pub push_timeout_ms: u64,

    /// Airspace; aircraft outside it are dropped from the roster
    pub bounds: Bounds,

    /// Settings handed to every aircraft created by `add_plane`
    pub aircraft: AircraftConfig,
}

impl RadarConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    /// Sets the airspace bounds.
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_TIME_UNIT_MS,
            query_timeout_ms: 250,
            push_timeout_ms: 500,
            bounds: Bounds::default(),
            aircraft: AircraftConfig::default(),
        }
    }
}

/// Separation minima and the correction policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Horizontal (x-y) minimum; distances strictly below it conflict
    pub horizontal_threshold: f64,

    /// Vertical (z) minimum; distances strictly below it conflict
    pub vertical_threshold: f64,

    /// Climb rate added to the first aircraft of a conflicting pair
    pub vertical_nudge: f64,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            horizontal_threshold: 3.0,
            vertical_threshold: 1.0,
            vertical_nudge: 1.0,
        }
    }
}

/// Configuration for the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Time between conflict scans (default: 100ms)
    pub scan_interval_ms: u64,

    /// Initial lookahead horizon in time units (default: 3)
    pub lookahead_secs: f64,

    /// Bounded wait for an aircraft to accept a correction
    pub correction_timeout_ms: u64,

    pub separation: SeparationConfig,
}

impl ControllerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn correction_timeout(&self) -> Duration {
        Duration::from_millis(self.correction_timeout_ms)
    }

    /// Sets the initial lookahead.
    pub fn with_lookahead(mut self, secs: f64) -> Self {
        self.lookahead_secs = secs;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 100,
            lookahead_secs: 3.0,
            correction_timeout_ms: 250,
            separation: SeparationConfig::default(),
        }
    }
}

/// Complete configuration for one ATC loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtcConfig {
    pub radar: RadarConfig,
    pub controller: ControllerConfig,
}

impl AtcConfig {
    /// Rescales every interval expressed in time units.
    ///
    /// Aircraft ticks and radar polls run once per unit; timeouts and the
    /// scan interval keep their ratio to the default unit.
    pub fn with_time_unit(mut self, unit: Duration) -> Self {
        let unit_ms = (unit.as_millis() as u64).max(1);
        let scale = |ms: u64| (ms * unit_ms / DEFAULT_TIME_UNIT_MS).max(1);

        self.radar.aircraft.tick_ms = unit_ms;
        self.radar.poll_interval_ms = unit_ms;
        self.radar.query_timeout_ms = scale(self.radar.query_timeout_ms);
        self.radar.push_timeout_ms = scale(self.radar.push_timeout_ms);
        self.controller.scan_interval_ms = scale(self.controller.scan_interval_ms);
        self.controller.correction_timeout_ms = scale(self.controller.correction_timeout_ms);
        self
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("radar.aircraft.tick_ms", self.radar.aircraft.tick_ms),
            ("radar.poll_interval_ms", self.radar.poll_interval_ms),
            ("radar.query_timeout_ms", self.radar.query_timeout_ms),
            ("radar.push_timeout_ms", self.radar.push_timeout_ms),
            ("controller.scan_interval_ms", self.controller.scan_interval_ms),
            ("controller.correction_timeout_ms", self.controller.correction_timeout_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }

        let separation = &self.controller.separation;
        if !(separation.horizontal_threshold > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "controller.separation.horizontal_threshold",
            });
        }
        if !(separation.vertical_threshold > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "controller.separation.vertical_threshold",
            });
        }

        let lookahead = self.controller.lookahead_secs;
        if !lookahead.is_finite() || lookahead < 0.0 {
            return Err(ConfigError::Lookahead(lookahead));
        }

        self.radar.bounds.validate()
    }
}
