//! Plane files and seeded random traffic.
//!
//! A plane file is a JSON array:
//!
//! ```json
//! [
//!   { "id": "AC1", "position": [0.0, 0.0, 50.0], "velocity": [1.0, 0.0, 0.0] }
//! ]
//! ```

use atc_core::{Bounds, PlaneId, PlaneReport, Vector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Plane file loading errors.
#[derive(Debug, Error)]
pub enum TrafficError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed plane file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("plane {0} appears more than once")]
    DuplicateId(PlaneId),

    #[error("plane {0} has a non-finite position or velocity")]
    NonFinite(PlaneId),
}

/// Parses and validates a plane list.
pub fn parse_planes(json: &str) -> Result<Vec<PlaneReport>, TrafficError> {
    let planes: Vec<PlaneReport> = serde_json::from_str(json)?;

    let mut seen = HashSet::with_capacity(planes.len());
    for plane in &planes {
        if !seen.insert(plane.id) {
            return Err(TrafficError::DuplicateId(plane.id));
        }
        let finite = plane
            .position
            .iter()
            .chain(plane.velocity.iter())
            .all(|c| c.is_finite());
        if !finite {
            return Err(TrafficError::NonFinite(plane.id));
        }
    }

    Ok(planes)
}

/// Reads a plane file from disk.
pub fn load_planes(path: impl AsRef<Path>) -> Result<Vec<PlaneReport>, TrafficError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| TrafficError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let planes = parse_planes(&json)?;
    info!("loaded {} planes from {}", planes.len(), path.display());
    Ok(planes)
}

/// Deterministic traffic generator.
#[derive(Debug, Clone)]
pub struct RandomTraffic {
    seed: u64,
    count: usize,
    bounds: Bounds,
    max_speed: f64,
    margin: f64,
}

impl RandomTraffic {
    pub fn new(seed: u64, count: usize) -> Self {
        Self {
            seed,
            count,
            bounds: Bounds::default(),
            max_speed: 5.0,
            margin: 0.1,
        }
    }

    /// Spawns aircraft inside `bounds`.
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Upper bound on each horizontal velocity component.
    pub fn with_max_speed(mut self, speed: f64) -> Self {
        self.max_speed = speed.abs();
        self
    }

    /// Generates `count` aircraft with ids `R000`, `R001`, ...
    ///
    /// Positions keep a margin of 10% of each extent from the faces. Vertical
    /// speed is a fifth of the horizontal limit.
    pub fn generate(&self) -> Vec<PlaneReport> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let extent = self.bounds.max - self.bounds.min;

        let planes: Vec<PlaneReport> = (0..self.count)
            .filter_map(|i| {
                let id = PlaneId::new(&format!("R{i:03}")).ok()?;
                let position = Vector::from_fn(|axis, _| {
                    let pad = extent[axis] * self.margin;
                    let lo = self.bounds.min[axis] + pad;
                    let hi = self.bounds.max[axis] - pad;
                    if hi > lo {
                        rng.gen_range(lo..hi)
                    } else {
                        lo
                    }
                });
                let velocity = Vector::new(
                    self.speed(&mut rng, self.max_speed),
                    self.speed(&mut rng, self.max_speed),
                    self.speed(&mut rng, self.max_speed / 5.0),
                );
                Some(PlaneReport::new(id, position, velocity))
            })
            .collect();

        debug!("generated {} random planes (seed={})", planes.len(), self.seed);
        planes
    }

    fn speed(&self, rng: &mut ChaCha8Rng, limit: f64) -> f64 {
        if limit > 0.0 {
            rng.gen_range(-limit..limit)
        } else {
            0.0
        }
    }
}
