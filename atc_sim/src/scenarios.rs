//! Named airspace scenarios.

use atc_core::{Bounds, ControllerStats, PlaneId, PlaneReport, Vector};
use serde::Serialize;

use crate::traffic::RandomTraffic;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// ATC-001: head-on pair at one altitude, must be separated vertically
    Crossing,

    /// ATC-002: side-by-side pair outside the minima, must be left alone
    Parallel,

    /// ATC-003: aircraft flying out of the airspace is dropped
    BoundaryExit,

    /// ATC-004: seeded random traffic, loop must stay healthy
    RandomTraffic,
}

/// Initial traffic and run length for one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioSetup {
    pub planes: Vec<PlaneReport>,
    pub duration_units: u32,
}

/// What the runner saw when the scenario finished.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub initial_plane_count: usize,
    pub final_plane_count: usize,

    /// Last states the controller received
    pub final_planes: Vec<PlaneReport>,

    pub stats: ControllerStats,
}

impl Observation {
    fn plane(&self, id: &str) -> Option<&PlaneReport> {
        self.final_planes.iter().find(|p| p.id.as_str() == id)
    }
}

fn plane(id: &str, position: [f64; 3], velocity: [f64; 3]) -> Option<PlaneReport> {
    let id = PlaneId::new(id).ok()?;
    Some(PlaneReport::new(
        id,
        Vector::from(position),
        Vector::from(velocity),
    ))
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Crossing,
            ScenarioId::Parallel,
            ScenarioId::BoundaryExit,
            ScenarioId::RandomTraffic,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Crossing => "crossing",
            ScenarioId::Parallel => "parallel",
            ScenarioId::BoundaryExit => "boundary_exit",
            ScenarioId::RandomTraffic => "random_traffic",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Crossing => "Two aircraft head-on at the same altitude, 20 units apart",
            ScenarioId::Parallel => "Two aircraft flying abreast 10 units apart",
            ScenarioId::BoundaryExit => "One aircraft leaving the airspace, one holding",
            ScenarioId::RandomTraffic => "Seeded random traffic across the whole airspace",
        }
    }

    /// Builds the initial traffic.
    ///
    /// `seed` and `traffic` only affect `RandomTraffic`.
    pub fn setup(&self, seed: u64, traffic: usize) -> ScenarioSetup {
        let (planes, duration_units) = match self {
            ScenarioId::Crossing => (
                vec![
                    plane("XA", [-10.0, 0.0, 50.0], [2.0, 0.0, 0.0]),
                    plane("XB", [10.0, 0.0, 50.0], [-2.0, 0.0, 0.0]),
                ],
                10,
            ),
            ScenarioId::Parallel => (
                vec![
                    plane("PA", [0.0, 0.0, 50.0], [2.0, 0.0, 0.0]),
                    plane("PB", [0.0, 10.0, 50.0], [2.0, 0.0, 0.0]),
                ],
                10,
            ),
            ScenarioId::BoundaryExit => (
                vec![
                    plane("EXIT", [990.0, 0.0, 50.0], [10.0, 0.0, 0.0]),
                    plane("STAY", [0.0, 0.0, 50.0], [0.0, 0.0, 0.0]),
                ],
                5,
            ),
            ScenarioId::RandomTraffic => {
                let planes = RandomTraffic::new(seed, traffic)
                    .with_bounds(Bounds::default())
                    .generate();
                return ScenarioSetup {
                    planes,
                    duration_units: 10,
                };
            }
        };

        ScenarioSetup {
            planes: planes.into_iter().flatten().collect(),
            duration_units,
        }
    }

    /// Checks the scenario's pass criteria.
    pub fn evaluate(&self, observation: &Observation) -> Result<(), String> {
        let stats = &observation.stats;
        match self {
            ScenarioId::Crossing => {
                if stats.violations == 0 {
                    return Err("no violation detected for the head-on pair".to_string());
                }
                if stats.corrections_sent == 0 {
                    return Err("no correction delivered".to_string());
                }
                let (Some(a), Some(b)) = (observation.plane("XA"), observation.plane("XB")) else {
                    return Err("crossing pair missing from the final snapshot".to_string());
                };
                let vertical = a.position.z - b.position.z;
                if vertical < 1.0 {
                    return Err(format!("XA only {vertical:.2} units above XB"));
                }
                Ok(())
            }
            ScenarioId::Parallel => {
                if stats.violations > 0 {
                    return Err(format!("{} false alerts for a separated pair", stats.violations));
                }
                if observation.final_plane_count != 2 {
                    return Err(format!(
                        "expected 2 planes, found {}",
                        observation.final_plane_count
                    ));
                }
                Ok(())
            }
            ScenarioId::BoundaryExit => {
                if observation.final_plane_count != 1 {
                    return Err(format!(
                        "expected 1 plane, found {}",
                        observation.final_plane_count
                    ));
                }
                if observation.plane("EXIT").is_some() {
                    return Err("EXIT still reported after leaving the airspace".to_string());
                }
                if observation.plane("STAY").is_none() {
                    return Err("STAY missing from the final snapshot".to_string());
                }
                Ok(())
            }
            ScenarioId::RandomTraffic => {
                if stats.snapshots_received == 0 {
                    return Err("controller never received a snapshot".to_string());
                }
                if observation.final_plane_count > observation.initial_plane_count {
                    return Err("roster grew without any add_plane".to_string());
                }
                let bounds = Bounds::default();
                if let Some(outside) = observation
                    .final_planes
                    .iter()
                    .find(|p| !bounds.contains(&p.position))
                {
                    return Err(format!("{} reported outside the airspace", outside.id));
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crossing" | "atc-001" => Ok(ScenarioId::Crossing),
            "parallel" | "atc-002" => Ok(ScenarioId::Parallel),
            "boundary_exit" | "boundaryexit" | "atc-003" => Ok(ScenarioId::BoundaryExit),
            "random_traffic" | "randomtraffic" | "random" | "atc-004" => {
                Ok(ScenarioId::RandomTraffic)
            }
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_parse_back() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("ATC-003".parse::<ScenarioId>(), Ok(ScenarioId::BoundaryExit));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_setups() {
        let crossing = ScenarioId::Crossing.setup(0, 0);
        assert_eq!(crossing.planes.len(), 2);
        assert_eq!(crossing.planes[0].id.as_str(), "XA");

        let random = ScenarioId::RandomTraffic.setup(9, 12);
        assert_eq!(random.planes.len(), 12);
        assert_eq!(random.planes, ScenarioId::RandomTraffic.setup(9, 12).planes);
    }

    #[test]
    fn test_crossing_requires_vertical_gap() {
        let level = Observation {
            initial_plane_count: 2,
            final_plane_count: 2,
            final_planes: ScenarioId::Crossing.setup(0, 0).planes,
            stats: ControllerStats {
                violations: 1,
                corrections_sent: 1,
                ..ControllerStats::default()
            },
        };
        assert!(ScenarioId::Crossing.evaluate(&level).is_err());

        let mut climbed = level.clone();
        climbed.final_planes[0].position.z = 55.0;
        assert!(ScenarioId::Crossing.evaluate(&climbed).is_ok());
    }

    #[test]
    fn test_boundary_exit_criteria() {
        let stay = ScenarioId::BoundaryExit.setup(0, 0).planes[1].clone();
        let observation = Observation {
            initial_plane_count: 2,
            final_plane_count: 1,
            final_planes: vec![stay],
            stats: ControllerStats::default(),
        };
        assert!(ScenarioId::BoundaryExit.evaluate(&observation).is_ok());

        let lingering = Observation {
            final_plane_count: 2,
            ..observation
        };
        assert!(ScenarioId::BoundaryExit.evaluate(&lingering).is_err());
    }
}
