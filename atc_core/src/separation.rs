//! Pairwise separation prediction.
//!
//! Every aircraft is dead-reckoned `lookahead` time units forward:
//!
//! ```text
//! p' = p + v * lookahead
//! horizontal = |(p'_i - p'_j).xy|      vertical = |p'_i.z - p'_j.z|
//! conflict  <=>  horizontal < H  AND  vertical < V
//! ```
//!
//! Comparisons are strict, so a pair exactly at a threshold is separated.

use crate::config::SeparationConfig;
use crate::messages::AircraftState;
use crate::types::Vector;

/// A predicted loss of separation between `states[first]` and `states[second]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    /// Index of the aircraft that receives the correction (`first < second`)
    pub first: usize,
    pub second: usize,
    pub horizontal: f64,
    pub vertical: f64,
}

/// Horizontal and vertical distance between two projected positions.
pub fn separation(a: &Vector, b: &Vector) -> (f64, f64) {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    ((dx * dx + dy * dy).sqrt(), (a.z - b.z).abs())
}

/// Returns true when both distances are strictly below their minima.
pub fn is_violation(horizontal: f64, vertical: f64, config: &SeparationConfig) -> bool {
    horizontal < config.horizontal_threshold && vertical < config.vertical_threshold
}

/// Scans every unordered pair `(i, j)`, `i < j`, in slice order.
pub fn find_violations(
    states: &[AircraftState],
    lookahead: f64,
    config: &SeparationConfig,
) -> Vec<Violation> {
    let projected: Vec<Vector> = states.iter().map(|s| s.project(lookahead)).collect();
    let mut violations = Vec::new();

    for i in 0..projected.len() {
        for j in (i + 1)..projected.len() {
            let (horizontal, vertical) = separation(&projected[i], &projected[j]);
            if is_violation(horizontal, vertical, config) {
                violations.push(Violation {
                    first: i,
                    second: j,
                    horizontal,
                    vertical,
                });
            }
        }
    }

    violations
}

/// Velocity the first aircraft of a conflicting pair is told to fly.
pub fn corrected_velocity(velocity: &Vector, config: &SeparationConfig) -> Vector {
    velocity + Vector::new(0.0, 0.0, config.vertical_nudge)
}
