//! ATC Simulation Harness
//!
//! Everything around the core actors that makes the loop usable:
//! - **System**: bootstraps controller and radar in the right order
//! - **Traffic**: plane files and seeded random traffic
//! - **Console / Display**: the operator's input and output sides
//! - **Scenarios**: named runs with pass criteria, for the CLI and CI
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── AirspaceSystem ────────────────────────┐
//! │                                                                │
//! │   Aircraft ×N ◄──StateQuery── Radar ──AggregateSnapshot──┐     │
//! │       ▲                                                  ▼     │
//! │       └──────────CorrectionCommand─────────────── Controller   │
//! │                                                   ▲      ▲     │
//! └───────────────────────────────────────────────────┼──────┼─────┘
//!                                     SnapshotRequest │      │ OperatorCommand
//!                                                Display    Console
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use atc_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Crossing).await;
//! assert!(result.passed);
//! ```

pub mod console;
pub mod display;
mod runner;
pub mod scenarios;
mod system;
pub mod traffic;

pub use console::{Console, ConsoleInput, ParseError};
pub use display::{AugmentedSet, Display, DisplayConfig};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use system::AirspaceSystem;
pub use traffic::{load_planes, parse_planes, RandomTraffic, TrafficError};
