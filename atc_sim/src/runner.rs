//! Scenario runner - boots an airspace, lets it fly, checks the outcome.

use atc_core::{AtcConfig, RADAR_SNAPSHOT_CAP};
use atc_env::TokioContext;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::scenarios::{Observation, ScenarioId};
use crate::system::AirspaceSystem;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Simulation time units flown
    pub duration_units: u32,

    /// Separation violations detected by the controller
    pub violations_seen: u64,

    /// Corrections accepted by aircraft
    pub corrections_sent: u64,

    /// Corrections that could not be delivered
    pub corrections_failed: u64,

    /// Planes at the start
    pub initial_plane_count: usize,

    /// Planes still on the radar roster at the end
    pub final_plane_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

impl ScenarioResult {
    fn new(
        scenario: ScenarioId,
        seed: u64,
        duration_units: u32,
        initial_plane_count: usize,
    ) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            duration_units,
            violations_seen: 0,
            corrections_sent: 0,
            corrections_failed: 0,
            initial_plane_count,
            final_plane_count: 0,
            failure_reason: None,
        }
    }

    fn failed(mut self, reason: String) -> Self {
        warn!("{} failed: {}", self.scenario, reason);
        self.passed = false;
        self.failure_reason = Some(reason);
        self
    }
}

/// Runs airspace scenarios.
pub struct ScenarioRunner {
    /// Seed for generated traffic
    seed: u64,

    /// Wall time of one simulation time unit
    time_unit: Duration,

    /// Aircraft count for random traffic
    traffic: usize,

    /// Overrides each scenario's own length
    duration_units: Option<u32>,

    /// Base configuration, rescaled to `time_unit`
    config: AtcConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            time_unit: Duration::from_secs(1),
            traffic: 20,
            duration_units: None,
            config: AtcConfig::default(),
        }
    }

    /// Sets the wall time of one simulation unit.
    pub fn with_time_unit(mut self, unit: Duration) -> Self {
        self.time_unit = unit;
        self
    }

    /// Sets the number of random aircraft.
    pub fn with_traffic(mut self, count: usize) -> Self {
        self.traffic = count;
        self
    }

    /// Sets the run length in time units for every scenario.
    pub fn with_duration(mut self, units: u32) -> Self {
        self.duration_units = Some(units);
        self
    }

    /// Sets the base configuration.
    pub fn with_config(mut self, config: AtcConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("{}", scenario.description());

        let setup = scenario.setup(self.seed, self.traffic);
        let units = self.duration_units.unwrap_or(setup.duration_units);
        let result = ScenarioResult::new(scenario, self.seed, units, setup.planes.len());
        let config = self.config.clone().with_time_unit(self.time_unit);

        let mut system = match AirspaceSystem::new(TokioContext::shared(), config) {
            Ok(system) => system,
            Err(e) => return result.failed(format!("invalid configuration: {e}")),
        };

        if let Err(e) = system.add_planes(&setup.planes).await {
            system.shutdown().await;
            return result.failed(format!("failed to load traffic: {e}"));
        }
        if let Err(e) = system.start() {
            system.shutdown().await;
            return result.failed(format!("failed to start: {e}"));
        }

        system.run_for(units).await;

        let observation = Observation {
            initial_plane_count: setup.planes.len(),
            final_plane_count: system.radar().plane_count().await,
            final_planes: system
                .controller()
                .state()
                .snapshot(RADAR_SNAPSHOT_CAP)
                .reports(),
            stats: system.controller().stats(),
        };
        system.shutdown().await;

        let mut result = ScenarioResult {
            violations_seen: observation.stats.violations,
            corrections_sent: observation.stats.corrections_sent,
            corrections_failed: observation.stats.corrections_failed,
            final_plane_count: observation.final_plane_count,
            ..result
        };

        match scenario.evaluate(&observation) {
            Ok(()) => {
                result.passed = true;
                info!(
                    "{} finished: {} violations, {} corrections, {} planes left",
                    scenario,
                    result.violations_seen,
                    result.corrections_sent,
                    result.final_plane_count
                );
                result
            }
            Err(reason) => result.failed(reason),
        }
    }

    /// Runs every scenario in `scenarios` in order.
    pub async fn run_all(&self, scenarios: &[ScenarioId]) -> Vec<ScenarioResult> {
        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run(*scenario).await);
        }
        results
    }
}
