//! End-to-end scenario runs on paused tokio time.

use atc_sim::scenarios::ScenarioId;
use atc_sim::ScenarioRunner;

#[tokio::test(start_paused = true)]
async fn crossing_pair_is_separated_vertically() {
    let result = ScenarioRunner::new(42).run(ScenarioId::Crossing).await;

    assert!(result.passed, "{:?}", result.failure_reason);
    assert!(result.violations_seen >= 1);
    assert!(result.corrections_sent >= 1);
    assert_eq!(result.final_plane_count, 2);
}

#[tokio::test(start_paused = true)]
async fn parallel_pair_raises_no_alert() {
    let result = ScenarioRunner::new(42).run(ScenarioId::Parallel).await;

    assert!(result.passed, "{:?}", result.failure_reason);
    assert_eq!(result.violations_seen, 0);
    assert_eq!(result.corrections_sent, 0);
}

#[tokio::test(start_paused = true)]
async fn exiting_aircraft_is_dropped() {
    let result = ScenarioRunner::new(42).run(ScenarioId::BoundaryExit).await;

    assert!(result.passed, "{:?}", result.failure_reason);
    assert_eq!(result.initial_plane_count, 2);
    assert_eq!(result.final_plane_count, 1);
}

#[tokio::test(start_paused = true)]
async fn random_traffic_stays_healthy() {
    let result = ScenarioRunner::new(7)
        .with_traffic(30)
        .run(ScenarioId::RandomTraffic)
        .await;

    assert!(result.passed, "{:?}", result.failure_reason);
    assert_eq!(result.initial_plane_count, 30);
}

#[tokio::test(start_paused = true)]
async fn run_all_reports_every_scenario() {
    let results = ScenarioRunner::new(1)
        .with_duration(6)
        .run_all(&ScenarioId::all())
        .await;

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.duration_units == 6));
    assert!(results.iter().all(|r| r.passed), "{:?}", results);
}
