//! Airspace bootstrap: one controller, one radar, wired together.

use atc_core::messages::{DisplayLink, OperatorLink};
use atc_core::{AtcConfig, ConfigError, Controller, PlaneReport, Radar, RadarError};
use atc_env::AtcContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A running ATC loop.
///
/// Start order is controller then radar so the first aggregate has a
/// receiver. Shutdown runs in reverse.
pub struct AirspaceSystem<Ctx: AtcContext> {
    context: Arc<Ctx>,
    config: AtcConfig,
    controller: Controller<Ctx>,
    radar: Radar<Ctx>,
    started: bool,
}

impl<Ctx: AtcContext> AirspaceSystem<Ctx> {
    /// Validates `config` and builds the stopped system.
    pub fn new(context: Arc<Ctx>, config: AtcConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let controller = Controller::new(Arc::clone(&context), config.controller.clone());
        let radar = Radar::new(
            Arc::clone(&context),
            config.radar.clone(),
            controller.snapshot_link(),
        );

        Ok(Self {
            context,
            config,
            controller,
            radar,
            started: false,
        })
    }

    /// Starts the controller, then the radar.
    pub fn start(&mut self) -> Result<(), RadarError> {
        self.controller.start();
        self.radar.start()?;
        self.started = true;
        info!("airspace system started");
        Ok(())
    }

    /// Registers every plane with the radar, stopping at the first failure.
    pub async fn add_planes(&self, planes: &[PlaneReport]) -> Result<usize, RadarError> {
        for plane in planes {
            self.radar
                .add_plane(plane.id, plane.position, plane.velocity)
                .await?;
        }
        Ok(planes.len())
    }

    /// Lets the loop run for `units` simulation time units.
    pub async fn run_for(&self, units: u32) {
        self.context.sleep(self.time_unit() * units).await;
    }

    /// Wall time of one simulation time unit.
    pub fn time_unit(&self) -> Duration {
        self.config.radar.aircraft.tick()
    }

    /// Stops the radar (and with it every aircraft), then the controller.
    pub async fn shutdown(&mut self) {
        self.radar.stop().await;
        self.controller.stop().await;
        if std::mem::take(&mut self.started) {
            info!("airspace system stopped");
        }
    }

    pub fn config(&self) -> &AtcConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    pub fn radar(&self) -> &Radar<Ctx> {
        &self.radar
    }

    pub fn controller(&self) -> &Controller<Ctx> {
        &self.controller
    }

    pub fn display_link(&self) -> DisplayLink {
        self.controller.display_link()
    }

    pub fn operator_link(&self) -> OperatorLink {
        self.controller.operator_link()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atc_core::{PlaneId, SnapshotRequest, Vector};
    use atc_env::TokioContext;

    fn planes() -> Vec<PlaneReport> {
        vec![
            PlaneReport::new(
                PlaneId::new("A").unwrap(),
                Vector::new(0.0, 0.0, 10.0),
                Vector::zeros(),
            ),
            PlaneReport::new(
                PlaneId::new("B").unwrap(),
                Vector::new(50.0, 0.0, 10.0),
                Vector::zeros(),
            ),
        ]
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AtcConfig::default();
        config.controller.lookahead_secs = f64::NAN;
        assert!(AirspaceSystem::new(TokioContext::shared(), config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_planes_reach_the_display() {
        let mut system = AirspaceSystem::new(TokioContext::shared(), AtcConfig::default()).unwrap();
        assert_eq!(system.add_planes(&planes()).await.unwrap(), 2);
        system.start().unwrap();

        system.run_for(2).await;
        let snapshot = system
            .display_link()
            .request(SnapshotRequest::default())
            .await
            .unwrap();
        assert_eq!(snapshot.count(), 2);

        system.shutdown().await;
        assert_eq!(system.radar().plane_count().await, 0);
        assert!(system.display_link().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_plane_stops_loading() {
        let system = AirspaceSystem::new(TokioContext::shared(), AtcConfig::default()).unwrap();
        let mut list = planes();
        list.push(list[0].clone());

        assert!(matches!(
            system.add_planes(&list).await,
            Err(RadarError::DuplicatePlane(_))
        ));
        assert_eq!(system.radar().plane_count().await, 2);
    }
}
