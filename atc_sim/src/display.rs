//! Periodic airspace display.
//!
//! Every refresh requests a snapshot from the controller and renders a top-down
//! x-y grid. Each aircraft is drawn with a glyph for its altitude band:
//!
//! ```text
//! _  lowest quarter    -  second    =  third    ^  top quarter    *  stacked
//! ```
//!
//! Aircraft in the augmented set also get their velocity listed.

use atc_core::messages::DisplayLink;
use atc_core::{AggregateSnapshot, Bounds, PlaneId, SnapshotRequest};
use atc_env::{AtcContext, EnvError, ShutdownListener};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Reference refresh period in time units.
pub const DEFAULT_DISPLAY_INTERVAL_UNITS: u32 = 5;

const BAND_GLYPHS: [char; 4] = ['_', '-', '=', '^'];
const STACKED_GLYPH: char = '*';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub columns: usize,
    pub rows: usize,
    pub interval_units: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            columns: 60,
            rows: 20,
            interval_units: DEFAULT_DISPLAY_INTERVAL_UNITS,
        }
    }
}

/// Ids whose velocities are shown. Shared between the display and the console.
#[derive(Debug, Clone, Default)]
pub struct AugmentedSet {
    ids: Arc<Mutex<Vec<PlaneId>>>,
}

impl AugmentedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id`; returns false if it was already present.
    pub fn add(&self, id: PlaneId) -> bool {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if ids.contains(&id) {
            return false;
        }
        ids.push(id);
        true
    }

    /// Removes `id`; returns false if it was not present.
    pub fn remove(&self, id: PlaneId) -> bool {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        let before = ids.len();
        ids.retain(|known| *known != id);
        ids.len() != before
    }

    pub fn ids(&self) -> Vec<PlaneId> {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

/// Glyph for the altitude band `z` falls into.
pub fn altitude_glyph(z: f64, bounds: &Bounds) -> char {
    let extent = bounds.max.z - bounds.min.z;
    if extent <= 0.0 {
        return BAND_GLYPHS[1];
    }
    let fraction = ((z - bounds.min.z) / extent).clamp(0.0, 1.0);
    let band = ((fraction * BAND_GLYPHS.len() as f64) as usize).min(BAND_GLYPHS.len() - 1);
    BAND_GLYPHS[band]
}

fn cell(value: f64, min: f64, max: f64, cells: usize) -> usize {
    if max <= min || cells < 2 {
        return 0;
    }
    let fraction = ((value - min) / (max - min)).clamp(0.0, 1.0);
    (fraction * (cells - 1) as f64).round() as usize
}

/// Renders one frame: the grid followed by one line per aircraft.
pub fn render(
    snapshot: &AggregateSnapshot,
    bounds: &Bounds,
    augmented: &[PlaneId],
    config: &DisplayConfig,
) -> String {
    let columns = config.columns.max(1);
    let rows = config.rows.max(1);
    let mut grid = vec![vec![' '; columns]; rows];

    for state in snapshot.states() {
        let col = cell(state.position.x, bounds.min.x, bounds.max.x, columns);
        // North (max y) is the top row.
        let row = rows - 1 - cell(state.position.y, bounds.min.y, bounds.max.y, rows);
        let slot = &mut grid[row][col];
        *slot = if *slot == ' ' {
            altitude_glyph(state.position.z, bounds)
        } else {
            STACKED_GLYPH
        };
    }

    let mut out = String::new();
    let border = "-".repeat(columns);
    let _ = writeln!(out, "+{border}+");
    for row in &grid {
        let line: String = row.iter().collect();
        let _ = writeln!(out, "|{line}|");
    }
    let _ = writeln!(out, "+{border}+");

    if snapshot.is_empty() {
        let _ = writeln!(out, "no aircraft in the airspace");
        return out;
    }

    let _ = writeln!(out, "{} aircraft:", snapshot.count());
    for state in snapshot.states() {
        let p = state.position;
        let _ = write!(
            out,
            "  {} {} position ({:.1}, {:.1}, {:.1})",
            altitude_glyph(p.z, bounds),
            state.id,
            p.x,
            p.y,
            p.z
        );
        if augmented.contains(&state.id) {
            let v = state.velocity;
            let _ = write!(out, " velocity ({:.2}, {:.2}, {:.2})", v.x, v.y, v.z);
        }
        out.push('\n');
    }
    out
}

/// Display client polling the controller.
pub struct Display {
    link: DisplayLink,
    bounds: Bounds,
    config: DisplayConfig,
    augmented: AugmentedSet,
}

impl Display {
    pub fn new(link: DisplayLink, bounds: Bounds, config: DisplayConfig) -> Self {
        Self {
            link,
            bounds,
            config,
            augmented: AugmentedSet::new(),
        }
    }

    /// Shares an augmented set, typically with the console.
    pub fn with_augmented(mut self, augmented: AugmentedSet) -> Self {
        self.augmented = augmented;
        self
    }

    pub fn augmented(&self) -> &AugmentedSet {
        &self.augmented
    }

    /// Requests a snapshot and renders it.
    pub async fn refresh(&self) -> Result<String, EnvError> {
        let augmented = self.augmented.ids();
        let request = SnapshotRequest {
            augmented: !augmented.is_empty(),
        };
        let snapshot = self.link.request(request).await?;
        debug!("display received {} aircraft", snapshot.count());
        Ok(render(&snapshot, &self.bounds, &augmented, &self.config))
    }

    /// Refreshes every `config.interval_units` time units until shutdown.
    pub async fn run<Ctx, W>(
        self,
        context: Arc<Ctx>,
        time_unit: Duration,
        mut out: W,
        mut shutdown: ShutdownListener,
    ) where
        Ctx: AtcContext,
        W: AsyncWrite + Unpin + Send,
    {
        let interval = time_unit * self.config.interval_units.max(1);
        loop {
            let refreshed = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                refreshed = self.refresh() => refreshed,
            };
            match refreshed {
                Ok(frame) => {
                    if out.write_all(frame.as_bytes()).await.is_err() {
                        warn!("display output closed");
                        break;
                    }
                    let _ = out.flush().await;
                }
                Err(e) if e.is_disconnect() => {
                    debug!("controller gone, display exiting");
                    break;
                }
                Err(e) => warn!("display refresh failed: {}", e),
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = context.sleep(interval) => {}
            }
        }
        debug!("display loop exited");
    }
}
