//! ATC Loop Simulator CLI
//!
//! Fly plane files, run named scenarios, or drive the loop from a console.

use anyhow::{Context, Result};
use atc_core::{AtcConfig, PlaneReport, RADAR_SNAPSHOT_CAP};
use atc_env::{AtcContext, Shutdown, TokioContext};
use atc_sim::scenarios::ScenarioId;
use atc_sim::{
    load_planes, AirspaceSystem, AugmentedSet, Console, Display, DisplayConfig, RandomTraffic,
    ScenarioResult, ScenarioRunner,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// ATC loop simulator
#[derive(Parser, Debug)]
#[command(name = "atc-sim")]
#[command(about = "Run the simulated air-traffic-control loop", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fly the traffic for a fixed time and print the final picture
    Run {
        #[command(flatten)]
        traffic: TrafficArgs,

        /// Simulation time units to fly
        #[arg(short, long, default_value = "10")]
        units: u32,

        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Run a named scenario (crossing, parallel, boundary_exit, random_traffic, all)
    Scenario {
        #[arg(default_value = "all")]
        name: String,

        /// Seed for random traffic (0 = random from time)
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Aircraft in random_traffic
        #[arg(long, default_value = "20")]
        traffic: usize,

        /// Wall time of one simulation unit in milliseconds
        #[arg(long, default_value = "100")]
        time_unit_ms: u64,

        /// Override every scenario's length in time units
        #[arg(short, long)]
        duration: Option<u32>,

        /// JSON output for CI parsing
        #[arg(long)]
        json: bool,
    },

    /// Interactive operator console with the live display
    Console {
        #[command(flatten)]
        traffic: TrafficArgs,

        /// Display refresh period in time units
        #[arg(long, default_value = "5")]
        display_interval: u32,
    },
}

#[derive(Args, Debug)]
struct TrafficArgs {
    /// JSON plane file
    #[arg(short, long)]
    planes: Option<PathBuf>,

    /// Generate this many random planes instead of reading a file
    #[arg(long, conflicts_with = "planes")]
    random: Option<usize>,

    /// Seed for random traffic
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// JSON configuration file; any subset of fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Wall time of one simulation unit in milliseconds
    #[arg(long)]
    time_unit_ms: Option<u64>,
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

fn load_config(path: Option<&Path>) -> Result<AtcConfig> {
    let Some(path) = path else {
        return Ok(AtcConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("malformed config {}", path.display()))
}

fn load_traffic(args: &TrafficArgs) -> Result<Vec<PlaneReport>> {
    if let Some(path) = &args.planes {
        return Ok(load_planes(path)?);
    }
    Ok(RandomTraffic::new(args.seed, args.random.unwrap_or(0)).generate())
}

async fn build_system(args: &TrafficArgs) -> Result<AirspaceSystem<TokioContext>> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(ms) = args.time_unit_ms {
        config = config.with_time_unit(Duration::from_millis(ms));
    }
    let planes = load_traffic(args)?;

    let mut system = AirspaceSystem::new(TokioContext::shared(), config)?;
    system.add_planes(&planes).await?;
    system.start()?;
    info!("airspace up with {} planes", planes.len());
    Ok(system)
}

async fn run(traffic: TrafficArgs, units: u32, json: bool) -> Result<()> {
    let mut system = build_system(&traffic).await?;
    system.run_for(units).await;

    let planes = system
        .controller()
        .state()
        .snapshot(RADAR_SNAPSHOT_CAP)
        .reports();
    let stats = system.controller().stats();
    system.shutdown().await;

    if json {
        let summary = serde_json::json!({
            "units": units,
            "violations": stats.violations,
            "corrections_sent": stats.corrections_sent,
            "corrections_failed": stats.corrections_failed,
            "planes": planes,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for plane in &planes {
            let (p, v) = (plane.position, plane.velocity);
            println!(
                "{:<15} ({:>8.1}, {:>8.1}, {:>6.1})  v ({:>6.2}, {:>6.2}, {:>6.2})",
                plane.id, p.x, p.y, p.z, v.x, v.y, v.z
            );
        }
        info!(
            "{} planes after {} units, {} violations, {} corrections",
            planes.len(),
            units,
            stats.violations,
            stats.corrections_sent
        );
    }
    Ok(())
}

async fn scenario(
    name: String,
    seed: u64,
    traffic: usize,
    time_unit_ms: u64,
    duration: Option<u32>,
    json: bool,
) -> Result<()> {
    let scenarios: Vec<ScenarioId> = if name == "all" {
        ScenarioId::all()
    } else {
        let id = name.parse().map_err(|e: String| {
            anyhow::anyhow!(
                "{e}\nAvailable scenarios: crossing, parallel, boundary_exit, random_traffic, all"
            )
        })?;
        vec![id]
    };

    let seed = if seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        seed
    };

    let mut runner = ScenarioRunner::new(seed)
        .with_traffic(traffic)
        .with_time_unit(Duration::from_millis(time_unit_ms.max(1)));
    if let Some(units) = duration {
        runner = runner.with_duration(units);
    }

    let results: Vec<ScenarioResult> = runner.run_all(&scenarios).await;
    let failed: Vec<&ScenarioResult> = results.iter().filter(|r| !r.passed).collect();

    if json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed.len(),
            "failed": failed.len(),
            "results": &results,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for result in &results {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", result.scenario, result.seed);
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    result.scenario,
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        if failed.is_empty() {
            info!("All {} scenario runs passed", results.len());
        } else {
            error!("{}/{} scenario runs failed", failed.len(), results.len());
        }
    }

    // Exit with proper code for CI
    if !failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

async fn console(traffic: TrafficArgs, display_interval: u32) -> Result<()> {
    let mut system = build_system(&traffic).await?;
    let augmented = AugmentedSet::new();

    let display = Display::new(
        system.display_link(),
        system.config().radar.bounds.clone(),
        DisplayConfig {
            interval_units: display_interval,
            ..DisplayConfig::default()
        },
    )
    .with_augmented(augmented.clone());

    let (stop_display, listener) = Shutdown::new();
    let display_task = system.context().spawn(
        "display",
        display.run(
            Arc::clone(system.context()),
            system.time_unit(),
            tokio::io::stdout(),
            listener,
        ),
    );

    let console = Console::new(system.operator_link()).with_augmented(augmented);
    let session = console
        .run(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await;

    stop_display.trigger();
    if let Err(e) = display_task.await {
        error!("display task failed: {}", e);
    }
    system.shutdown().await;

    session.context("console input failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    info!("ATC Loop Simulator v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run {
            traffic,
            units,
            json,
        } => run(traffic, units, json).await,
        Command::Scenario {
            name,
            seed,
            traffic,
            time_unit_ms,
            duration,
            json,
        } => scenario(name, seed, traffic, time_unit_ms, duration, json).await,
        Command::Console {
            traffic,
            display_interval,
        } => console(traffic, display_interval).await,
    }
}
