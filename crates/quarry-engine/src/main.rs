//! Harness binary for the Quarry work-allocation core.
//!
//! Wires a seeded synthetic world, the allocator, and the stub movement
//! layer into the async tick loop, runs until a bound is hit, and prints
//! a JSON report of the run on stdout.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `quarry-config.yaml` (or `QUARRY_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the tick clock and the allocator
//! 4. Generate the synthetic world
//! 5. Create operator state from simulation bounds; Ctrl-C requests a stop
//! 6. Run the simulation loop
//! 7. Log the result and print the report

mod error;
mod progress;
mod scenario;

use std::path::PathBuf;
use std::sync::Arc;

use quarry_alloc::Allocator;
use quarry_core::clock::TickClock;
use quarry_core::config::{LoggingConfig, SimulationConfig};
use quarry_core::movement::StubExecutor;
use quarry_core::operator::{OperatorState, SimulationEndReason};
use quarry_core::runner;
use quarry_core::tick::{SimulationState, TickSummary};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::progress::ProgressCallback;

/// Environment variable naming an alternative config file.
const CONFIG_ENV_VAR: &str = "QUARRY_CONFIG";

/// Default config file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "quarry-config.yaml";

/// What the engine prints when the run ends.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    world: &'a str,
    seed: u64,
    end_reason: SimulationEndReason,
    total_ticks: u64,
    suspended_ticks: u64,
    simulated_seconds: f64,
    starved_peak: usize,
    final_tick: Option<&'a TickSummary>,
}

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        tick_interval_ms = config.world.tick_interval_ms,
        tick_duration_ms = config.world.tick_duration_ms,
        "Configuration loaded"
    );

    // 3. Create clock and allocator.
    let clock = TickClock::new(config.world.tick_duration()).map_err(EngineError::from)?;
    let allocator = Allocator::new(config.allocation.clone()).map_err(EngineError::from)?;

    // 4. Generate the world.
    let world = scenario::build_world(&config.world, &config.harness);
    let mut state = SimulationState::new(clock, world, allocator);
    let mut executor = StubExecutor::from_config(&config.harness);

    // 5. Create operator state.
    let operator = Arc::new(OperatorState::new(
        config.world.tick_interval_ms,
        &config.simulation,
    ));
    {
        let operator = Arc::clone(&operator);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping after the current tick");
                    operator.request_stop();
                }
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
            }
        });
    }

    // 6. Run the simulation.
    let mut callback = ProgressCallback::new(config.logging.progress_interval_ticks);
    let result = runner::run_simulation(&mut state, &mut executor, &operator, &mut callback)
        .await
        .map_err(EngineError::from)?;

    // 7. Log results and print the report.
    runner::log_simulation_end(&result);

    let report = RunReport {
        world: &config.world.name,
        seed: config.world.seed,
        end_reason: result.end_reason,
        total_ticks: result.total_ticks,
        suspended_ticks: result.suspended_ticks,
        simulated_seconds: state.clock.elapsed().as_secs_f64(),
        starved_peak: callback.starved_peak(),
        final_tick: result.final_summary.as_ref(),
    };
    let json = serde_json::to_string_pretty(&report).map_err(EngineError::from)?;
    println!("{json}");

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "quarry-engine shutdown complete"
    );

    Ok(())
}

/// Load the simulation configuration.
///
/// Reads `QUARRY_CONFIG` if set, otherwise `quarry-config.yaml` in the
/// working directory. A missing default file falls back to defaults.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let (path, explicit) = match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => (PathBuf::from(path), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    if explicit || path.exists() {
        Ok(SimulationConfig::from_file(&path)?)
    } else {
        let mut config = SimulationConfig::default();
        config.logging.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global `tracing` subscriber.
///
/// `logging.level` is an `EnvFilter` directive; an unparsable directive
/// falls back to `info`.
fn init_logging(config: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}
