//! Headless engine binary for the Daycycle time controller.
//!
//! Wires the core to an in-memory world, a broadcast fan-out and an
//! observer task, then runs a bounded simulation and logs a summary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from the path given as the first argument, or
//!    `daycycle.yaml` in the working directory, or defaults
//! 2. Initialize structured logging (tracing), honouring `RUST_LOG` and
//!    falling back to `logging.level`
//! 3. Run the simulation loop
//! 4. Log the result

mod error;
mod fanout;
mod observer;
mod sim_world;
mod simulation;

use std::path::{Path, PathBuf};

use daycycle_core::config::SimulationConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up when no path is given.
const DEFAULT_CONFIG_PATH: &str = "daycycle.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the simulation fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, loaded) = load_config(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("daycycle-engine starting");
    if loaded {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        day_speed = config.time.day_speed,
        night_speed = config.time.night_speed,
        sleep_enabled = config.sleep.enabled,
        sleep_speed_max = config.sleep.speed_max,
        excluded_worlds = config.worlds.excluded.len(),
        "Time configuration"
    );

    let result = simulation::run_simulation(&config).await?;
    simulation::log_simulation_end(&result);

    info!(steps = result.steps, "daycycle-engine shutdown complete");
    Ok(())
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist. The flag reports whether the file was read.
fn load_config(path: &Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        let config = SimulationConfig::from_file(path)?;
        Ok((config, true))
    } else {
        Ok((SimulationConfig::default(), false))
    }
}
