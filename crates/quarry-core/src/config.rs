//! Configuration loading and typed config structures for the Quarry harness.
//!
//! The canonical configuration lives in `quarry-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//!
//! The `allocation` section deserializes straight into
//! [`AllocationConfig`]; it is validated on load so that a bad tuning value
//! fails at startup rather than on the first tick.

use std::path::Path;
use std::time::Duration;

use quarry_alloc::{AllocError, AllocationConfig};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Environment variable that overrides `logging.level`.
pub const LOG_ENV_VAR: &str = "QUARRY_LOG";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The allocation section failed validation.
    #[error("invalid allocation section: {source}")]
    Allocation {
        /// The underlying validation error.
        #[from]
        source: AllocError,
    },

    /// A harness or world value is out of range.
    #[error("invalid config: {reason}")]
    Invalid {
        /// Which value is wrong and why.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `quarry-config.yaml`. All fields have
/// defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (name, seed, timing, extent).
    #[serde(default)]
    pub world: WorldConfig,

    /// Allocation tuning.
    #[serde(default)]
    pub allocation: AllocationConfig,

    /// Synthetic world and stub movement parameters.
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulation boundary parameters.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `QUARRY_LOG` overrides `logging.level` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, and a
    /// validation error if any section is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or a
    /// validation error if any section is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.logging.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check every section for consistency.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.allocation.validate()?;
        if self.world.tick_duration_ms == 0 {
            return Err(invalid("world.tick_duration_ms must be at least 1"));
        }
        if !(self.world.width > 0.0 && self.world.height > 0.0) {
            return Err(invalid("world.width and world.height must be positive"));
        }
        if !(self.harness.worker_speed > 0.0 && self.harness.worker_speed.is_finite()) {
            return Err(invalid("harness.worker_speed must be a finite, positive number"));
        }
        if !(0.0..=1.0).contains(&self.harness.hauler_share) {
            return Err(invalid("harness.hauler_share must be within 0..=1"));
        }
        if self.harness.carry_min > self.harness.carry_max {
            return Err(invalid("harness.carry_min must not exceed harness.carry_max"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for the synthetic world.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Real-time milliseconds the runner sleeps between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated milliseconds per tick; claim TTLs are measured against it.
    #[serde(default = "default_tick_duration_ms")]
    pub tick_duration_ms: u64,

    /// Extent of the map along x.
    #[serde(default = "default_extent")]
    pub width: f32,

    /// Extent of the map along y.
    #[serde(default = "default_extent")]
    pub height: f32,
}

impl WorldConfig {
    /// Simulated duration of one tick.
    pub const fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_duration_ms)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            tick_duration_ms: default_tick_duration_ms(),
            width: default_extent(),
            height: default_extent(),
        }
    }
}

/// Synthetic world and stub movement configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HarnessConfig {
    /// Number of workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: u32,

    /// Fraction of workers that are haulers; the rest gather at nodes.
    #[serde(default = "default_hauler_share")]
    pub hauler_share: f64,

    /// Number of resource nodes.
    #[serde(default = "default_node_count")]
    pub node_count: u32,

    /// Number of ordinary piles.
    #[serde(default = "default_pile_count")]
    pub pile_count: u32,

    /// Number of piles holding a single heavy item.
    #[serde(default = "default_heavy_pile_count")]
    pub heavy_pile_count: u32,

    /// Mass of each heavy item.
    #[serde(default = "default_heavy_item_mass")]
    pub heavy_item_mass: Decimal,

    /// Work units in each node.
    #[serde(default = "default_node_amount")]
    pub node_amount: u32,

    /// Upper bound of work units in an ordinary pile.
    #[serde(default = "default_pile_amount")]
    pub pile_amount: u32,

    /// Lowest personal carry stat handed to a worker.
    #[serde(default = "default_carry_min")]
    pub carry_min: u32,

    /// Highest personal carry stat handed to a worker.
    #[serde(default = "default_carry_max")]
    pub carry_max: u32,

    /// Distance a worker covers per tick.
    #[serde(default = "default_worker_speed")]
    pub worker_speed: f32,

    /// Work units a worker drains from its source per tick.
    #[serde(default = "default_work_rate")]
    pub work_rate: u32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            hauler_share: default_hauler_share(),
            node_count: default_node_count(),
            pile_count: default_pile_count(),
            heavy_pile_count: default_heavy_pile_count(),
            heavy_item_mass: default_heavy_item_mass(),
            node_amount: default_node_amount(),
            pile_amount: default_pile_amount(),
            carry_min: default_carry_min(),
            carry_max: default_carry_max(),
            worker_speed: default_worker_speed(),
            work_rate: default_work_rate(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Log a progress line every N ticks (0 = never).
    #[serde(default = "default_progress_interval_ticks")]
    pub progress_interval_ticks: u64,
}

impl LoggingConfig {
    /// Override the level with `QUARRY_LOG` when it is set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(LOG_ENV_VAR) {
            self.level = val;
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            progress_interval_ticks: default_progress_interval_ticks(),
        }
    }
}

/// Simulation boundary configuration.
///
/// Controls when the run ends. A value of 0 for either `max_ticks` or
/// `max_real_time_seconds` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Maximum number of recorded ticks (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Maximum wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,

    /// End the run once every source is exhausted and no ticket is live.
    #[serde(default = "default_true")]
    pub stop_when_exhausted: bool,
}

impl Default for SimulationBoundsConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            max_real_time_seconds: 0,
            stop_when_exhausted: default_true(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    String::from("Quarry")
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_tick_duration_ms() -> u64 {
    500
}

const fn default_extent() -> f32 {
    64.0
}

const fn default_worker_count() -> u32 {
    12
}

const fn default_hauler_share() -> f64 {
    0.5
}

const fn default_node_count() -> u32 {
    6
}

const fn default_pile_count() -> u32 {
    10
}

const fn default_heavy_pile_count() -> u32 {
    2
}

const fn default_heavy_item_mass() -> Decimal {
    Decimal::from_parts(240, 0, 0, false, 0)
}

const fn default_node_amount() -> u32 {
    40
}

const fn default_pile_amount() -> u32 {
    20
}

const fn default_carry_min() -> u32 {
    80
}

const fn default_carry_max() -> u32 {
    130
}

const fn default_worker_speed() -> f32 {
    2.0
}

const fn default_work_rate() -> u32 {
    4
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_progress_interval_ticks() -> u64 {
    50
}

const fn default_max_ticks() -> u64 {
    1000
}

const fn default_true() -> bool {
    true
}
