//! Configuration loading and typed config structures for Daycycle.
//!
//! The canonical configuration lives in `daycycle.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure, a loader
//! that reads the file, and a validation pass. Every field has a default,
//! so an empty document is a valid configuration.

use std::collections::BTreeSet;
use std::path::Path;

use daycycle_types::{EffectCondition, WorldId};
use serde::Deserialize;

use crate::speed::SpeedConfig;
use crate::time::{DAY_LENGTH, TimeValue};

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

    /// A value is outside its allowed range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Day/night speeds and breakpoints.
    #[serde(default)]
    pub time: TimeConfig,

    /// Sleep-driven acceleration.
    #[serde(default)]
    pub sleep: SleepConfig,

    /// Catch-up effect conditions.
    #[serde(default)]
    pub effects: EffectsConfig,

    /// Which worlds are managed.
    #[serde(default)]
    pub worlds: WorldsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Parameters for the headless engine host.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SimulationConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every range the controller relies on.
    ///
    /// Day and night speeds are capped at the shorter arc between the two
    /// breakpoints so that a single step can cross at most one of them.
    /// Sleep speeds only split at morning and are capped at one day length.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("time.day_start", self.time.day_start),
            ("time.night_start", self.time.night_start),
        ] {
            if !(0..DAY_LENGTH).contains(&value) {
                return Err(invalid(format!("{name} must be in [0, {DAY_LENGTH}), got {value}")));
            }
        }

        if self.time.day_start == self.time.night_start {
            return Err(invalid("time.day_start and time.night_start must differ".to_owned()));
        }

        let arc = shorter_arc(self.time.day_start, self.time.night_start) as f64;
        for (name, value) in [
            ("time.day_speed", self.time.day_speed),
            ("time.night_speed", self.time.night_speed),
        ] {
            if !(value > 0.0 && value <= arc) {
                return Err(invalid(format!(
                    "{name} must be in (0, {arc}], the shorter arc between breakpoints, got {value}"
                )));
            }
        }

        let max_speed = DAY_LENGTH as f64;
        for (name, value) in [
            ("sleep.speed_min", self.sleep.speed_min),
            ("sleep.speed_max", self.sleep.speed_max),
        ] {
            if !(value >= 0.0 && value <= max_speed) {
                return Err(invalid(format!("{name} must be in [0, {max_speed}], got {value}")));
            }
        }

        if self.sleep.speed_all.is_nan() || self.sleep.speed_all > max_speed {
            return Err(invalid(format!(
                "sleep.speed_all must be at most {max_speed} (negative disables it), got {}",
                self.sleep.speed_all
            )));
        }

        if !(0.0..=1.0).contains(&self.sleep.speed_curve) {
            return Err(invalid(format!(
                "sleep.speed_curve must be in [0, 1], got {}",
                self.sleep.speed_curve
            )));
        }

        if self.engine.step_interval_ms == 0 || self.engine.frame_interval_ms == 0 {
            return Err(invalid("engine intervals must be at least 1 ms".to_owned()));
        }

        Ok(())
    }

    /// Speed parameters in the form the controller consumes.
    pub fn speed_config(&self) -> SpeedConfig {
        SpeedConfig {
            day_speed: self.time.day_speed,
            night_speed: self.time.night_speed,
            sleep_speed_min: self.sleep.speed_min,
            sleep_speed_max: self.sleep.speed_max,
            sleep_speed_curve: self.sleep.speed_curve,
            sleep_speed_all: (self.sleep.speed_all >= 0.0).then_some(self.sleep.speed_all),
            day_start: TimeValue::from_ticks(self.time.day_start),
            night_start: TimeValue::from_ticks(self.time.night_start),
            sleep_enabled: self.sleep.enabled,
        }
    }
}

const fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid { reason }
}

/// Ticks on the shorter of the two arcs between breakpoints already known
/// to lie in `[0, DAY_LENGTH)`.
const fn shorter_arc(day_start: i64, night_start: i64) -> i64 {
    let gap = night_start.saturating_sub(day_start).rem_euclid(DAY_LENGTH);
    let rest = DAY_LENGTH.saturating_sub(gap);
    if gap < rest { gap } else { rest }
}

/// Day/night speed and breakpoint configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeConfig {
    /// Speed multiplier during the day.
    #[serde(default = "default_speed")]
    pub day_speed: f64,

    /// Speed multiplier during the night.
    #[serde(default = "default_speed")]
    pub night_speed: f64,

    /// Time-of-day at which day begins.
    #[serde(default = "default_day_start")]
    pub day_start: i64,

    /// Time-of-day at which night begins.
    #[serde(default = "default_night_start")]
    pub night_start: i64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            day_speed: default_speed(),
            night_speed: default_speed(),
            day_start: default_day_start(),
            night_start: default_night_start(),
        }
    }
}

/// Sleep-driven acceleration configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SleepConfig {
    /// Whether sleeping participants speed time up.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Speed when the sleep ratio is zero.
    #[serde(default = "default_speed")]
    pub speed_min: f64,

    /// Speed when the sleep ratio is one.
    #[serde(default = "default_sleep_speed_max")]
    pub speed_max: f64,

    /// Steepness of the sleep-ratio curve, in `[0, 1]`.
    #[serde(default = "default_sleep_speed_curve")]
    pub speed_curve: f64,

    /// Exact speed when everyone sleeps. Negative disables the override.
    #[serde(default = "default_sleep_speed_all")]
    pub speed_all: f64,

    /// Whether weather is cleared when a sleep cycle ends.
    #[serde(default = "default_true")]
    pub clear_weather_on_wake: bool,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            speed_min: default_speed(),
            speed_max: default_sleep_speed_max(),
            speed_curve: default_sleep_speed_curve(),
            speed_all: default_sleep_speed_all(),
            clear_weather_on_wake: true,
        }
    }
}

/// Catch-up effect configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EffectsConfig {
    /// When extra block-entity steps run.
    #[serde(default)]
    pub block_entities: EffectCondition,
}

/// World selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorldsConfig {
    /// Worlds whose time is left entirely to the host.
    #[serde(default)]
    pub excluded: BTreeSet<WorldId>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Headless engine host parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Real-time milliseconds per simulation step.
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,

    /// Real-time milliseconds per observer render frame.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Steps to run before stopping.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Number of participants in the primary world.
    #[serde(default = "default_participants")]
    pub participants: u32,

    /// Seed for choosing who goes to bed.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Raw tick count the primary world starts at.
    #[serde(default = "default_start_time")]
    pub start_time: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            max_steps: default_max_steps(),
            participants: default_participants(),
            seed: default_seed(),
            start_time: default_start_time(),
        }
    }
}

const fn default_speed() -> f64 {
    1.0
}

const fn default_day_start() -> i64 {
    0
}

const fn default_night_start() -> i64 {
    12_000
}

const fn default_sleep_speed_max() -> f64 {
    120.0
}

const fn default_sleep_speed_curve() -> f64 {
    0.3334
}

const fn default_sleep_speed_all() -> f64 {
    -1.0
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_step_interval_ms() -> u64 {
    50
}

const fn default_frame_interval_ms() -> u64 {
    16
}

const fn default_max_steps() -> u64 {
    2_400
}

const fn default_participants() -> u32 {
    4
}

const fn default_seed() -> u64 {
    42
}

const fn default_start_time() -> i64 {
    11_000
}

const fn default_true() -> bool {
    true
}
