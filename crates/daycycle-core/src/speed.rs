//! Piecewise time-speed model.
//!
//! Maps `(time, sleep state, config)` to a speed multiplier, where `1.0`
//! means one tick of world time per simulation step. The function is pure:
//! the controller evaluates it at the current time and again at a
//! look-ahead time when correcting for breakpoints, and both calls must
//! agree for the same inputs.
//!
//! Three regimes apply, in order:
//!
//! 1. Nobody asleep (or the sleep feature off): `day_speed` between
//!    `day_start` (inclusive) and `night_start`, `night_speed` otherwise.
//! 2. Everybody asleep and an all-asleep override configured: the override.
//! 3. Otherwise: a sigmoid-weighted blend between `sleep_speed_min` and
//!    `sleep_speed_max` driven by the sleep ratio.

use crate::sleep::SleepTracker;
use crate::time::TimeValue;

/// Immutable speed parameters for one world.
///
/// Produced from validated configuration; the model does not re-check
/// ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedConfig {
    /// Multiplier while it is day and nobody sleeps.
    pub day_speed: f64,
    /// Multiplier while it is night and nobody sleeps.
    pub night_speed: f64,
    /// Multiplier at a sleep ratio of zero.
    pub sleep_speed_min: f64,
    /// Multiplier at a sleep ratio of one.
    pub sleep_speed_max: f64,
    /// Steepness of the sleep-ratio sigmoid, in `[0, 1]`.
    pub sleep_speed_curve: f64,
    /// Exact multiplier to use when everyone is asleep, if set.
    pub sleep_speed_all: Option<f64>,
    /// Time-of-day at which the day regime starts.
    pub day_start: TimeValue,
    /// Time-of-day at which the night regime starts.
    pub night_start: TimeValue,
    /// Whether sleeping participants influence speed at all.
    pub sleep_enabled: bool,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            day_speed: 1.0,
            night_speed: 1.0,
            sleep_speed_min: 1.0,
            sleep_speed_max: 120.0,
            sleep_speed_curve: 0.3334,
            sleep_speed_all: None,
            day_start: TimeValue::from_ticks(0),
            night_start: TimeValue::from_ticks(12_000),
            sleep_enabled: true,
        }
    }
}

/// Evaluates the speed multiplier for a world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedModel {
    config: SpeedConfig,
}

impl SpeedModel {
    /// Create a model over a configuration snapshot.
    pub const fn new(config: SpeedConfig) -> Self {
        Self { config }
    }

    /// The configuration this model evaluates.
    pub const fn config(&self) -> &SpeedConfig {
        &self.config
    }

    /// Whether sleeping participants currently drive the speed.
    pub fn sleep_regime(&self, sleep: &SleepTracker) -> bool {
        self.config.sleep_enabled && !sleep.all_awake()
    }

    /// Whether `time` falls in the day segment `[day_start, night_start)`.
    pub fn is_day(&self, time: TimeValue) -> bool {
        let time_of_day = time.time_of_day();
        time_of_day == self.config.day_start.time_of_day()
            || time_of_day.between_mod(self.config.day_start, self.config.night_start)
    }

    /// Speed multiplier at `time` given the current sleep state.
    pub fn speed(&self, time: TimeValue, sleep: &SleepTracker) -> f64 {
        if !self.sleep_regime(sleep) {
            return if self.is_day(time) {
                self.config.day_speed
            } else {
                self.config.night_speed
            };
        }

        if let Some(all) = self.config.sleep_speed_all.filter(|_| sleep.all_asleep()) {
            return all;
        }

        let weight = normalized_tunable_sigmoid(sleep.ratio(), self.config.sleep_speed_curve);
        lerp(weight, self.config.sleep_speed_min, self.config.sleep_speed_max)
    }
}

/// Odd, monotonic sigmoid over `[0, 1]` centred on `(0.5, 0.5)`.
///
/// `curve = 0` is the identity; larger values steepen the middle, and
/// `curve = 1` degenerates to a step at `0.5`. Inputs outside `[0, 1]` are
/// clamped.
pub fn normalized_tunable_sigmoid(ratio: f64, curve: f64) -> f64 {
    let x = ratio.clamp(0.0, 1.0).mul_add(2.0, -1.0);
    if x.abs() < f64::EPSILON {
        return 0.5;
    }

    // Tunable sigmoid y = (x - xk) / (k - 2k|x| + 1) with k in [-1, 0].
    let k = -curve.clamp(0.0, 1.0);
    let y = x.mul_add(-k, x) / (-2.0 * k).mul_add(x.abs(), k + 1.0);

    (y.mul_add(0.5, 0.5)).clamp(0.0, 1.0)
}

/// Linear interpolation from `from` (weight 0) to `to` (weight 1).
pub fn lerp(weight: f64, from: f64, to: f64) -> f64 {
    weight.mul_add(to - from, from)
}
