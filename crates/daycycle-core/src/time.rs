//! Fixed tick counter with a fractional accumulator.
//!
//! [`TimeValue`] is the arithmetic primitive every other module works in.
//! The integer part is what the host world stores; the fractional part
//! lets speeds that are not whole numbers accumulate exactly across steps.
//!
//! # Invariants
//!
//! - The fractional part is always in `[0, 1)`. Every constructor and
//!   operator re-derives it from the remainder of the raw result, carrying
//!   whole units into the tick counter.
//! - Time-of-day is the tick counter reduced modulo [`DAY_LENGTH`]; it is
//!   always computed, never stored.
//! - Ordering is lexicographic over `(ticks, fraction)`.

use core::cmp::Ordering;
use core::ops::{Add, Sub};

/// Number of ticks in one full day/night cycle.
pub const DAY_LENGTH: i64 = 24_000;

/// Number of ticks in one full lunar cycle (eight days).
pub const LUNAR_CYCLE_LENGTH: i64 = 8 * DAY_LENGTH;

/// Absolute tick count above which the counter is folded back.
///
/// The largest whole number of lunar cycles that still fits in an `i32`,
/// so subtracting it preserves time-of-day and moon phase.
pub const OVERFLOW_THRESHOLD: i64 = 11_184 * LUNAR_CYCLE_LENGTH;

/// Reduce a raw tick count to its time-of-day.
pub const fn tick_of_day(ticks: i64) -> i64 {
    ticks.rem_euclid(DAY_LENGTH)
}

/// A point in (or span of) simulation time: whole ticks plus a fraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeValue {
    ticks: i64,
    fraction: f64,
}

impl TimeValue {
    /// Tick zero with no fractional progress.
    pub const ZERO: Self = Self {
        ticks: 0,
        fraction: 0.0,
    };

    /// One full day.
    pub const DAY: Self = Self {
        ticks: DAY_LENGTH,
        fraction: 0.0,
    };

    /// Build a time from a tick count and an arbitrary fractional part.
    ///
    /// Whole units in `fraction` (including negative ones) are carried into
    /// the tick counter so the stored fraction lands in `[0, 1)`. A
    /// non-finite fraction is discarded.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(ticks: i64, fraction: f64) -> Self {
        if !fraction.is_finite() {
            return Self::from_ticks(ticks);
        }

        let whole = fraction.floor();
        let mut remainder = fraction - whole;
        let mut carry = whole as i64;

        // `x - floor(x)` rounds up to exactly 1.0 for tiny negative inputs.
        if remainder >= 1.0 {
            remainder = 0.0;
            carry = carry.saturating_add(1);
        }

        Self {
            ticks: ticks.saturating_add(carry),
            fraction: remainder,
        }
    }

    /// Build a time with no fractional part.
    pub const fn from_ticks(ticks: i64) -> Self {
        Self {
            ticks,
            fraction: 0.0,
        }
    }

    /// Build a time from a floating-point tick count.
    pub fn from_f64(value: f64) -> Self {
        Self::new(0, value)
    }

    /// Whole ticks (the floor of this time).
    pub const fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Fractional progress into the next tick, in `[0, 1)`.
    pub const fn fraction(&self) -> f64 {
        self.fraction
    }

    /// This time as a single floating-point value.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        self.ticks as f64 + self.fraction
    }

    /// This time reduced modulo [`DAY_LENGTH`], keeping the fraction.
    #[must_use]
    pub const fn time_of_day(self) -> Self {
        Self {
            ticks: tick_of_day(self.ticks),
            fraction: self.fraction,
        }
    }

    /// Zero-based index of the day this time falls on.
    pub const fn day(self) -> i64 {
        self.ticks.div_euclid(DAY_LENGTH)
    }

    /// Ratio of this span to `divisor`.
    ///
    /// Callers must not pass a zero divisor; the result would be infinite
    /// or NaN.
    pub fn ratio_to(self, divisor: Self) -> f64 {
        self.as_f64() / divisor.as_f64()
    }

    /// Forward distance from this time-of-day to `target`'s time-of-day,
    /// wrapping across the day boundary. Always in `[0, DAY_LENGTH)`.
    #[must_use]
    pub fn until_mod(self, target: Self) -> Self {
        let distance = target.time_of_day().saturating_sub(self.time_of_day());
        if distance < Self::ZERO {
            distance.saturating_add(Self::DAY)
        } else {
            distance
        }
    }

    /// Whether this time-of-day lies strictly between `start` and `end`,
    /// modulo [`DAY_LENGTH`].
    ///
    /// When `start` is later in the day than `end` the interval wraps
    /// through midnight. Both endpoints are excluded, so a step that lands
    /// exactly on a boundary does not count as crossing it.
    pub fn between_mod(self, start: Self, end: Self) -> bool {
        let time = self.time_of_day();
        let start = start.time_of_day();
        let end = end.time_of_day();

        if start <= end {
            start < time && time < end
        } else {
            time > start || time < end
        }
    }

    /// Whether moving from `old` to `new` passed into a later day.
    pub const fn crossed_morning(old: Self, new: Self) -> bool {
        new.day() > old.day()
    }

    /// Fold the counter back by [`OVERFLOW_THRESHOLD`] once it exceeds it.
    ///
    /// The threshold is a whole number of lunar cycles, so time-of-day and
    /// every cycle-relative phase are unchanged.
    #[must_use]
    pub const fn fold_overflow(self) -> Self {
        if self.ticks > OVERFLOW_THRESHOLD {
            Self {
                ticks: self.ticks.saturating_sub(OVERFLOW_THRESHOLD),
                fraction: self.fraction,
            }
        } else {
            self
        }
    }

    /// Sum of two times. The tick counter saturates at the `i64` bounds.
    #[must_use]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self::new(self.ticks.saturating_add(rhs.ticks), self.fraction + rhs.fraction)
    }

    /// Difference of two times. The tick counter saturates at the `i64`
    /// bounds.
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self::new(self.ticks.saturating_sub(rhs.ticks), self.fraction - rhs.fraction)
    }

    /// This time advanced by a floating-point number of ticks.
    #[must_use]
    pub fn add_f64(self, ticks: f64) -> Self {
        self.saturating_add(Self::from_f64(ticks))
    }
}

impl PartialEq for TimeValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeValue {}

impl PartialOrd for TimeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ticks
            .cmp(&other.ticks)
            .then_with(|| self.fraction.total_cmp(&other.fraction))
    }
}

impl Add for TimeValue {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }
}

impl Add<f64> for TimeValue {
    type Output = Self;

    fn add(self, rhs: f64) -> Self {
        self.add_f64(rhs)
    }
}

impl Sub for TimeValue {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }
}

impl From<i64> for TimeValue {
    fn from(ticks: i64) -> Self {
        Self::from_ticks(ticks)
    }
}

impl core::fmt::Display for TimeValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}+{:.4}", self.ticks, self.fraction)
    }
}
