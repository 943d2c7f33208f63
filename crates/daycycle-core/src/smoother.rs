//! Observer-side smoothing of authoritative time updates.
//!
//! Observers receive one snapshot per simulation step but render many
//! frames in between. Applying snapshots directly makes the sky jump
//! whenever time runs fast or a sleep cycle ends. [`ClientSmoother`]
//! instead treats each snapshot as a new target and moves the displayed
//! time toward it every frame with a critically damped second-order
//! filter, so it settles within about one step and never overshoots.
//!
//! The host's networking layer writes snapshots straight into its local
//! clock. The smoother notices the change on the next frame, restores the
//! value it last displayed, and retargets.

use tracing::debug;

use crate::host::DayClock;
use crate::time::{DAY_LENGTH, tick_of_day};

/// Interpolation window, in simulation steps.
const SMOOTHING_DURATION: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Tracking,
}

/// Per-world critically damped interpolation filter.
#[derive(Debug, Clone)]
pub struct ClientSmoother {
    phase: Phase,
    target: i64,
    velocity: f64,
    last_time: i64,
    last_partial: f64,
}

impl Default for ClientSmoother {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSmoother {
    /// Create a smoother that initializes from the clock on its first frame.
    pub const fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
            target: 0,
            velocity: 0.0,
            last_time: 0,
            last_partial: 0.0,
        }
    }

    /// Whether the first frame has been processed.
    pub fn is_tracking(&self) -> bool {
        self.phase == Phase::Tracking
    }

    /// Latest authoritative time being approached.
    pub const fn target(&self) -> i64 {
        self.target
    }

    /// Current filter velocity, in ticks per step.
    pub const fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Time most recently written to the clock by this smoother.
    pub const fn displayed(&self) -> i64 {
        self.last_time
    }

    /// Process one render frame.
    ///
    /// `partial` is the fractional progress into the current simulation
    /// step, in `[0, 1)`.
    pub fn on_frame<C: DayClock + ?Sized>(&mut self, clock: &mut C, partial: f64) {
        if self.phase == Phase::Uninitialized {
            let time = clock.day_time();
            self.target = time;
            self.last_time = time;
            self.phase = Phase::Tracking;
        }

        let step_delta = self.partial_delta(partial);
        self.retarget(clock);
        self.interpolate(clock, step_delta);
    }

    /// Undo the host's own per-step increment. Call once at the end of
    /// every simulation step, not per frame.
    pub fn on_step_end<C: DayClock + ?Sized>(&self, clock: &mut C) {
        if clock.daylight_cycle_enabled() {
            clock.set_day_time(clock.day_time().saturating_sub(1));
        }
    }

    fn partial_delta(&mut self, partial: f64) -> f64 {
        let mut delta = partial - self.last_partial;
        if delta < 0.0 {
            delta += 1.0;
        }
        self.last_partial = partial;
        delta
    }

    /// Pick up a snapshot the host wrote since the last frame.
    fn retarget<C: DayClock + ?Sized>(&mut self, clock: &mut C) {
        let time = clock.day_time();
        if time == self.last_time {
            return;
        }

        self.target = time;

        if self.last_time.abs_diff(time) > DAY_LENGTH.unsigned_abs() {
            // Sweeping across whole days would be jarring; jump to the
            // target's day and smooth only the time-of-day difference.
            if let Some(aligned) = time
                .checked_sub(tick_of_day(time))
                .and_then(|day_start| day_start.checked_add(tick_of_day(self.last_time)))
            {
                debug!(from = self.last_time, to = aligned, target = time, "Re-aligned smoothed time");
                self.last_time = aligned;
            } else {
                debug!(target = time, "Re-alignment out of range, snapping to authoritative time");
                self.last_time = time;
                self.velocity = 0.0;
            }
        }

        clock.set_day_time(self.last_time);
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn interpolate<C: DayClock + ?Sized>(&mut self, clock: &mut C, step_delta: f64) {
        let time = clock.day_time();

        let omega = 2.0 / SMOOTHING_DURATION;
        let x = omega * step_delta;
        let exp = 1.0 / x.mul_add(x.mul_add(x.mul_add(0.235, 0.48), 1.0), 1.0);
        let change = time.saturating_sub(self.target) as f64;

        let temp = omega.mul_add(change, self.velocity) * step_delta;
        let mut next = self.target.saturating_add(((change + temp) * exp) as i64);
        self.velocity = (-omega).mul_add(temp, self.velocity) * exp;

        // Crossed the target: stop there.
        if (change < 0.0) == (next > self.target) {
            next = self.target;
            self.velocity = 0.0;
        }

        self.set_displayed(clock, next);
    }

    fn set_displayed<C: DayClock + ?Sized>(&mut self, clock: &mut C, time: i64) {
        clock.set_day_time(time);
        self.last_time = time;
    }
}
