//! Authoritative time integration for one world.
//!
//! The [`TimeController`] is the only writer of a world's time. Once per
//! simulation step it:
//!
//! 1. evaluates the speed model at the current time,
//! 2. corrects the step so it does not cross a speed breakpoint at the
//!    wrong rate,
//! 3. applies the delta and dispatches catch-up effects,
//! 4. runs the wake transition if a sleep cycle reached morning,
//! 5. folds the counter back if it passed the overflow threshold,
//! 6. broadcasts the result to every observer, and
//! 7. cancels the host's own one-tick increment for the step.
//!
//! The integer part of the time lives in the host world; the controller
//! keeps the fractional accumulator alongside it.

use chrono::Utc;
use daycycle_types::{SleepCycleComplete, TimeSnapshot, WorldId};
use tracing::{debug, warn};

use crate::effects::{EffectRegistry, TimeContext};
use crate::host::{DayClock, Level, ObserverFanout};
use crate::sleep::SleepTracker;
use crate::speed::SpeedModel;
use crate::time::TimeValue;

/// What happened during one controller step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Authoritative time after the step (after any overflow fold).
    pub time: TimeValue,
    /// Time applied during the step, after breakpoint correction.
    pub delta: TimeValue,
    /// Whole ticks crossed during the step.
    pub elapsed_whole_ticks: u64,
    /// Present when a sleep cycle completed during this step.
    pub sleep_cycle: Option<SleepCycleComplete>,
    /// Snapshots delivered.
    pub delivered: u32,
    /// Snapshot sends that failed.
    pub failed: u32,
}

/// Owns and advances the authoritative time of one world.
#[derive(Debug, Clone)]
pub struct TimeController {
    world: WorldId,
    derived: Vec<WorldId>,
    speed: SpeedModel,
    sleep: SleepTracker,
    fraction: f64,
    clear_weather_on_wake: bool,
}

impl TimeController {
    /// Create a controller for `world`.
    pub const fn new(world: WorldId, speed: SpeedModel, clear_weather_on_wake: bool) -> Self {
        Self {
            world,
            derived: Vec::new(),
            speed,
            sleep: SleepTracker::new(),
            fraction: 0.0,
            clear_weather_on_wake,
        }
    }

    /// The world this controller owns.
    pub const fn world(&self) -> &WorldId {
        &self.world
    }

    /// The speed model in use.
    pub const fn speed_model(&self) -> &SpeedModel {
        &self.speed
    }

    /// Sleep state of the world.
    pub const fn sleep(&self) -> &SleepTracker {
        &self.sleep
    }

    /// Mutable sleep state, for the host's sleep and wake events.
    pub const fn sleep_mut(&mut self) -> &mut SleepTracker {
        &mut self.sleep
    }

    /// Attach a derived world that shares this clock.
    pub fn attach_derived(&mut self, world: WorldId) {
        if world != self.world && !self.derived.contains(&world) {
            self.derived.push(world);
        }
    }

    /// Detach a derived world.
    pub fn detach_derived(&mut self, world: &WorldId) {
        self.derived.retain(|w| w != world);
    }

    /// Whether this controller's clock governs `world`.
    pub fn manages(&self, world: &WorldId) -> bool {
        *world == self.world || self.derived.contains(world)
    }

    /// Current time: the host's tick count plus the local fraction.
    pub fn day_time<C: DayClock + ?Sized>(&self, level: &C) -> TimeValue {
        TimeValue::new(level.day_time(), self.fraction)
    }

    /// Set the time, storing the whole part in the host and keeping the
    /// fraction locally. Returns `time`.
    pub fn set_day_time<C: DayClock + ?Sized>(&mut self, level: &mut C, time: TimeValue) -> TimeValue {
        self.fraction = time.fraction();
        level.set_day_time(time.ticks());
        time
    }

    /// The time to elapse this step from `time`, corrected for breakpoints.
    ///
    /// While nobody sleeps, a step that would carry time-of-day across
    /// `night_start` or `day_start` is split there: the part before the
    /// breakpoint runs at the current speed and the remaining share of the
    /// step runs at the speed past the breakpoint. While the sleep regime
    /// is active the same split is made at the morning boundary, with the
    /// remainder at `day_speed`.
    pub fn corrected_delta(&self, time: TimeValue) -> TimeValue {
        let raw = self.speed.speed(time, &self.sleep);
        let delta = TimeValue::from_f64(raw);
        if raw <= 0.0 {
            return delta;
        }

        let config = self.speed.config();

        if self.speed.sleep_regime(&self.sleep) {
            let until_morning = TimeValue::DAY.saturating_sub(time.time_of_day());
            if until_morning < delta {
                return split_at_breakpoint(until_morning, raw, config.day_speed);
            }
            return delta;
        }

        let next = time.saturating_add(delta);
        for breakpoint in [config.night_start, config.day_start] {
            if breakpoint.between_mod(time, next) {
                let until = time.until_mod(breakpoint);
                let next_speed = self.speed.speed(next, &self.sleep);
                return split_at_breakpoint(until, raw, next_speed);
            }
        }

        delta
    }

    /// Advance the world by one simulation step.
    ///
    /// Returns `None` without touching anything when the world's
    /// daylight-cycle rule is off.
    pub fn step(
        &mut self,
        level: &mut dyn Level,
        effects: &mut EffectRegistry,
        fanout: &mut dyn ObserverFanout,
    ) -> Option<StepOutcome> {
        if !level.daylight_cycle_enabled() {
            return None;
        }

        let old = self.day_time(level);
        let delta = self.corrected_delta(old);
        let new = self.set_day_time(level, old.saturating_add(delta));
        let elapsed_whole_ticks = u64::try_from(new.ticks().saturating_sub(old.ticks())).unwrap_or(0);

        let mut context = TimeContext {
            world: &self.world,
            time: new,
            delta,
            elapsed_whole_ticks,
            sleep: &self.sleep,
            level: &mut *level,
        };
        effects.dispatch(&mut context);

        let sleep_cycle = if self.speed.sleep_regime(&self.sleep) && TimeValue::crossed_morning(old, new) {
            Some(self.finish_sleep_cycle(level))
        } else {
            None
        };

        let folded = self.day_time(level).fold_overflow();
        self.set_day_time(level, folded);

        let (delivered, failed) = self.broadcast(folded.ticks(), fanout);

        // The host adds one tick after this step; take it back up front.
        level.set_day_time(folded.ticks().saturating_sub(1));

        Some(StepOutcome {
            time: folded,
            delta,
            elapsed_whole_ticks,
            sleep_cycle,
            delivered,
            failed,
        })
    }

    /// Send the authoritative tick count to every observer of this world
    /// and of its derived worlds. Returns `(delivered, failed)`.
    pub fn broadcast(&self, time_ticks: i64, fanout: &mut dyn ObserverFanout) -> (u32, u32) {
        let snapshot = TimeSnapshot { time_ticks };
        let mut delivered: u32 = 0;
        let mut failed: u32 = 0;

        for world in core::iter::once(&self.world).chain(&self.derived) {
            for observer in fanout.observers_of(world) {
                match fanout.send(observer, &snapshot) {
                    Ok(()) => delivered = delivered.saturating_add(1),
                    Err(e) => {
                        warn!(world = %world, observer = %observer, error = %e, "Time snapshot send failed");
                        failed = failed.saturating_add(1);
                    }
                }
            }
        }

        (delivered, failed)
    }

    fn finish_sleep_cycle(&mut self, level: &mut dyn Level) -> SleepCycleComplete {
        let time_ticks = level.day_time();
        let sleepers = self.sleep.sleeper_count();

        self.sleep.remove_all_sleepers();
        level.wake_up_all_participants();

        let weather_cleared = self.clear_weather_on_wake && level.weather_cycle_enabled();
        if weather_cleared {
            level.stop_weather();
        }

        debug!(world = %self.world, time = time_ticks, sleepers, weather_cleared, "Sleep cycle complete");

        SleepCycleComplete {
            world: self.world.clone(),
            time_ticks,
            sleepers,
            weather_cleared,
            completed_at: Utc::now(),
        }
    }
}

/// Split a step of `raw` ticks at a breakpoint `until` ahead.
///
/// The share of the step left after reaching the breakpoint is replayed at
/// `next_speed`.
fn split_at_breakpoint(until: TimeValue, raw: f64, next_speed: f64) -> TimeValue {
    let remaining_share = 1.0 - until.as_f64() / raw;
    until.add_f64(next_speed * remaining_share)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use daycycle_types::{EffectCondition, ParticipantId};
    use proptest::prelude::*;

    use super::*;
    use crate::config::SimulationConfig;
    use crate::host::TransportError;
    use crate::speed::SpeedConfig;
    use crate::time::{DAY_LENGTH, OVERFLOW_THRESHOLD};

    #[derive(Debug)]
    struct TestLevel {
        time: i64,
        daylight: bool,
        weather_rule: bool,
        raining: bool,
        block_entity_steps: u64,
        wake_calls: u32,
    }

    impl TestLevel {
        fn at(time: i64) -> Self {
            Self {
                time,
                daylight: true,
                weather_rule: true,
                raining: true,
                block_entity_steps: 0,
                wake_calls: 0,
            }
        }

        /// The host's own per-step increment.
        fn host_tick(&mut self) {
            self.time += 1;
        }
    }

    impl DayClock for TestLevel {
        fn day_time(&self) -> i64 {
            self.time
        }
        fn set_day_time(&mut self, ticks: i64) {
            self.time = ticks;
        }
        fn daylight_cycle_enabled(&self) -> bool {
            self.daylight
        }
    }

    impl Level for TestLevel {
        fn weather_cycle_enabled(&self) -> bool {
            self.weather_rule
        }
        fn stop_weather(&mut self) {
            self.raining = false;
        }
        fn tick_block_entities(&mut self) {
            self.block_entity_steps += 1;
        }
        fn wake_up_all_participants(&mut self) {
            self.wake_calls += 1;
        }
    }

    #[derive(Default)]
    struct TestFanout {
        observers: Vec<(WorldId, ParticipantId)>,
        disconnected: Vec<ParticipantId>,
        sent: Vec<(ParticipantId, i64)>,
    }

    impl ObserverFanout for TestFanout {
        fn observers_of(&self, world: &WorldId) -> Vec<ParticipantId> {
            self.observers
                .iter()
                .filter(|(w, _)| w == world)
                .map(|(_, p)| *p)
                .collect()
        }

        fn send(&mut self, observer: ParticipantId, snapshot: &TimeSnapshot) -> Result<(), TransportError> {
            if self.disconnected.contains(&observer) {
                return Err(TransportError::Disconnected { observer });
            }
            self.sent.push((observer, snapshot.time_ticks));
            Ok(())
        }
    }

    fn controller(config: SpeedConfig) -> TimeController {
        TimeController::new(WorldId::from("overworld"), SpeedModel::new(config), true)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn put_to_sleep(controller: &mut TimeController, participants: u32, sleepers: u32) {
        controller.sleep_mut().set_participants(participants);
        for _ in 0..sleepers {
            controller.sleep_mut().add_sleeper(ParticipantId::new());
        }
    }

    #[test]
    fn landing_exactly_on_night_start_is_not_split() {
        let ctl = controller(SpeedConfig {
            sleep_enabled: false,
            ..SpeedConfig::default()
        });
        let delta = ctl.corrected_delta(TimeValue::from_ticks(11_999));
        assert_eq!(delta, TimeValue::from_ticks(1));
    }

    #[test]
    fn step_reaches_boundary_and_compensates_host_increment() {
        let mut ctl = controller(SpeedConfig {
            sleep_enabled: false,
            ..SpeedConfig::default()
        });
        let mut level = TestLevel::at(11_999);
        let mut effects = EffectRegistry::new();
        let mut fanout = TestFanout::default();

        let outcome = ctl.step(&mut level, &mut effects, &mut fanout).unwrap();
        assert_eq!(outcome.time, TimeValue::from_ticks(12_000));
        assert_eq!(outcome.delta, TimeValue::from_ticks(1));
        assert_eq!(outcome.elapsed_whole_ticks, 1);

        level.host_tick();
        assert_eq!(level.time, 12_000);
    }

    #[test]
    fn day_to_night_split_uses_night_speed_for_remainder() {
        let ctl = controller(SpeedConfig {
            day_speed: 1.0,
            night_speed: 10.0,
            ..SpeedConfig::default()
        });
        let delta = ctl.corrected_delta(TimeValue::new(11_999, 0.5));
        // 0.5 at day speed, then the remaining half of the step at 10x.
        assert!(close(delta.as_f64(), 5.5));
        assert!(!close(delta.as_f64(), 1.0));
    }

    #[test]
    fn night_to_day_split_is_symmetric() {
        let ctl = controller(SpeedConfig {
            day_speed: 1.0,
            night_speed: 10.0,
            ..SpeedConfig::default()
        });
        let delta = ctl.corrected_delta(TimeValue::new(23_999, 0.5));
        // 0.5 at night speed (a 5% share of a 10-tick step), then 95% at 1x.
        assert!(close(delta.as_f64(), 0.5 + 0.95));

        let mirrored = controller(SpeedConfig {
            day_speed: 10.0,
            night_speed: 1.0,
            ..SpeedConfig::default()
        });
        let mirrored_delta = mirrored.corrected_delta(TimeValue::new(11_999, 0.5));
        assert!(close(mirrored_delta.as_f64(), delta.as_f64()));
    }

    #[test]
    fn post_step_time_stays_within_remainder_of_breakpoint() {
        let ctl = controller(SpeedConfig {
            day_speed: 3.0,
            night_speed: 7.0,
            ..SpeedConfig::default()
        });
        let start = TimeValue::new(11_998, 0.25);
        let delta = ctl.corrected_delta(start);
        let landed = start.saturating_add(delta).time_of_day();
        let until = start.until_mod(TimeValue::from_ticks(12_000));
        let remainder = 7.0 * (1.0 - until.as_f64() / 3.0);
        assert!(landed.as_f64() - 12_000.0 <= remainder + 1e-9);
    }

    #[test]
    fn zero_speed_skips_correction() {
        let mut ctl = controller(SpeedConfig {
            sleep_speed_all: Some(0.0),
            ..SpeedConfig::default()
        });
        put_to_sleep(&mut ctl, 1, 1);
        assert_eq!(ctl.corrected_delta(TimeValue::from_ticks(23_999)), TimeValue::ZERO);
    }

    #[test]
    fn sleep_override_is_split_at_morning() {
        let mut ctl = controller(SpeedConfig {
            sleep_speed_all: Some(30_000.0),
            ..SpeedConfig::default()
        });
        put_to_sleep(&mut ctl, 2, 2);
        let delta = ctl.corrected_delta(TimeValue::from_ticks(100));
        let expected = 23_900.0 + (1.0 - 23_900.0 / 30_000.0);
        assert!(close(delta.as_f64(), expected));
    }

    #[test]
    fn sleep_override_short_of_morning_is_unchanged() {
        let mut ctl = controller(SpeedConfig {
            sleep_speed_all: Some(100.0),
            ..SpeedConfig::default()
        });
        put_to_sleep(&mut ctl, 2, 2);
        assert_eq!(ctl.corrected_delta(TimeValue::from_ticks(100)), TimeValue::from_ticks(100));
        let near = ctl.corrected_delta(TimeValue::from_ticks(23_950));
        assert!(close(near.as_f64(), 50.5));
    }

    #[test]
    fn morning_wakes_everyone_and_clears_weather() {
        let mut ctl = controller(SpeedConfig {
            sleep_speed_all: Some(100.0),
            ..SpeedConfig::default()
        });
        put_to_sleep(&mut ctl, 2, 2);
        let mut level = TestLevel::at(23_950);
        let mut effects = EffectRegistry::with_builtin(EffectCondition::Sleeping);
        let mut fanout = TestFanout::default();

        let outcome = ctl.step(&mut level, &mut effects, &mut fanout).unwrap();
        let cycle = outcome.sleep_cycle.unwrap();
        assert_eq!(cycle.sleepers, 2);
        assert!(cycle.weather_cleared);
        assert_eq!(cycle.time_ticks, DAY_LENGTH);
        assert!(ctl.sleep().all_awake());
        assert_eq!(level.wake_calls, 1);
        assert!(!level.raining);
        // 50 whole ticks elapsed; the effect fills in the 49 the host skips.
        assert_eq!(outcome.elapsed_whole_ticks, 50);
        assert_eq!(level.block_entity_steps, 49);
    }

    #[test]
    fn weather_rule_off_keeps_weather() {
        let mut ctl = controller(SpeedConfig {
            sleep_speed_all: Some(100.0),
            ..SpeedConfig::default()
        });
        put_to_sleep(&mut ctl, 1, 1);
        let mut level = TestLevel::at(23_990);
        level.weather_rule = false;
        let outcome = ctl
            .step(&mut level, &mut EffectRegistry::new(), &mut TestFanout::default())
            .unwrap();
        assert!(!outcome.sleep_cycle.unwrap().weather_cleared);
        assert!(level.raining);
    }

    #[test]
    fn daylight_rule_off_is_a_no_op() {
        let mut ctl = controller(SpeedConfig::default());
        let mut level = TestLevel::at(500);
        level.daylight = false;
        let mut fanout = TestFanout::default();
        fanout.observers.push((WorldId::from("overworld"), ParticipantId::new()));

        let outcome = ctl.step(&mut level, &mut EffectRegistry::new(), &mut fanout);
        assert!(outcome.is_none());
        assert_eq!(level.time, 500);
        assert!(fanout.sent.is_empty());
    }

    #[test]
    fn fractional_speed_accumulates_across_steps() {
        let mut ctl = controller(SpeedConfig {
            day_speed: 0.25,
            ..SpeedConfig::default()
        });
        let mut level = TestLevel::at(1_000);
        let mut effects = EffectRegistry::new();
        let mut fanout = TestFanout::default();

        for _ in 0..8 {
            ctl.step(&mut level, &mut effects, &mut fanout);
            level.host_tick();
        }
        assert_eq!(level.time, 1_002);
        assert!(close(ctl.day_time(&level).fraction(), 0.0));
    }

    #[test]
    fn set_then_get_round_trips_fraction() {
        let mut ctl = controller(SpeedConfig::default());
        let mut level = TestLevel::at(0);
        let t = TimeValue::new(4_321, 0.625);
        ctl.set_day_time(&mut level, t);
        assert_eq!(ctl.day_time(&level), t);
    }

    #[test]
    fn overflow_is_folded_before_broadcast() {
        let mut ctl = controller(SpeedConfig {
            day_speed: 10.0,
            night_speed: 10.0,
            ..SpeedConfig::default()
        });
        let mut level = TestLevel::at(OVERFLOW_THRESHOLD - 5);
        let observer = ParticipantId::new();
        let mut fanout = TestFanout::default();
        fanout.observers.push((WorldId::from("overworld"), observer));

        let outcome = ctl.step(&mut level, &mut EffectRegistry::new(), &mut fanout).unwrap();
        assert_eq!(outcome.time, TimeValue::from_ticks(5));
        assert_eq!(fanout.sent, vec![(observer, 5)]);
        assert_eq!(
            TimeValue::from_ticks(OVERFLOW_THRESHOLD + 5).time_of_day(),
            outcome.time.time_of_day()
        );
    }

    #[test]
    fn failed_send_does_not_stop_other_observers() {
        let mut ctl = controller(SpeedConfig::default());
        ctl.attach_derived(WorldId::from("the_nether"));
        let gone = ParticipantId::new();
        let here = ParticipantId::new();
        let below = ParticipantId::new();
        let mut fanout = TestFanout::default();
        fanout.observers.push((WorldId::from("overworld"), gone));
        fanout.observers.push((WorldId::from("overworld"), here));
        fanout.observers.push((WorldId::from("the_nether"), below));
        fanout.observers.push((WorldId::from("the_end"), ParticipantId::new()));
        fanout.disconnected.push(gone);

        let mut level = TestLevel::at(10);
        let outcome = ctl.step(&mut level, &mut EffectRegistry::new(), &mut fanout).unwrap();
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(fanout.sent, vec![(here, 11), (below, 11)]);
    }

    #[test]
    fn derived_worlds_are_managed() {
        let mut ctl = controller(SpeedConfig::default());
        let nether = WorldId::from("the_nether");
        ctl.attach_derived(nether.clone());
        ctl.attach_derived(nether.clone());
        assert!(ctl.manages(&nether));
        ctl.detach_derived(&nether);
        assert!(!ctl.manages(&nether));
        assert!(ctl.manages(&WorldId::from("overworld")));
    }

    #[test]
    fn disabled_sleep_feature_still_corrects_breakpoints() {
        let mut ctl = controller(SpeedConfig {
            day_speed: 1.0,
            night_speed: 10.0,
            sleep_enabled: false,
            ..SpeedConfig::default()
        });
        put_to_sleep(&mut ctl, 2, 1);
        let delta = ctl.corrected_delta(TimeValue::new(11_999, 0.5));
        assert!(close(delta.as_f64(), 5.5));
    }

    /// Ticks on the shorter arc between two breakpoints, as a speed.
    fn shorter_arc(day_start: u16, night_start: u16) -> f64 {
        let gap = (i64::from(night_start) - i64::from(day_start)).rem_euclid(DAY_LENGTH);
        let arc = gap.min(DAY_LENGTH - gap);
        f64::from(u16::try_from(arc).unwrap())
    }

    proptest! {
        #[test]
        fn validated_speeds_cross_at_most_one_breakpoint(
            day_start in 0u16..24_000,
            night_start in 0u16..24_000,
            day_share in 0.001f64..=1.0,
            night_share in 0.001f64..=1.0,
            start in 0i64..(4 * DAY_LENGTH),
            thousandths in 0u16..1_000,
        ) {
            prop_assume!(day_start != night_start);
            let arc = shorter_arc(day_start, night_start);

            let mut config = SimulationConfig::default();
            config.time.day_start = i64::from(day_start);
            config.time.night_start = i64::from(night_start);
            config.time.day_speed = day_share * arc;
            config.time.night_speed = night_share * arc;
            config.sleep.enabled = false;
            prop_assert!(config.validate().is_ok(), "{:?}", config.validate());

            let ctl = controller(config.speed_config());
            let speed = ctl.speed_model().config();
            let time = TimeValue::new(start, f64::from(thousandths) / 1_000.0);
            let delta = ctl.corrected_delta(time);
            let landed = time.saturating_add(delta);

            prop_assert!(delta > TimeValue::ZERO);
            prop_assert!(delta.as_f64() <= speed.day_speed.max(speed.night_speed) + 1e-9);

            let crossed: Vec<TimeValue> = [speed.night_start, speed.day_start]
                .into_iter()
                .filter(|breakpoint| breakpoint.between_mod(time, landed))
                .collect();
            prop_assert!(crossed.len() <= 1, "{time} + {delta} crossed {crossed:?}");

            // The remainder of a split step runs in the regime past the breakpoint.
            if let Some(breakpoint) = crossed.first() {
                let into_day = *breakpoint == speed.day_start;
                prop_assert_eq!(ctl.speed_model().is_day(landed), into_day);
            }
        }
    }
}
