//! The bounded simulation loop.
//!
//! One primary world and one derived world are activated on a
//! [`WorldClocks`], a [`SimWorld`] stands in for the host level, and an
//! observer task is spawned on the fan-out channel. Each step the loop
//! puts a random subset of participants to bed at dusk, runs the
//! controller, and applies the host's own increment. When the step budget
//! is spent the channel is closed and the observer's report is collected.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use daycycle_core::config::SimulationConfig;
use daycycle_core::effects::{TimeContext, TimeEffect};
use daycycle_core::host::DayClock;
use daycycle_core::time::TimeValue;
use daycycle_core::worlds::WorldClocks;
use daycycle_types::{ParticipantId, WorldId, WorldKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::fanout::BroadcastFanout;
use crate::observer::{self, ObserverReport, ObserverTiming};
use crate::sim_world::SimWorld;

/// Key of the primary world.
pub const PRIMARY_WORLD: &str = "overworld";

/// Key of the world that follows the primary clock.
pub const DERIVED_WORLD: &str = "the_nether";

/// Chance that a new day starts with rain.
const RAIN_CHANCE: f64 = 0.3;

/// Totals for a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    /// Steps executed.
    pub steps: u64,
    /// Steps skipped because the daylight rule was off.
    pub idle_steps: u64,
    /// Authoritative time at the end of the run.
    pub final_time: TimeValue,
    /// Whole days between the start and the end of the run.
    pub days_elapsed: i64,
    /// Nights ended by sleeping.
    pub sleep_cycles: u32,
    /// Sleep cycles that also cleared rain.
    pub weather_cleared: u32,
    /// Block-entity steps run by the catch-up effect.
    pub block_entity_steps: u64,
    /// Ticks skipped past the host's own single tick, summed over steps.
    pub skipped_ticks: u64,
    /// Whether it was raining when the run ended.
    pub raining_at_end: bool,
    /// Snapshots delivered to observers.
    pub delivered: u64,
    /// Snapshot sends that failed.
    pub failed: u64,
    /// What the observer task saw.
    pub observer: ObserverReport,
}

/// Counts ticks the host did not simulate itself.
struct SkippedTicks {
    total: Arc<AtomicU64>,
}

impl TimeEffect for SkippedTicks {
    fn id(&self) -> &str {
        "skipped_ticks"
    }

    fn on_time_tick(&mut self, context: &mut TimeContext<'_>) {
        let skipped = context.elapsed_whole_ticks.saturating_sub(1);
        if skipped > 0 {
            self.total.fetch_add(skipped, Ordering::Relaxed);
        }
    }
}

/// Run the simulation described by `config` to completion.
///
/// # Errors
///
/// Returns [`EngineError`] if an effect cannot be registered, the primary
/// world is excluded, or the observer task fails.
#[allow(clippy::too_many_lines)]
pub async fn run_simulation(config: &SimulationConfig) -> Result<SimulationResult, EngineError> {
    let primary = WorldId::from(PRIMARY_WORLD);
    let derived = WorldId::from(DERIVED_WORLD);

    let mut clocks = WorldClocks::from_config(config);
    let skipped = Arc::new(AtomicU64::new(0));
    clocks.effects_mut().register(Box::new(SkippedTicks {
        total: Arc::clone(&skipped),
    }))?;

    if !clocks.on_world_activated(primary.clone(), WorldKind::Primary) {
        return Err(EngineError::Unmanaged {
            world: primary.to_string(),
        });
    }
    clocks.on_world_activated(derived.clone(), WorldKind::Derived {
        parent: primary.clone(),
    });

    let engine = &config.engine;
    let mut world = SimWorld::new(engine.participants, engine.start_time);
    clocks.set_participants(&primary, world.participant_count());

    let mut rng = StdRng::seed_from_u64(engine.seed);
    world.set_raining(rng.random_bool(RAIN_CHANCE));

    let mut fanout = BroadcastFanout::new();
    let observer_id = ParticipantId::new();
    fanout.attach(derived.clone(), observer_id);
    let timing = ObserverTiming {
        step: Duration::from_millis(engine.step_interval_ms),
        frame: Duration::from_millis(engine.frame_interval_ms),
    };
    let observer_task = tokio::spawn(observer::run(
        observer_id,
        derived,
        config.worlds.excluded.clone(),
        timing,
        fanout.subscribe(),
    ));

    info!(
        participants = world.participant_count(),
        start_time = engine.start_time,
        max_steps = engine.max_steps,
        step_interval_ms = engine.step_interval_ms,
        "Simulation starting"
    );

    let start = TimeValue::from_ticks(world.day_time());
    let mut result = SimulationResult {
        steps: 0,
        idle_steps: 0,
        final_time: start,
        days_elapsed: 0,
        sleep_cycles: 0,
        weather_cleared: 0,
        block_entity_steps: 0,
        skipped_ticks: 0,
        raining_at_end: false,
        delivered: 0,
        failed: 0,
        observer: ObserverReport::default(),
    };
    let mut last_bedtime: Option<i64> = None;
    let mut last_weather_day = start.day();

    let mut steps = tokio::time::interval(timing.step);
    steps.set_missed_tick_behavior(MissedTickBehavior::Delay);

    for _ in 0..engine.max_steps {
        steps.tick().await;

        let now = TimeValue::from_ticks(world.day_time());
        let Some(controller) = clocks.controller(&primary) else {
            return Err(EngineError::Unmanaged {
                world: primary.to_string(),
            });
        };

        if now.day() != last_weather_day {
            last_weather_day = now.day();
            world.set_raining(rng.random_bool(RAIN_CHANCE));
        }

        let night = !controller.speed_model().is_day(now);
        if night && last_bedtime != Some(now.day()) && controller.sleep().all_awake() {
            last_bedtime = Some(now.day());
            let sleepers = world.send_to_bed(&mut rng);
            debug!(time = now.ticks(), sleepers = sleepers.len(), "Participants went to bed");
            for sleeper in sleepers {
                clocks.on_participant_sleep(&primary, sleeper);
            }
        }

        result.steps = result.steps.saturating_add(1);
        match clocks.on_simulation_step(&primary, &mut world, &mut fanout) {
            Some(outcome) => {
                result.final_time = outcome.time;
                result.delivered = result.delivered.saturating_add(u64::from(outcome.delivered));
                result.failed = result.failed.saturating_add(u64::from(outcome.failed));
                if let Some(cycle) = outcome.sleep_cycle {
                    result.sleep_cycles = result.sleep_cycles.saturating_add(1);
                    if cycle.weather_cleared {
                        result.weather_cleared = result.weather_cleared.saturating_add(1);
                    }
                    info!(
                        time = cycle.time_ticks,
                        sleepers = cycle.sleepers,
                        weather_cleared = cycle.weather_cleared,
                        "Night skipped by sleeping"
                    );
                }
            }
            None => result.idle_steps = result.idle_steps.saturating_add(1),
        }

        world.host_tick();
    }

    if result.idle_steps == result.steps {
        result.final_time = TimeValue::from_ticks(world.day_time());
    }
    result.days_elapsed = result.final_time.day().saturating_sub(start.day());
    result.block_entity_steps = world.block_entity_steps();
    result.skipped_ticks = skipped.load(Ordering::Relaxed);
    result.raining_at_end = world.is_raining();

    drop(fanout);
    result.observer = observer_task.await?;

    if result.failed > 0 {
        warn!(failed = result.failed, "Some time snapshots were not delivered");
    }

    Ok(result)
}

/// Log the final summary of a run.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        steps = result.steps,
        idle_steps = result.idle_steps,
        final_time = %result.final_time,
        time_of_day = %result.final_time.time_of_day(),
        days_elapsed = result.days_elapsed,
        "Simulation ended"
    );

    info!(
        sleep_cycles = result.sleep_cycles,
        weather_cleared = result.weather_cleared,
        block_entity_steps = result.block_entity_steps,
        skipped_ticks = result.skipped_ticks,
        raining = result.raining_at_end,
        delivered = result.delivered,
        failed = result.failed,
        "Final time summary"
    );

    info!(
        snapshots = result.observer.snapshots,
        frames = result.observer.frames,
        lagged = result.observer.lagged,
        displayed = result.observer.displayed,
        last_snapshot = ?result.observer.last_snapshot,
        "Observer summary"
    );
}
