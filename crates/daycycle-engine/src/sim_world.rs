//! In-memory world the engine drives.
//!
//! [`SimWorld`] stands in for the host platform's level: it stores the raw
//! tick count, the weather and game-rule toggles, the participants who
//! live in it, and a counter of block-entity steps so catch-up effects are
//! observable.

use std::collections::BTreeSet;

use daycycle_core::host::{DayClock, Level};
use daycycle_types::ParticipantId;
use rand::Rng;
use rand::seq::SliceRandom;

/// A headless world.
#[derive(Debug, Clone)]
pub struct SimWorld {
    time: i64,
    daylight_cycle: bool,
    weather_cycle: bool,
    raining: bool,
    participants: Vec<ParticipantId>,
    in_bed: BTreeSet<ParticipantId>,
    block_entity_steps: u64,
    wake_ups: u32,
}

impl SimWorld {
    /// Create a world at `start_time` with `participants` fresh
    /// participants, all awake.
    pub fn new(participants: u32, start_time: i64) -> Self {
        Self {
            time: start_time,
            daylight_cycle: true,
            weather_cycle: true,
            raining: false,
            participants: (0..participants).map(|_| ParticipantId::new()).collect(),
            in_bed: BTreeSet::new(),
            block_entity_steps: 0,
            wake_ups: 0,
        }
    }

    /// The host's own per-step increment.
    pub const fn host_tick(&mut self) {
        self.time = self.time.saturating_add(1);
    }

    /// Number of participants living in the world.
    pub fn participant_count(&self) -> u32 {
        u32::try_from(self.participants.len()).unwrap_or(u32::MAX)
    }

    /// Participants currently in bed.
    pub const fn in_bed(&self) -> &BTreeSet<ParticipantId> {
        &self.in_bed
    }

    /// Send a random, non-empty subset of awake participants to bed.
    /// Returns who went.
    pub fn send_to_bed<R: Rng>(&mut self, rng: &mut R) -> Vec<ParticipantId> {
        let mut awake: Vec<ParticipantId> = self
            .participants
            .iter()
            .filter(|p| !self.in_bed.contains(p))
            .copied()
            .collect();
        if awake.is_empty() {
            return Vec::new();
        }

        let count = rng.random_range(1..=awake.len());
        awake.shuffle(rng);
        awake.truncate(count);
        self.in_bed.extend(awake.iter().copied());
        awake
    }

    /// Start or stop rain.
    pub const fn set_raining(&mut self, raining: bool) {
        self.raining = raining;
    }

    /// Whether it is raining.
    pub const fn is_raining(&self) -> bool {
        self.raining
    }

    /// Block-entity steps run so far, including catch-up steps.
    pub const fn block_entity_steps(&self) -> u64 {
        self.block_entity_steps
    }

    /// How many times everyone was woken.
    pub const fn wake_ups(&self) -> u32 {
        self.wake_ups
    }
}

impl DayClock for SimWorld {
    fn day_time(&self) -> i64 {
        self.time
    }

    fn set_day_time(&mut self, ticks: i64) {
        self.time = ticks;
    }

    fn daylight_cycle_enabled(&self) -> bool {
        self.daylight_cycle
    }
}

impl Level for SimWorld {
    fn weather_cycle_enabled(&self) -> bool {
        self.weather_cycle
    }

    fn stop_weather(&mut self) {
        self.raining = false;
    }

    fn tick_block_entities(&mut self) {
        self.block_entity_steps = self.block_entity_steps.saturating_add(1);
    }

    fn wake_up_all_participants(&mut self) {
        self.in_bed.clear();
        self.wake_ups = self.wake_ups.saturating_add(1);
    }
}
