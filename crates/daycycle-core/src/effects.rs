//! Catch-up effects driven by elapsed time.
//!
//! When time runs faster than one tick per step, dependent subsystems
//! fall behind unless they are advanced by the ticks that were skipped.
//! Each subsystem contributes a [`TimeEffect`]; the controller invokes
//! every registered effect once per step, in registration order, through
//! the [`EffectRegistry`].

use daycycle_types::{EffectCondition, WorldId};

use crate::host::Level;
use crate::sleep::SleepTracker;
use crate::time::TimeValue;

/// Errors raised while registering effects.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    /// An effect with the same id is already registered.
    #[error("time effect '{id}' is already registered")]
    DuplicateEffect {
        /// The conflicting id.
        id: String,
    },
}

/// What an effect sees on each step.
pub struct TimeContext<'a> {
    /// The world whose clock advanced.
    pub world: &'a WorldId,
    /// Time after the step.
    pub time: TimeValue,
    /// Time that elapsed during the step.
    pub delta: TimeValue,
    /// Whole ticks crossed during the step: `floor(new) - floor(old)`.
    pub elapsed_whole_ticks: u64,
    /// Sleep state of the world at the time of the step.
    pub sleep: &'a SleepTracker,
    /// The world itself.
    pub level: &'a mut dyn Level,
}

/// A subsystem that advances in proportion to elapsed ticks.
///
/// Implementations must treat `elapsed_whole_ticks <= 1` as a no-op: the
/// host already advances its subsystems once per step.
pub trait TimeEffect: Send {
    /// Stable identifier, unique within a registry.
    fn id(&self) -> &str;

    /// Called once per controller step.
    fn on_time_tick(&mut self, context: &mut TimeContext<'_>);
}

/// Ordered collection of effects.
#[derive(Default)]
pub struct EffectRegistry {
    effects: Vec<Box<dyn TimeEffect>>,
}

impl EffectRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    /// Create a registry holding the built-in effects.
    pub fn with_builtin(block_entities: EffectCondition) -> Self {
        let block_entities: Box<dyn TimeEffect> = Box::new(BlockEntityEffect::new(block_entities));
        Self {
            effects: vec![block_entities],
        }
    }

    /// Append an effect. Effects run in the order they were registered.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::DuplicateEffect`] if an effect with the same
    /// id is already present.
    pub fn register(&mut self, effect: Box<dyn TimeEffect>) -> Result<(), EffectError> {
        if self.effects.iter().any(|e| e.id() == effect.id()) {
            return Err(EffectError::DuplicateEffect {
                id: effect.id().to_owned(),
            });
        }
        self.effects.push(effect);
        Ok(())
    }

    /// Registered ids, in dispatch order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().map(|e| e.id())
    }

    /// Number of registered effects.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether no effects are registered.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Invoke every effect with `context`.
    pub fn dispatch(&mut self, context: &mut TimeContext<'_>) {
        for effect in &mut self.effects {
            effect.on_time_tick(context);
        }
    }
}

impl core::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

/// Runs extra block-entity steps so furnaces, crops and the like keep
/// pace with accelerated time.
#[derive(Debug, Clone, Copy)]
pub struct BlockEntityEffect {
    condition: EffectCondition,
}

impl BlockEntityEffect {
    /// Id under which the effect registers.
    pub const ID: &'static str = "block_entities";

    /// Create the effect with the configured run condition.
    pub const fn new(condition: EffectCondition) -> Self {
        Self { condition }
    }
}

impl TimeEffect for BlockEntityEffect {
    fn id(&self) -> &str {
        Self::ID
    }

    fn on_time_tick(&mut self, context: &mut TimeContext<'_>) {
        let extra = context.elapsed_whole_ticks.saturating_sub(1);
        let allowed = match self.condition {
            EffectCondition::Never => false,
            EffectCondition::Sleeping => !context.sleep.all_awake(),
            EffectCondition::Always => true,
        };

        if extra == 0 || !allowed {
            return;
        }

        for _ in 0..extra {
            context.level.tick_block_entities();
        }
    }
}
