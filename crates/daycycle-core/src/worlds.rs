//! Per-world lifecycle on both sides of the connection.
//!
//! [`WorldClocks`] is what an authoritative host drives: it creates a
//! [`TimeController`] when a primary world becomes active, routes derived
//! worlds to their parent's clock, and forwards simulation steps and sleep
//! events. [`ObserverClocks`] is the observer-side counterpart holding one
//! [`ClientSmoother`] per loaded world.
//!
//! Both are plain maps keyed by [`WorldId`]; nothing is process-global.

use std::collections::{BTreeMap, BTreeSet};

use daycycle_types::{ParticipantId, WorldId, WorldKind};
use tracing::debug;

use crate::config::SimulationConfig;
use crate::controller::{StepOutcome, TimeController};
use crate::effects::EffectRegistry;
use crate::host::{DayClock, Level, ObserverFanout};
use crate::smoother::ClientSmoother;
use crate::speed::{SpeedConfig, SpeedModel};

/// Authoritative controllers for every active world.
#[derive(Debug)]
pub struct WorldClocks {
    controllers: BTreeMap<WorldId, TimeController>,
    /// Derived world to the primary world whose clock it follows.
    parents: BTreeMap<WorldId, WorldId>,
    effects: EffectRegistry,
    speed: SpeedConfig,
    clear_weather_on_wake: bool,
    excluded: BTreeSet<WorldId>,
}

impl WorldClocks {
    /// Create an empty set of clocks.
    pub const fn new(
        speed: SpeedConfig,
        effects: EffectRegistry,
        clear_weather_on_wake: bool,
        excluded: BTreeSet<WorldId>,
    ) -> Self {
        Self {
            controllers: BTreeMap::new(),
            parents: BTreeMap::new(),
            effects,
            speed,
            clear_weather_on_wake,
            excluded,
        }
    }

    /// Create clocks from a validated configuration, with the built-in
    /// effects registered.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.speed_config(),
            EffectRegistry::with_builtin(config.effects.block_entities),
            config.sleep.clear_weather_on_wake,
            config.worlds.excluded.clone(),
        )
    }

    /// The shared effect registry, for registering additional effects.
    pub const fn effects_mut(&mut self) -> &mut EffectRegistry {
        &mut self.effects
    }

    /// Whether `world` is excluded from time control.
    pub fn is_excluded(&self, world: &WorldId) -> bool {
        self.excluded.contains(world)
    }

    /// Number of primary worlds with a controller.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// Whether no world has a controller.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Host callback: `world` became active.
    ///
    /// Returns `false` if the world is excluded and was ignored.
    pub fn on_world_activated(&mut self, world: WorldId, kind: WorldKind) -> bool {
        if self.excluded.contains(&world) {
            debug!(world = %world, "World excluded from time control");
            return false;
        }

        match kind {
            WorldKind::Primary => {
                let speed = self.speed;
                let clear_weather_on_wake = self.clear_weather_on_wake;
                // A repeated activation keeps the running controller with its
                // sleepers and fractional time.
                let controller = self.controllers.entry(world.clone()).or_insert_with(|| {
                    debug!(world = %world, "Time controller created");
                    TimeController::new(world.clone(), SpeedModel::new(speed), clear_weather_on_wake)
                });
                for (derived, parent) in &self.parents {
                    if *parent == world {
                        controller.attach_derived(derived.clone());
                    }
                }
            }
            WorldKind::Derived { parent } => {
                if let Some(controller) = self.controllers.get_mut(&parent) {
                    controller.attach_derived(world.clone());
                }
                debug!(world = %world, parent = %parent, "Derived world follows parent clock");
                self.parents.insert(world, parent);
            }
        }

        true
    }

    /// Host callback: `world` became inactive.
    pub fn on_world_deactivated(&mut self, world: &WorldId) {
        if let Some(parent) = self.parents.remove(world) {
            if let Some(controller) = self.controllers.get_mut(&parent) {
                controller.detach_derived(world);
            }
            debug!(world = %world, "Derived world detached");
        }

        if self.controllers.remove(world).is_some() {
            debug!(world = %world, "Time controller dropped");
        }
    }

    /// Host callback: run one simulation step of `world`.
    ///
    /// Derived and unknown worlds return `None`; a derived world's time is
    /// advanced and broadcast by its parent.
    pub fn on_simulation_step(
        &mut self,
        world: &WorldId,
        level: &mut dyn Level,
        fanout: &mut dyn ObserverFanout,
    ) -> Option<StepOutcome> {
        let controller = self.controllers.get_mut(world)?;
        controller.step(level, &mut self.effects, fanout)
    }

    /// Host callback: `participant` went to sleep in `world`.
    ///
    /// Returns `false` if no controller governs the world or the
    /// participant was already asleep.
    pub fn on_participant_sleep(&mut self, world: &WorldId, participant: ParticipantId) -> bool {
        self.controller_mut(world)
            .is_some_and(|c| c.sleep_mut().add_sleeper(participant))
    }

    /// Host callback: `participant` woke up or left `world`.
    pub fn on_participant_wake(&mut self, world: &WorldId, participant: ParticipantId) -> bool {
        self.controller_mut(world)
            .is_some_and(|c| c.sleep_mut().remove_sleeper(participant))
    }

    /// Host callback: the number of participants eligible to sleep in
    /// `world` changed.
    pub fn set_participants(&mut self, world: &WorldId, count: u32) {
        if let Some(controller) = self.controller_mut(world) {
            controller.sleep_mut().set_participants(count);
        }
    }

    /// The controller governing `world`, following derived worlds to
    /// their parent.
    pub fn controller(&self, world: &WorldId) -> Option<&TimeController> {
        let owner = self.parents.get(world).unwrap_or(world);
        self.controllers.get(owner)
    }

    /// Mutable access to the controller governing `world`.
    pub fn controller_mut(&mut self, world: &WorldId) -> Option<&mut TimeController> {
        let owner = self.parents.get(world).unwrap_or(world);
        self.controllers.get_mut(owner)
    }
}

/// Observer-side smoothers for every loaded world.
#[derive(Debug, Clone, Default)]
pub struct ObserverClocks {
    smoothers: BTreeMap<WorldId, ClientSmoother>,
    excluded: BTreeSet<WorldId>,
}

impl ObserverClocks {
    /// Create an empty set, ignoring worlds in `excluded`.
    pub const fn new(excluded: BTreeSet<WorldId>) -> Self {
        Self {
            smoothers: BTreeMap::new(),
            excluded,
        }
    }

    /// Create from configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.worlds.excluded.clone())
    }

    /// Host callback: `world` was loaded on the observer.
    ///
    /// Returns `false` if the world is excluded.
    pub fn on_world_loaded(&mut self, world: WorldId) -> bool {
        if self.excluded.contains(&world) {
            debug!(world = %world, "World excluded from smoothing");
            return false;
        }
        self.smoothers.entry(world).or_default();
        true
    }

    /// Host callback: `world` was unloaded on the observer.
    pub fn on_world_unloaded(&mut self, world: &WorldId) {
        self.smoothers.remove(world);
    }

    /// Host callback: a frame is being rendered.
    pub fn on_render_frame<C: DayClock + ?Sized>(
        &mut self,
        world: &WorldId,
        clock: &mut C,
        partial: f64,
        paused: bool,
    ) {
        if paused {
            return;
        }
        if let Some(smoother) = self.smoothers.get_mut(world) {
            smoother.on_frame(clock, partial);
        }
    }

    /// Host callback: a simulation step ended on the observer.
    pub fn on_client_step<C: DayClock + ?Sized>(&self, world: &WorldId, clock: &mut C, paused: bool) {
        if paused {
            return;
        }
        if let Some(smoother) = self.smoothers.get(world) {
            smoother.on_step_end(clock);
        }
    }

    /// The smoother for `world`, if loaded.
    pub fn smoother(&self, world: &WorldId) -> Option<&ClientSmoother> {
        self.smoothers.get(world)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use daycycle_types::TimeSnapshot;

    use super::*;
    use crate::host::TransportError;

    struct FlatLevel {
        time: i64,
    }

    impl DayClock for FlatLevel {
        fn day_time(&self) -> i64 {
            self.time
        }
        fn set_day_time(&mut self, ticks: i64) {
            self.time = ticks;
        }
        fn daylight_cycle_enabled(&self) -> bool {
            true
        }
    }

    impl Level for FlatLevel {
        fn weather_cycle_enabled(&self) -> bool {
            false
        }
        fn stop_weather(&mut self) {}
        fn tick_block_entities(&mut self) {}
        fn wake_up_all_participants(&mut self) {}
    }

    #[derive(Default)]
    struct Recipients {
        observers: Vec<(WorldId, ParticipantId)>,
        received: Vec<ParticipantId>,
    }

    impl ObserverFanout for Recipients {
        fn observers_of(&self, world: &WorldId) -> Vec<ParticipantId> {
            self.observers
                .iter()
                .filter(|(w, _)| w == world)
                .map(|(_, p)| *p)
                .collect()
        }
        fn send(&mut self, observer: ParticipantId, _snapshot: &TimeSnapshot) -> Result<(), TransportError> {
            self.received.push(observer);
            Ok(())
        }
    }

    fn clocks_excluding(excluded: &[&str]) -> WorldClocks {
        WorldClocks::new(
            SpeedConfig::default(),
            EffectRegistry::new(),
            true,
            excluded.iter().map(|w| WorldId::from(*w)).collect(),
        )
    }

    #[test]
    fn excluded_world_gets_no_controller() {
        let mut clocks = clocks_excluding(&["the_end"]);
        assert!(!clocks.on_world_activated(WorldId::from("the_end"), WorldKind::Primary));
        assert!(clocks.is_empty());

        let mut level = FlatLevel { time: 7 };
        let outcome = clocks.on_simulation_step(
            &WorldId::from("the_end"),
            &mut level,
            &mut Recipients::default(),
        );
        assert!(outcome.is_none());
        assert_eq!(level.time, 7);
    }

    #[test]
    fn derived_world_activated_first_is_attached_later() {
        let mut clocks = clocks_excluding(&[]);
        let overworld = WorldId::from("overworld");
        let nether = WorldId::from("the_nether");

        clocks.on_world_activated(nether.clone(), WorldKind::Derived {
            parent: overworld.clone(),
        });
        assert!(clocks.controller(&nether).is_none());

        clocks.on_world_activated(overworld.clone(), WorldKind::Primary);
        assert_eq!(clocks.len(), 1);
        assert!(clocks.controller(&nether).unwrap().manages(&nether));
    }

    #[test]
    fn derived_world_observers_receive_parent_time() {
        let mut clocks = clocks_excluding(&[]);
        let overworld = WorldId::from("overworld");
        let nether = WorldId::from("the_nether");
        clocks.on_world_activated(overworld.clone(), WorldKind::Primary);
        clocks.on_world_activated(nether.clone(), WorldKind::Derived {
            parent: overworld.clone(),
        });

        let watcher = ParticipantId::new();
        let mut fanout = Recipients::default();
        fanout.observers.push((nether.clone(), watcher));

        let mut level = FlatLevel { time: 0 };
        assert!(clocks.on_simulation_step(&nether, &mut level, &mut fanout).is_none());
        let outcome = clocks.on_simulation_step(&overworld, &mut level, &mut fanout).unwrap();
        assert_eq!(outcome.delivered, 1);
        assert_eq!(fanout.received, vec![watcher]);

        clocks.on_world_deactivated(&nether);
        assert!(!clocks.controller(&overworld).unwrap().manages(&nether));
    }

    #[test]
    fn sleep_events_route_to_governing_controller() {
        let mut clocks = clocks_excluding(&[]);
        let overworld = WorldId::from("overworld");
        let nether = WorldId::from("the_nether");
        clocks.on_world_activated(overworld.clone(), WorldKind::Primary);
        clocks.on_world_activated(nether.clone(), WorldKind::Derived {
            parent: overworld.clone(),
        });
        clocks.set_participants(&overworld, 2);

        let sleeper = ParticipantId::new();
        assert!(clocks.on_participant_sleep(&nether, sleeper));
        assert!(!clocks.on_participant_sleep(&overworld, sleeper));
        assert_eq!(clocks.controller(&overworld).unwrap().sleep().sleeper_count(), 1);

        assert!(clocks.on_participant_wake(&overworld, sleeper));
        assert!(!clocks.on_participant_sleep(&WorldId::from("unknown"), sleeper));
    }

    #[test]
    fn repeated_activation_keeps_running_controller() {
        let mut clocks = clocks_excluding(&[]);
        let overworld = WorldId::from("overworld");
        let nether = WorldId::from("the_nether");
        clocks.on_world_activated(overworld.clone(), WorldKind::Primary);
        clocks.on_world_activated(nether.clone(), WorldKind::Derived {
            parent: overworld.clone(),
        });
        clocks.set_participants(&overworld, 3);
        assert!(clocks.on_participant_sleep(&overworld, ParticipantId::new()));

        assert!(clocks.on_world_activated(overworld.clone(), WorldKind::Primary));
        assert_eq!(clocks.len(), 1);
        let controller = clocks.controller(&overworld).unwrap();
        assert_eq!(controller.sleep().sleeper_count(), 1);
        assert!(controller.manages(&nether));
    }

    #[test]
    fn deactivation_drops_controller() {
        let mut clocks = clocks_excluding(&[]);
        let overworld = WorldId::from("overworld");
        clocks.on_world_activated(overworld.clone(), WorldKind::Primary);
        clocks.on_world_deactivated(&overworld);
        assert!(clocks.controller(&overworld).is_none());
    }

    #[test]
    fn observer_ignores_excluded_and_paused() {
        let mut observers = ObserverClocks::new(BTreeSet::from([WorldId::from("the_end")]));
        assert!(!observers.on_world_loaded(WorldId::from("the_end")));
        assert!(observers.on_world_loaded(WorldId::from("overworld")));

        let overworld = WorldId::from("overworld");
        let mut clock = FlatLevel { time: 100 };
        observers.on_render_frame(&overworld, &mut clock, 0.5, true);
        assert!(!observers.smoother(&overworld).unwrap().is_tracking());

        observers.on_client_step(&overworld, &mut clock, true);
        assert_eq!(clock.time, 100);
        observers.on_client_step(&overworld, &mut clock, false);
        assert_eq!(clock.time, 99);

        observers.on_render_frame(&overworld, &mut clock, 0.5, false);
        assert!(observers.smoother(&overworld).unwrap().is_tracking());

        observers.on_world_unloaded(&overworld);
        assert!(observers.smoother(&overworld).is_none());
    }
}
