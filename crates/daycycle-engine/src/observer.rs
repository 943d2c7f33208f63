//! Observer task: receives snapshots and smooths them at render cadence.
//!
//! The task models an observer process. Incoming frames play the role of
//! its networking layer and write the snapshot straight into a
//! [`LocalClock`]. A step interval runs the observer host's own tick and
//! its cancellation, and a render interval drives [`ObserverClocks`] once
//! per frame. Snapshot arrival, observer steps and render frames run on
//! separate cadences and only meet through the clock.

use std::collections::BTreeSet;
use std::time::Duration;

use daycycle_core::host::DayClock;
use daycycle_core::worlds::ObserverClocks;
use daycycle_types::{ParticipantId, TimeSnapshot, WorldId};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::fanout::ObserverFrame;

/// Observer-side copy of a world's clock.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    time: i64,
    daylight_cycle: bool,
}

impl LocalClock {
    /// A clock reading `time` with the daylight cycle on.
    pub const fn at(time: i64) -> Self {
        Self {
            time,
            daylight_cycle: true,
        }
    }

    /// The observer host's own per-step increment.
    pub const fn host_tick(&mut self) {
        self.time = self.time.saturating_add(1);
    }
}

impl DayClock for LocalClock {
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

/// Timing of the observer loop.
#[derive(Debug, Clone, Copy)]
pub struct ObserverTiming {
    /// Real time per simulation step.
    pub step: Duration,
    /// Real time per render frame.
    pub frame: Duration,
}

/// What the observer saw by the time the channel closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverReport {
    /// Snapshots addressed to this observer.
    pub snapshots: u64,
    /// Observer-side simulation steps run after the clock was seeded.
    pub steps: u64,
    /// Frames rendered.
    pub frames: u64,
    /// Frames skipped because the receiver lagged.
    pub lagged: u64,
    /// Snapshots that could not be decoded.
    pub malformed: u64,
    /// Latest authoritative time received.
    pub last_snapshot: Option<i64>,
    /// Time displayed when the task ended.
    pub displayed: i64,
}

/// Run one observer of `world` until the frame channel closes.
///
/// The first frame addressed to the observer seeds its local clock, the
/// way a joining observer receives the current time before rendering.
pub async fn run(
    observer: ParticipantId,
    world: WorldId,
    excluded: BTreeSet<WorldId>,
    timing: ObserverTiming,
    mut rx: broadcast::Receiver<ObserverFrame>,
) -> ObserverReport {
    let mut clocks = ObserverClocks::new(excluded);
    let smoothing = clocks.on_world_loaded(world.clone());
    let mut clock: Option<LocalClock> = None;
    let mut report = ObserverReport::default();

    let mut steps = tokio::time::interval(timing.step);
    steps.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frames = tokio::time::interval(timing.frame);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let step_secs = timing.step.as_secs_f64();
    let mut step_started = Instant::now();

    debug!(observer = %observer, world = %world, smoothing, "Observer started");

    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Ok(frame) if frame.observer == observer => {
                        let snapshot: TimeSnapshot = match serde_json::from_str(&frame.payload) {
                            Ok(s) => s,
                            Err(e) => {
                                warn!(observer = %observer, error = %e, "Malformed time snapshot");
                                report.malformed = report.malformed.saturating_add(1);
                                continue;
                            }
                        };

                        clock
                            .get_or_insert(LocalClock::at(snapshot.time_ticks))
                            .set_day_time(snapshot.time_ticks);

                        report.snapshots = report.snapshots.saturating_add(1);
                        report.last_snapshot = Some(snapshot.time_ticks);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        debug!(observer = %observer, skipped = n, "Observer lagged, skipping ahead");
                        report.lagged = report.lagged.saturating_add(n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = steps.tick() => {
                step_started = Instant::now();
                if let Some(local) = clock.as_mut() {
                    local.host_tick();
                    clocks.on_client_step(&world, local, false);
                    report.steps = report.steps.saturating_add(1);
                }
            }
            _ = frames.tick() => {
                if let Some(local) = clock.as_mut() {
                    let partial = (step_started.elapsed().as_secs_f64() / step_secs).fract();
                    clocks.on_render_frame(&world, local, partial, false);
                    report.frames = report.frames.saturating_add(1);
                }
            }
        }
    }

    report.displayed = clock.map_or(0, |c| c.day_time());
    debug!(
        observer = %observer,
        snapshots = report.snapshots,
        steps = report.steps,
        frames = report.frames,
        displayed = report.displayed,
        "Observer stopped"
    );
    report
}
