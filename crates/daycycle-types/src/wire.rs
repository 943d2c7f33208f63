//! Payloads that leave the controller: the per-step time snapshot sent to
//! observers and the sleep-cycle signal handed to host collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::WorldId;

/// Authoritative time broadcast to every observer of a world once per
/// simulation step.
///
/// Only the raw tick count is sent. Observers derive time-of-day and the
/// day count themselves against the fixed day length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TimeSnapshot {
    /// Raw authoritative tick count.
    pub time_ticks: i64,
}

/// Emitted once when a sleep cycle ends at the morning boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SleepCycleComplete {
    /// The world whose participants were woken.
    pub world: WorldId,
    /// Raw tick count at the moment of waking.
    pub time_ticks: i64,
    /// Number of participants that were asleep when morning arrived.
    pub sleepers: u32,
    /// Whether weather was cleared as part of the transition.
    pub weather_cleared: bool,
    /// Wall-clock instant the transition ran.
    pub completed_at: DateTime<Utc>,
}
