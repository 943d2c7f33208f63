//! Interfaces the host platform implements for the controller.
//!
//! The core never reaches into host internals. Everything it needs from
//! the surrounding world, participant registry and transport is expressed
//! here, which keeps the engine testable by driving it from a harness with
//! in-memory implementations.

use daycycle_types::{ParticipantId, TimeSnapshot, WorldId};

/// Errors a transport may report when delivering a snapshot.
///
/// A failed send never aborts a simulation step; the controller logs it
/// and moves on to the next observer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The observer's connection is gone.
    #[error("observer {observer} is disconnected")]
    Disconnected {
        /// The observer that could not be reached.
        observer: ParticipantId,
    },

    /// The snapshot could not be framed for the wire.
    #[error("failed to encode snapshot: {reason}")]
    Encode {
        /// Description of the framing failure.
        reason: String,
    },
}

/// Raw day-time access shared by authoritative worlds and observer-side
/// copies of them.
pub trait DayClock {
    /// Current raw tick count.
    fn day_time(&self) -> i64;

    /// Overwrite the raw tick count.
    fn set_day_time(&mut self, ticks: i64);

    /// Whether the world's daylight-cycle rule is on. When it is off the
    /// controller and the observer-side step hook leave time alone.
    fn daylight_cycle_enabled(&self) -> bool;
}

/// An authoritative world as seen by the controller.
pub trait Level: DayClock {
    /// Whether the world's weather-cycle rule is on.
    fn weather_cycle_enabled(&self) -> bool;

    /// Clear any active weather.
    fn stop_weather(&mut self);

    /// Run one step of block-entity simulation.
    fn tick_block_entities(&mut self);

    /// Wake every participant in the world.
    fn wake_up_all_participants(&mut self);
}

/// Delivers snapshots to the observers of a world.
pub trait ObserverFanout {
    /// Observers currently attached to `world`.
    fn observers_of(&self, world: &WorldId) -> Vec<ParticipantId>;

    /// Deliver `snapshot` to one observer.
    fn send(&mut self, observer: ParticipantId, snapshot: &TimeSnapshot)
    -> Result<(), TransportError>;
}
