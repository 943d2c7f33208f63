//! Shared type definitions for the Daycycle time controller.
//!
//! Types that cross a boundary (controller to observer, controller to
//! host, configuration file to controller) live here. Wire types are
//! exported to `TypeScript` via `ts-rs` for dashboards.
//!
//! # Modules
//!
//! - [`ids`] -- World and participant identifiers
//! - [`enums`] -- Effect conditions and world kinds
//! - [`wire`] -- Time snapshot payload and the sleep-cycle signal

pub mod enums;
pub mod ids;
pub mod wire;

pub use enums::{EffectCondition, WorldKind};
pub use ids::{ParticipantId, WorldId};
pub use wire::{SleepCycleComplete, TimeSnapshot};
