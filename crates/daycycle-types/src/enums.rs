//! Enumeration types shared between the controller, its configuration,
//! and hosts.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::WorldId;

/// When a catch-up effect is allowed to run extra simulation steps.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EffectCondition {
    /// The effect never runs.
    Never,
    /// The effect runs only while at least one participant is asleep.
    #[default]
    Sleeping,
    /// The effect runs whenever time moves faster than one tick per step.
    Always,
}

/// How a world's clock relates to other worlds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum WorldKind {
    /// The world owns its clock and gets its own controller.
    Primary,
    /// The world shares the clock of `parent` and receives its broadcasts.
    Derived {
        /// The primary world whose clock this world follows.
        parent: WorldId,
    },
}

impl WorldKind {
    /// Return the parent world when this world is derived.
    pub const fn parent(&self) -> Option<&WorldId> {
        match self {
            Self::Primary => None,
            Self::Derived { parent } => Some(parent),
        }
    }
}
