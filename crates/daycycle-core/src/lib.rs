//! Variable-speed day/night time control for the Daycycle simulation.
//!
//! This crate owns the authoritative integration of world time, the
//! sleep-driven speed model, catch-up effects for skipped ticks, and the
//! observer-side filter that smooths the broadcast updates.
//!
//! # Modules
//!
//! - [`time`] -- Tick constants and the fractional [`TimeValue`].
//! - [`sleep`] -- Per-world sleeper bookkeeping.
//! - [`speed`] -- Speed model and the normalized tunable sigmoid.
//! - [`effects`] -- [`TimeEffect`] trait, registry, and the block-entity
//!   catch-up effect.
//! - [`host`] -- Traits the host platform implements.
//! - [`controller`] -- The per-world [`TimeController`] step.
//! - [`smoother`] -- Critically damped [`ClientSmoother`].
//! - [`worlds`] -- World lifecycle maps for controllers and smoothers.
//! - [`config`] -- Configuration loading from `daycycle.yaml`.
//!
//! [`TimeValue`]: time::TimeValue
//! [`TimeEffect`]: effects::TimeEffect
//! [`TimeController`]: controller::TimeController
//! [`ClientSmoother`]: smoother::ClientSmoother

pub mod config;
pub mod controller;
pub mod effects;
pub mod host;
pub mod sleep;
pub mod smoother;
pub mod speed;
pub mod time;
pub mod worlds;
