//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and the simulation
//! run so that `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: daycycle_core::config::ConfigError,
    },

    /// Registering a time effect failed.
    #[error("effect error: {source}")]
    Effect {
        /// The underlying registry error.
        #[from]
        source: daycycle_core::effects::EffectError,
    },

    /// The observer task panicked or was cancelled.
    #[error("observer task failed: {source}")]
    ObserverTask {
        /// The join failure.
        #[from]
        source: tokio::task::JoinError,
    },

    /// The primary world has no controller after activation.
    #[error("world '{world}' is not under time control")]
    Unmanaged {
        /// The world that was expected to be managed.
        world: String,
    },
}
