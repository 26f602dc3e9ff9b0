//! Error types for the engine binary.
//!
//! [`RuntimeError`] is the top-level error type that wraps all failure
//! modes during startup and shutdown, so `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: rondo_core::ConfigError,
    },

    /// Engine startup or recovery failed.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: rondo_core::EngineError,
    },

    /// The engine task panicked or was cancelled.
    #[error("engine task join failed: {message}")]
    Join {
        /// Description of the join failure.
        message: String,
    },
}
