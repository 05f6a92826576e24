//! Error types for the combat simulation.

use thiserror::Error;

/// Result type alias using [`ArenaError`].
pub type Result<T> = std::result::Result<T, ArenaError>;

/// Top-level error type for all simulation errors.
///
/// Dead or despawned entity references are deliberately *not* errors
/// inside the tick: readers treat them as absent. Errors are reserved
/// for malformed external input (bad templates, invalid API calls).
#[derive(Debug, Error)]
pub enum ArenaError {
    /// Invalid entity reference passed through the public API.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Template data file parsing error.
    #[error("Failed to parse template data '{path}': {message}")]
    TemplateParseError {
        /// Path or label of the document that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Unknown enemy or boss kind requested from the registry.
    #[error("Unknown template kind: {0}")]
    UnknownKind(String),

    /// Invalid simulation state.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),

    /// Desync detected in multiplayer.
    #[error("Desync detected at tick {tick}: local hash {local_hash}, remote hash {remote_hash}")]
    DesyncDetected {
        /// Tick where desync occurred.
        tick: u64,
        /// Local simulation hash.
        local_hash: u64,
        /// Remote simulation hash.
        remote_hash: u64,
    },
}
