//! Error type shared by the tracker, the blueprint store and the loop.

use crate::phase::Phase;

/// Result alias for lineage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by lineage operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Operation is not valid in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Reference to a generation or blueprint version that does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// An external phase hook reported failure or raised
    #[error("Hook failed during {phase}: {message}")]
    HookFailure {
        /// Phase whose hook failed
        phase: Phase,
        /// What the hook reported
        message: String,
    },

    /// Persisted data violates history invariants
    #[error("Corrupt history: {0}")]
    CorruptHistory(String),
}

impl Error {
    /// Build a hook failure for `phase`.
    pub fn hook(phase: Phase, message: impl Into<String>) -> Self {
        Error::HookFailure {
            phase,
            message: message.into(),
        }
    }
}
