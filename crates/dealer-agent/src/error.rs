use dealer_core::DealerError;
use thiserror::Error;

/// Failures of one decision request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecisionError {
    /// The reasoning service could not be reached, answered with a non-success
    /// status, or timed out. The cycle is skipped.
    #[error("reasoning service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The snapshot or bounds handed to the engine are unusable.
    #[error("invalid decision input: {0}")]
    InvalidInput(String),

    /// The source itself is misconfigured (for example a missing API key).
    #[error("decision source misconfigured: {0}")]
    Configuration(String),
}

/// Failures that end a cycle early.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error(transparent)]
    Store(#[from] DealerError),

    #[error("cycle task panicked: {0}")]
    Join(String),
}

impl CycleError {
    /// True for failures writing the store, the action log or the outbox.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_persistence())
    }
}
