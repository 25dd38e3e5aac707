use thiserror::Error;

/// Error taxonomy of the interaction flow.
///
/// Nothing here is fatal: validation errors leave state untouched, transport
/// errors revert to the pre-request state with the retry control re-enabled,
/// and stale responses are discarded without user-visible effect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    /// Rejected synchronously before any state change.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A network call failed; the session reverts to its pre-request state.
    #[error("transport failure: {0}")]
    Transport(String),
    /// A response arrived after the session had already moved on.
    #[error("stale response discarded")]
    Stale,
}
