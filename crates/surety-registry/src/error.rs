use surety_types::Identity;
use thiserror::Error;

/// Errors from the airline registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("airline is not funded: {0}")]
    NotFunded(Identity),

    #[error("invalid airline state for {airline}: {reason}")]
    InvalidState { airline: Identity, reason: String },

    #[error("duplicate vote: {voter} already voted for {candidate}")]
    DuplicateVote { voter: Identity, candidate: Identity },

    #[error("funding amount must be non-zero")]
    ZeroAmount,

    #[error("funding overflow for airline {0}")]
    AmountOverflow(Identity),
}

impl RegistryError {
    pub fn invalid_state(airline: &Identity, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            airline: airline.clone(),
            reason: reason.into(),
        }
    }
}
