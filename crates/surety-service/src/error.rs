use surety_ledger::LedgerError;
use surety_pool::PoolError;
use surety_registry::RegistryError;
use surety_types::{Amount, FlightKey, Identity, PolicyKey};
use thiserror::Error;

use crate::config::ConfigError;
use crate::journal::JournalError;
use crate::store::StoreError;

/// Errors surfaced by the governance facade.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuretyError {
    #[error("airline is not funded: {0}")]
    NotFunded(Identity),

    #[error("invalid state for {subject}: {reason}")]
    InvalidState { subject: String, reason: String },

    #[error("duplicate vote: {voter} already voted for {candidate}")]
    DuplicateVote { voter: Identity, candidate: Identity },

    #[error("airline cannot underwrite policies: {0}")]
    AirlineNotFunded(Identity),

    #[error("premium {premium} exceeds cap {cap}")]
    PremiumExceedsCap { premium: Amount, cap: Amount },

    #[error("policy already purchased: {0}")]
    AlreadyPurchased(PolicyKey),

    #[error("nothing to withdraw for {0}")]
    NothingToWithdraw(Identity),

    #[error("insufficient funds in {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: Identity,
        required: Amount,
        available: Amount,
    },

    #[error("system is paused")]
    SystemPaused,

    #[error("unauthorized caller {caller}: {reason}")]
    Unauthorized { caller: Identity, reason: String },

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("flight already resolved: {0}")]
    FlightAlreadyResolved(FlightKey),

    #[error("amount overflow: {0}")]
    AmountOverflow(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SuretyError {
    pub fn unauthorized(caller: &Identity, reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            caller: caller.clone(),
            reason: reason.into(),
        }
    }
}

pub type SuretyResult<T> = Result<T, SuretyError>;

impl From<RegistryError> for SuretyError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFunded(id) => Self::NotFunded(id),
            RegistryError::InvalidState { airline, reason } => Self::InvalidState {
                subject: airline.to_string(),
                reason,
            },
            RegistryError::DuplicateVote { voter, candidate } => {
                Self::DuplicateVote { voter, candidate }
            }
            RegistryError::ZeroAmount => Self::ZeroAmount,
            RegistryError::AmountOverflow(id) => {
                Self::AmountOverflow(format!("funding for airline {id}"))
            }
        }
    }
}

impl From<PoolError> for SuretyError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::AirlineNotFunded(id) => Self::AirlineNotFunded(id),
            PoolError::PremiumExceedsCap { premium, cap } => {
                Self::PremiumExceedsCap { premium, cap }
            }
            PoolError::AlreadyPurchased(key) => Self::AlreadyPurchased(key),
            PoolError::FlightAlreadyResolved(flight) => Self::FlightAlreadyResolved(flight),
            PoolError::NothingToWithdraw(id) => Self::NothingToWithdraw(id),
            PoolError::ZeroAmount => Self::ZeroAmount,
            PoolError::AmountOverflow(detail) => Self::AmountOverflow(detail),
        }
    }
}

impl From<LedgerError> for SuretyError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                account,
                required,
                available,
            } => Self::InsufficientFunds {
                account,
                required,
                available,
            },
            other => Self::Ledger(other.to_string()),
        }
    }
}

impl From<JournalError> for SuretyError {
    fn from(err: JournalError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<StoreError> for SuretyError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<ConfigError> for SuretyError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
