use surety_types::{Amount, FlightKey, Identity, PolicyKey};
use thiserror::Error;

/// Errors from the insurance pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("airline is not funded and cannot underwrite: {0}")]
    AirlineNotFunded(Identity),

    #[error("premium {premium} exceeds cap {cap}")]
    PremiumExceedsCap { premium: Amount, cap: Amount },

    #[error("policy already purchased: {0}")]
    AlreadyPurchased(PolicyKey),

    #[error("flight already resolved: {0}")]
    FlightAlreadyResolved(FlightKey),

    #[error("nothing to withdraw for passenger {0}")]
    NothingToWithdraw(Identity),

    #[error("premium must be non-zero")]
    ZeroAmount,

    #[error("amount overflow: {0}")]
    AmountOverflow(String),
}
