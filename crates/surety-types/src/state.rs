use serde::{Deserialize, Serialize};

/// Lifecycle of an airline record. Monotonic: a record never moves to a
/// lower ordinal.
///
/// Ordinal 0 is reserved for "no record" and has no variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AirlineState {
    /// Application filed, awaiting admission.
    Applied = 1,
    /// Admitted to the federation, funding below the minimum.
    Registered = 2,
    /// Admitted and funded; may sponsor, vote and underwrite.
    Funded = 3,
}

impl AirlineState {
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn is_registered(&self) -> bool {
        *self >= AirlineState::Registered
    }

    pub fn is_funded(&self) -> bool {
        *self == AirlineState::Funded
    }
}

/// Lifecycle of an insurance policy.
///
/// `NotPurchased → Bought → {Paid | Expired}`. Paid and Expired are terminal.
/// Ordinal 1 is reserved and never produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PolicyState {
    #[default]
    NotPurchased = 0,
    Bought = 2,
    Expired = 3,
    Paid = 4,
}

impl PolicyState {
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PolicyState::Expired | PolicyState::Paid)
    }
}
