//! Surety Types - shared vocabulary of the airline federation.
//!
//! Every other crate in the workspace speaks in these terms: who is acting
//! ([`Identity`]), how much value moves ([`Amount`]), which flight a policy
//! covers ([`FlightKey`], [`PolicyKey`]) and where a record sits in its
//! lifecycle ([`AirlineState`], [`PolicyState`]).
#![deny(unsafe_code)]

pub mod amount;
pub mod flight;
pub mod state;

pub use amount::{Amount, AmountError, PayoutMultiplier, MINOR_PER_UNIT};
pub use flight::{FlightCode, FlightKey, FlightOutcome, PolicyKey};
pub use state::{AirlineState, PolicyState};

use serde::{Deserialize, Serialize};

/// Opaque account reference for an airline, passenger, oracle or authority.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}
