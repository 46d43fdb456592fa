use serde::{Deserialize, Serialize};

use crate::Identity;

/// Carrier flight designator, e.g. `FS1234`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightCode(pub String);

impl FlightCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl std::fmt::Display for FlightCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FlightCode {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A single scheduled departure operated by an airline.
///
/// `departure` is the scheduled departure time in unix seconds. The same
/// flight code on a different day is a different key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlightKey {
    pub airline: Identity,
    pub flight: FlightCode,
    pub departure: i64,
}

impl FlightKey {
    pub fn new(airline: impl Into<Identity>, flight: impl Into<FlightCode>, departure: i64) -> Self {
        Self {
            airline: airline.into(),
            flight: flight.into(),
            departure,
        }
    }
}

impl std::fmt::Display for FlightKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.airline, self.flight, self.departure)
    }
}

/// Policy key: `(passenger, airline, flight, departure)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyKey {
    pub passenger: Identity,
    pub flight: FlightKey,
}

impl PolicyKey {
    pub fn new(passenger: impl Into<Identity>, flight: FlightKey) -> Self {
        Self {
            passenger: passenger.into(),
            flight,
        }
    }
}

impl std::fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.passenger, self.flight)
    }
}

/// Flight status reported by the oracle collaborator.
///
/// Discriminants are the oracle status codes. Only [`FlightOutcome::DelayedByCarrier`]
/// triggers a payout; every other outcome expires the covering policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FlightOutcome {
    Unknown = 0,
    OnTime = 10,
    DelayedByCarrier = 20,
    DelayedByWeather = 30,
    DelayedByTechnical = 40,
    DelayedOther = 50,
}

impl FlightOutcome {
    pub fn status_code(&self) -> u8 {
        *self as u8
    }

    pub fn from_status_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            10 => Some(Self::OnTime),
            20 => Some(Self::DelayedByCarrier),
            30 => Some(Self::DelayedByWeather),
            40 => Some(Self::DelayedByTechnical),
            50 => Some(Self::DelayedOther),
            _ => None,
        }
    }

    pub fn pays_out(&self) -> bool {
        matches!(self, Self::DelayedByCarrier)
    }
}
