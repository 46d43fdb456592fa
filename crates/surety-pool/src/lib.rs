//! # surety-pool
//!
//! Insurance pool for the flight surety federation.
//!
//! Passengers buy a policy per `(passenger, airline, flight, departure)`
//! from a funded airline. The oracle collaborator later reports the flight
//! outcome; a carrier delay credits every bought policy with
//! `premium × payout multiplier` (capped at pool solvency), any other outcome
//! expires them. Credits are paid out only on an explicit withdrawal.

#![deny(unsafe_code)]

pub mod error;
pub mod policy;
pub mod pool;

pub use error::PoolError;
pub use policy::{
    FlightResolution, FlightStatusRequest, InsurancePolicy, PolicyView, ResolutionSummary,
};
pub use pool::{InsurancePool, PoolSnapshot, UnderwritingRules};
