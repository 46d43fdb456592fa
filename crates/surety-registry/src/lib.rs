//! # surety-registry
//!
//! Airline registry for the flight surety federation.
//!
//! Airlines move through `Applied → Registered → Funded` and never regress.
//! While the federation is small a single funded sponsor can admit a new
//! member; once `direct_admission_limit` airlines are registered, admission
//! needs votes from funded members until the quorum ratio is met.
//!
//! The registry is pure decision logic over in-memory records. It never
//! moves value; the facade settles contributions with the ledger
//! collaborator before committing a funding outcome.

#![deny(unsafe_code)]

pub mod error;
pub mod registry;

pub use error::RegistryError;
pub use registry::{
    Admission, AirlineRecord, AirlineRegistry, FundingOutcome, QuorumRatio, RegistryRules,
    RegistrySnapshot, VoteOutcome,
};
