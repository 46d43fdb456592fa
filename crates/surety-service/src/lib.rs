//! # surety-service
//!
//! Governance facade for the flight surety federation.
//!
//! [`GovernanceFacade`] is the only entry point callers use. It
//! authenticates each caller through the [`surety_ledger::IdentityLedger`]
//! collaborator, delegates decisions to the airline registry and the
//! insurance pool, settles value through the ledger, and records every
//! committed mutation in a hash-chained [`AuditJournal`]. A circuit breaker
//! held by the genesis authority pauses all mutation without blocking reads.
//!
//! ```no_run
//! use std::sync::Arc;
//! use surety_ledger::InMemoryLedger;
//! use surety_service::{Genesis, GovernanceFacade, SuretyConfig};
//! use surety_types::{Amount, Identity};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Arc::new(InMemoryLedger::new());
//! ledger.open_account("authority", Amount::ZERO)?;
//! ledger.open_account("a0", Amount::units(100))?;
//!
//! let facade = GovernanceFacade::bootstrap(
//!     SuretyConfig::default(),
//!     Genesis {
//!         authority: Identity::new("authority"),
//!         airline: Identity::new("a0"),
//!     },
//!     ledger,
//! )?;
//! facade
//!     .apply_and_maybe_register(&Identity::new("a0"), &Identity::new("a1"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod facade;
pub mod journal;
pub mod store;
pub mod telemetry;

pub use config::{ConfigError, StorageConfig, SuretyConfig};
pub use error::{SuretyError, SuretyResult};
pub use facade::{Genesis, GovernanceFacade};
pub use journal::{AuditJournal, JournalEntry, JournalError, JournalKind};
pub use store::{CoreSnapshot, SnapshotStore, StoreError, SNAPSHOT_VERSION};
pub use telemetry::init_tracing;
