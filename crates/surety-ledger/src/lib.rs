//! Value-transfer and identity collaborator.
//!
//! The governance core never moves value or authenticates callers itself; it
//! asks an [`IdentityLedger`]. [`InMemoryLedger`] is a deterministic reference
//! implementation for local runs and tests.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use surety_types::{Amount, Identity};
use thiserror::Error;
use tracing::{debug, warn};

/// Ledger collaborator contract.
///
/// Calls are synchronous and all-or-nothing: a transfer either settles in
/// full or returns an error without touching either balance.
pub trait IdentityLedger: Send + Sync {
    /// Resolve the claimed caller to an authenticated identity.
    fn authenticate(&self, claimed: &Identity) -> Result<Identity, LedgerError>;

    /// Move `amount` from `from` to `to`.
    fn transfer(
        &self,
        from: &Identity,
        to: &Identity,
        amount: Amount,
    ) -> Result<TransferReceipt, LedgerError>;
}

/// Proof of a settled transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer_id: String,
    pub from: Identity,
    pub to: Identity,
    pub amount: Amount,
    pub settled_at: DateTime<Utc>,
}

/// Ledger collaborator errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient funds in {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: Identity,
        required: Amount,
        available: Amount,
    },

    #[error("unknown account: {0}")]
    UnknownAccount(Identity),

    #[error("balance overflow for account {0}")]
    Overflow(Identity),

    #[error("ledger backend error: {0}")]
    Backend(String),
}

/// In-memory accounts keyed by identity.
///
/// Authentication succeeds for any opened account. Transfers to an account
/// that does not exist yet open it implicitly; transfers from one do not.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: Mutex<HashMap<Identity, Amount>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Open (or top up) an account with an initial balance.
    pub fn open_account(&self, id: impl Into<Identity>, balance: Amount) -> Result<(), LedgerError> {
        let id = id.into();
        let mut accounts = self.lock()?;
        let entry = accounts.entry(id.clone()).or_insert(Amount::ZERO);
        *entry = entry
            .checked_add(balance)
            .map_err(|_| LedgerError::Overflow(id.clone()))?;
        debug!(account = %id, balance = %entry, "Ledger account opened");
        Ok(())
    }

    /// Current balance, `None` for an account that was never opened.
    pub fn balance(&self, id: &Identity) -> Option<Amount> {
        self.accounts
            .lock()
            .ok()
            .and_then(|accounts| accounts.get(id).copied())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Identity, Amount>>, LedgerError> {
        self.accounts
            .lock()
            .map_err(|_| LedgerError::Backend("ledger lock poisoned".to_string()))
    }
}

impl IdentityLedger for InMemoryLedger {
    fn authenticate(&self, claimed: &Identity) -> Result<Identity, LedgerError> {
        let accounts = self.lock()?;
        if accounts.contains_key(claimed) {
            Ok(claimed.clone())
        } else {
            Err(LedgerError::UnknownAccount(claimed.clone()))
        }
    }

    fn transfer(
        &self,
        from: &Identity,
        to: &Identity,
        amount: Amount,
    ) -> Result<TransferReceipt, LedgerError> {
        let mut accounts = self.lock()?;

        let available = *accounts
            .get(from)
            .ok_or_else(|| LedgerError::UnknownAccount(from.clone()))?;
        let debited = available.checked_sub(amount).map_err(|_| {
            warn!(account = %from, required = %amount, available = %available, "Transfer rejected");
            LedgerError::InsufficientFunds {
                account: from.clone(),
                required: amount,
                available,
            }
        })?;

        if from != to {
            let current = accounts.get(to).copied().unwrap_or(Amount::ZERO);
            let credited = current
                .checked_add(amount)
                .map_err(|_| LedgerError::Overflow(to.clone()))?;
            accounts.insert(from.clone(), debited);
            accounts.insert(to.clone(), credited);
        }

        let receipt = TransferReceipt {
            transfer_id: uuid::Uuid::new_v4().to_string(),
            from: from.clone(),
            to: to.clone(),
            amount,
            settled_at: Utc::now(),
        };
        debug!(
            transfer_id = %receipt.transfer_id,
            from = %from,
            to = %to,
            amount = %amount,
            "Transfer settled"
        );
        Ok(receipt)
    }
}
