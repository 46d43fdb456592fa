#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use surety_ledger::{IdentityLedger, InMemoryLedger, LedgerError, TransferReceipt};
use surety_service::{Genesis, GovernanceFacade, SuretyConfig};
use surety_types::{Amount, FlightKey, Identity};

pub const DEPARTURE: i64 = 1_700_000_000;

pub fn id(name: &str) -> Identity {
    Identity::new(name)
}

pub fn flight() -> FlightKey {
    FlightKey::new("a0", "FS1234", DEPARTURE)
}

pub fn genesis() -> Genesis {
    Genesis {
        authority: id("authority"),
        airline: id("a0"),
    }
}

/// Ledger with the authority, an oracle, airlines a0..a7 (100 units each)
/// and passengers p1, p2 (50 units each).
pub fn funded_ledger() -> Arc<InMemoryLedger> {
    let _ = surety_service::init_tracing();

    let ledger = Arc::new(InMemoryLedger::new());
    ledger.open_account("authority", Amount::ZERO).unwrap();
    ledger.open_account("oracle", Amount::ZERO).unwrap();
    for i in 0..8 {
        ledger
            .open_account(format!("a{i}"), Amount::units(100))
            .unwrap();
    }
    for passenger in ["p1", "p2"] {
        ledger.open_account(passenger, Amount::units(50)).unwrap();
    }
    ledger
}

pub fn facade_with(ledger: Arc<dyn IdentityLedger>, config: SuretyConfig) -> GovernanceFacade {
    GovernanceFacade::bootstrap(config, genesis(), ledger).unwrap()
}

pub fn facade(ledger: Arc<InMemoryLedger>) -> GovernanceFacade {
    facade_with(ledger, SuretyConfig::default())
}

/// Genesis airline registers a1..a3 directly and each funds itself.
pub async fn federation_of_four(facade: &GovernanceFacade) {
    for name in ["a1", "a2", "a3"] {
        facade
            .apply_and_maybe_register(&id("a0"), &id(name))
            .await
            .unwrap();
        facade
            .fund_airline(&id(name), &id(name), Amount::units(10))
            .await
            .unwrap();
    }
}

pub fn balance(ledger: &InMemoryLedger, name: &str) -> Amount {
    ledger.balance(&id(name)).unwrap_or(Amount::ZERO)
}

/// Ledger whose transfers can be switched off to simulate a backend outage.
pub struct FlakyLedger {
    pub inner: InMemoryLedger,
    pub offline: AtomicBool,
}

impl FlakyLedger {
    pub fn new(inner: InMemoryLedger) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl IdentityLedger for FlakyLedger {
    fn authenticate(&self, claimed: &Identity) -> Result<Identity, LedgerError> {
        self.inner.authenticate(claimed)
    }

    fn transfer(
        &self,
        from: &Identity,
        to: &Identity,
        amount: Amount,
    ) -> Result<TransferReceipt, LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Backend("settlement rail offline".to_string()));
        }
        self.inner.transfer(from, to, amount)
    }
}
