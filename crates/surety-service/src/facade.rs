use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use surety_ledger::{IdentityLedger, LedgerError, TransferReceipt};
use surety_pool::{
    FlightResolution, FlightStatusRequest, InsurancePool, PolicyView, ResolutionSummary,
};
use surety_registry::{Admission, AirlineRecord, AirlineRegistry, FundingOutcome, VoteOutcome};
use surety_types::{Amount, FlightKey, FlightOutcome, Identity, PolicyKey};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::SuretyConfig;
use crate::error::{SuretyError, SuretyResult};
use crate::journal::{AuditJournal, JournalEntry, JournalKind};
use crate::store::{CoreSnapshot, SnapshotStore, SNAPSHOT_VERSION};

/// Identities fixed when the federation is first created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genesis {
    /// Sole holder of the pause switch and the oracle allow-list.
    pub authority: Identity,
    /// Bootstrapping airline, seeded as funded.
    pub airline: Identity,
}

/// Decision state. Cloned into a working copy for every mutation.
#[derive(Debug, Clone)]
struct CoreState {
    authority: Identity,
    operational: bool,
    oracles: BTreeSet<Identity>,
    registry: AirlineRegistry,
    pool: InsurancePool,
}

/// Live state plus the journal. The journal is appended in place and
/// truncated back if the commit fails.
#[derive(Debug)]
struct Federation {
    state: CoreState,
    journal: AuditJournal,
}

impl Federation {
    fn genesis(config: &SuretyConfig, genesis: &Genesis) -> SuretyResult<Self> {
        let mut registry = AirlineRegistry::new(config.registry);
        registry.seed_genesis(genesis.airline.clone())?;

        let mut journal = AuditJournal::new();
        journal.append(
            JournalKind::Genesis,
            &genesis.authority,
            genesis.airline.to_string(),
            json!({ "funding": config.registry.min_funding }),
        )?;

        Ok(Self {
            state: CoreState {
                authority: genesis.authority.clone(),
                operational: true,
                oracles: BTreeSet::new(),
                registry,
                pool: InsurancePool::new(config.underwriting),
            },
            journal,
        })
    }

    fn restore(config: &SuretyConfig, snapshot: CoreSnapshot) -> SuretyResult<Self> {
        let registry = AirlineRegistry::restore(config.registry, snapshot.registry)
            .map_err(|e| SuretyError::Config(format!("snapshot rejected: {e}")))?;
        Ok(Self {
            state: CoreState {
                authority: snapshot.authority,
                operational: snapshot.operational,
                oracles: snapshot.oracles,
                registry,
                pool: InsurancePool::restore(config.underwriting, snapshot.pool),
            },
            journal: AuditJournal::from_entries(snapshot.journal)?,
        })
    }
}

impl CoreState {
    fn snapshot(&self, journal: &AuditJournal) -> CoreSnapshot {
        CoreSnapshot {
            version: SNAPSHOT_VERSION,
            authority: self.authority.clone(),
            operational: self.operational,
            oracles: self.oracles.clone(),
            registry: self.registry.snapshot(),
            pool: self.pool.snapshot(),
            journal: journal.entries().to_vec(),
        }
    }

    fn require_authority(&self, caller: &Identity) -> SuretyResult<()> {
        if *caller == self.authority {
            Ok(())
        } else {
            warn!(caller = %caller, "Governance action rejected, caller is not the authority");
            Err(SuretyError::unauthorized(caller, "not the federation authority"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseGate {
    Enforced,
    Bypassed,
}

struct Settlement {
    from: Identity,
    to: Identity,
    amount: Amount,
}

struct PendingEntry {
    kind: JournalKind,
    subject: String,
    payload: Value,
}

/// What an operation did to the working copy.
struct Mutation<T> {
    value: T,
    settlement: Option<Settlement>,
    entry: Option<PendingEntry>,
}

impl<T> Mutation<T> {
    fn journaled(value: T, kind: JournalKind, subject: impl Into<String>, payload: Value) -> Self {
        Self {
            value,
            settlement: None,
            entry: Some(PendingEntry {
                kind,
                subject: subject.into(),
                payload,
            }),
        }
    }

    fn unchanged(value: T) -> Self {
        Self {
            value,
            settlement: None,
            entry: None,
        }
    }

    fn settled(mut self, from: Identity, to: Identity, amount: Amount) -> Self {
        self.settlement = Some(Settlement { from, to, amount });
        self
    }
}

/// Single entry point to the federation.
///
/// Every mutating call is serialized through one async mutex and runs
/// against a clone of the decision state. The clone replaces the live state
/// only after the ledger transfer (if any), the journal append and the
/// snapshot write have all succeeded; on failure the journal is truncated
/// back and nothing is left behind.
pub struct GovernanceFacade {
    config: SuretyConfig,
    ledger: Arc<dyn IdentityLedger>,
    store: Option<SnapshotStore>,
    federation: Mutex<Federation>,
}

impl GovernanceFacade {
    /// Create the federation, or resume it from the configured snapshot.
    pub fn bootstrap(
        config: SuretyConfig,
        genesis: Genesis,
        ledger: Arc<dyn IdentityLedger>,
    ) -> SuretyResult<Self> {
        config.validate()?;
        let store = config.storage.snapshot_path.clone().map(SnapshotStore::new);
        let persisted = match &store {
            Some(store) => store.load()?,
            None => None,
        };

        let federation = match persisted {
            Some(snapshot) => {
                if snapshot.authority != genesis.authority {
                    return Err(SuretyError::Config(format!(
                        "snapshot belongs to authority {}, not {}",
                        snapshot.authority, genesis.authority
                    )));
                }
                let federation = Federation::restore(&config, snapshot)?;
                info!(
                    airlines = federation.state.registry.exist_count(),
                    journal_entries = federation.journal.len(),
                    operational = federation.state.operational,
                    "Federation restored from snapshot"
                );
                federation
            }
            None => {
                let federation = Federation::genesis(&config, &genesis)?;
                if let Some(store) = &store {
                    store.save(&federation.state.snapshot(&federation.journal))?;
                }
                info!(
                    authority = %genesis.authority,
                    airline = %genesis.airline,
                    "Federation bootstrapped"
                );
                federation
            }
        };

        Ok(Self {
            config,
            ledger,
            store,
            federation: Mutex::new(federation),
        })
    }

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    // =========================================================================
    // Registry operations
    // =========================================================================

    /// File an application for `candidate`; the caller is the sponsor.
    pub async fn apply_and_maybe_register(
        &self,
        caller: &Identity,
        candidate: &Identity,
    ) -> SuretyResult<Admission> {
        self.execute(caller, PauseGate::Enforced, |sponsor, state| {
            let admission = state.registry.apply_and_maybe_register(candidate, sponsor)?;
            Ok(Mutation::journaled(
                admission,
                JournalKind::Application,
                candidate.to_string(),
                json!({ "sponsor": sponsor, "admission": admission }),
            ))
        })
        .await
    }

    pub async fn vote_for_airline(
        &self,
        caller: &Identity,
        candidate: &Identity,
    ) -> SuretyResult<VoteOutcome> {
        self.execute(caller, PauseGate::Enforced, |voter, state| {
            let outcome = state.registry.vote_for_airline(candidate, voter)?;
            Ok(Mutation::journaled(
                outcome,
                JournalKind::Vote,
                candidate.to_string(),
                json!({
                    "votes": outcome.votes,
                    "registered": outcome.registered_count,
                    "admitted": outcome.admitted,
                }),
            ))
        })
        .await
    }

    /// Contribute `amount` toward `airline`'s funding. The caller pays.
    pub async fn fund_airline(
        &self,
        caller: &Identity,
        airline: &Identity,
        amount: Amount,
    ) -> SuretyResult<FundingOutcome> {
        let escrow = &self.config.escrow_account;
        self.execute(caller, PauseGate::Enforced, |payer, state| {
            let outcome = state.registry.fund_airline(airline, amount)?;
            state.pool.deposit_reserve(amount)?;
            Ok(Mutation::journaled(
                outcome,
                JournalKind::Funding,
                airline.to_string(),
                json!({
                    "amount": amount,
                    "funding": outcome.funding_amount,
                    "became_funded": outcome.became_funded,
                }),
            )
            .settled(payer.clone(), escrow.clone(), amount))
        })
        .await
    }

    // =========================================================================
    // Pool operations
    // =========================================================================

    /// Buy a policy on `flight`; the caller is the insured passenger.
    pub async fn purchase(
        &self,
        caller: &Identity,
        flight: FlightKey,
        premium: Amount,
    ) -> SuretyResult<PolicyView> {
        let escrow = &self.config.escrow_account;
        self.execute(caller, PauseGate::Enforced, |passenger, state| {
            let underwriter = state.registry.state_of(&flight.airline);
            let key = PolicyKey::new(passenger.clone(), flight);
            let view = PolicyView::from(state.pool.purchase(key.clone(), premium, underwriter)?);
            Ok(Mutation::journaled(
                view.clone(),
                JournalKind::Purchase,
                key.to_string(),
                json!({ "premium": premium }),
            )
            .settled(passenger.clone(), escrow.clone(), premium))
        })
        .await
    }

    /// Pay out the caller's whole credit balance.
    pub async fn withdraw(&self, caller: &Identity) -> SuretyResult<Amount> {
        let escrow = &self.config.escrow_account;
        self.execute(caller, PauseGate::Enforced, |passenger, state| {
            let amount = state.pool.withdraw(passenger)?;
            Ok(Mutation::journaled(
                amount,
                JournalKind::Withdrawal,
                passenger.to_string(),
                json!({ "amount": amount }),
            )
            .settled(escrow.clone(), passenger.clone(), amount))
        })
        .await
    }

    pub async fn request_flight_status(
        &self,
        caller: &Identity,
        flight: FlightKey,
    ) -> SuretyResult<FlightStatusRequest> {
        self.execute(caller, PauseGate::Enforced, |requester, state| {
            let request = state.pool.request_flight_status(flight, requester.clone());
            Ok(Mutation::journaled(
                request.clone(),
                JournalKind::StatusRequest,
                request.flight.to_string(),
                json!({ "requested_at": request.requested_at }),
            ))
        })
        .await
    }

    /// Oracle callback reporting a flight outcome.
    ///
    /// Only the first report for a flight changes anything; repeats return a
    /// summary with `already_resolved` set and are not journaled.
    #[doc(alias = "report_flight_status")]
    pub async fn resolve(
        &self,
        caller: &Identity,
        flight: FlightKey,
        outcome: FlightOutcome,
    ) -> SuretyResult<ResolutionSummary> {
        self.execute(caller, PauseGate::Enforced, |oracle, state| {
            if !state.oracles.contains(oracle) {
                warn!(
                    caller = %oracle,
                    flight = %flight,
                    "Resolution rejected, caller is not an oracle"
                );
                return Err(SuretyError::unauthorized(oracle, "not an authorized oracle"));
            }

            let summary = state.pool.resolve(&flight, outcome)?;
            if summary.already_resolved {
                return Ok(Mutation::unchanged(summary));
            }
            Ok(Mutation::journaled(
                summary.clone(),
                JournalKind::Resolution,
                flight.to_string(),
                json!({
                    "outcome": outcome,
                    "status_code": outcome.status_code(),
                    "paid": summary.paid.len(),
                    "expired": summary.expired.len(),
                    "credited": summary.total_credited,
                }),
            ))
        })
        .await
    }

    // =========================================================================
    // Governance
    // =========================================================================

    /// Flip the circuit breaker. Authority only; allowed while paused.
    pub async fn set_operational(&self, caller: &Identity, operational: bool) -> SuretyResult<()> {
        self.execute(caller, PauseGate::Bypassed, |authority, state| {
            state.require_authority(authority)?;
            if state.operational == operational {
                return Ok(Mutation::unchanged(()));
            }
            state.operational = operational;
            info!(operational, "Operational flag changed");
            Ok(Mutation::journaled(
                (),
                JournalKind::Governance,
                "operational",
                json!({ "operational": operational }),
            ))
        })
        .await
    }

    /// Allow `oracle` to report flight outcomes. Returns false if it already
    /// could.
    pub async fn authorize_oracle(
        &self,
        caller: &Identity,
        oracle: &Identity,
    ) -> SuretyResult<bool> {
        self.execute(caller, PauseGate::Enforced, |authority, state| {
            state.require_authority(authority)?;
            if !state.oracles.insert(oracle.clone()) {
                return Ok(Mutation::unchanged(false));
            }
            info!(oracle = %oracle, "Oracle authorized");
            Ok(Mutation::journaled(
                true,
                JournalKind::Governance,
                oracle.to_string(),
                json!({ "oracle": "authorized" }),
            ))
        })
        .await
    }

    /// Returns false if `oracle` was not authorized.
    pub async fn revoke_oracle(
        &self,
        caller: &Identity,
        oracle: &Identity,
    ) -> SuretyResult<bool> {
        self.execute(caller, PauseGate::Enforced, |authority, state| {
            state.require_authority(authority)?;
            if !state.oracles.remove(oracle) {
                return Ok(Mutation::unchanged(false));
            }
            info!(oracle = %oracle, "Oracle revoked");
            Ok(Mutation::journaled(
                true,
                JournalKind::Governance,
                oracle.to_string(),
                json!({ "oracle": "revoked" }),
            ))
        })
        .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn is_operational(&self) -> bool {
        self.federation.lock().await.state.operational
    }

    pub async fn is_oracle(&self, id: &Identity) -> bool {
        self.federation.lock().await.state.oracles.contains(id)
    }

    pub async fn is_registered(&self, airline: &Identity) -> bool {
        self.federation.lock().await.state.registry.is_registered(airline)
    }

    pub async fn is_funded(&self, airline: &Identity) -> bool {
        self.federation.lock().await.state.registry.is_funded(airline)
    }

    pub async fn registered_airlines_count(&self) -> usize {
        self.federation.lock().await.state.registry.registered_count()
    }

    pub async fn exist_airlines_count(&self) -> usize {
        self.federation.lock().await.state.registry.exist_count()
    }

    pub async fn funded_airlines_count(&self) -> usize {
        self.federation.lock().await.state.registry.funded_count()
    }

    pub async fn airline(&self, id: &Identity) -> Option<AirlineRecord> {
        self.federation.lock().await.state.registry.airline(id).cloned()
    }

    pub async fn get_policy(&self, key: &PolicyKey) -> PolicyView {
        self.federation.lock().await.state.pool.policy_view(key)
    }

    pub async fn credit_balance(&self, passenger: &Identity) -> Amount {
        self.federation.lock().await.state.pool.credit_balance(passenger)
    }

    pub async fn escrow_balance(&self) -> Amount {
        self.federation.lock().await.state.pool.escrow_balance()
    }

    pub async fn flight_resolution(&self, flight: &FlightKey) -> Option<FlightResolution> {
        self.federation.lock().await.state.pool.flight_resolution(flight).cloned()
    }

    pub async fn status_requests(&self, flight: &FlightKey) -> Vec<FlightStatusRequest> {
        self.federation
            .lock()
            .await
            .state
            .pool
            .status_requests(flight)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn journal(&self) -> Vec<JournalEntry> {
        self.federation.lock().await.journal.entries().to_vec()
    }

    pub async fn verify_journal(&self) -> bool {
        self.federation.lock().await.journal.verify_chain()
    }

    // =========================================================================
    // Commit pipeline
    // =========================================================================

    async fn execute<T, F>(&self, caller: &Identity, gate: PauseGate, op: F) -> SuretyResult<T>
    where
        F: FnOnce(&Identity, &mut CoreState) -> SuretyResult<Mutation<T>>,
    {
        let mut guard = self.federation.lock().await;
        let federation = &mut *guard;
        if gate == PauseGate::Enforced && !federation.state.operational {
            warn!(caller = %caller, "Mutation rejected, system paused");
            return Err(SuretyError::SystemPaused);
        }

        let actor = self.authenticate(caller)?;
        let mut working = federation.state.clone();
        let Mutation {
            value,
            settlement,
            entry,
        } = op(&actor, &mut working)?;

        let Some(entry) = entry else {
            return Ok(value);
        };

        let receipt = match settlement {
            Some(settlement) => Some(self.ledger.transfer(
                &settlement.from,
                &settlement.to,
                settlement.amount,
            )?),
            None => None,
        };

        let checkpoint = federation.journal.len();
        let committed = self.commit(
            &actor,
            &working,
            &mut federation.journal,
            entry,
            receipt.as_ref(),
        );
        if let Err(err) = committed {
            federation.journal.truncate(checkpoint);
            if let Some(receipt) = &receipt {
                self.reverse(receipt);
            }
            return Err(err);
        }

        federation.state = working;
        Ok(value)
    }

    fn commit(
        &self,
        actor: &Identity,
        working: &CoreState,
        journal: &mut AuditJournal,
        entry: PendingEntry,
        receipt: Option<&TransferReceipt>,
    ) -> SuretyResult<()> {
        let payload = json!({ "detail": entry.payload, "transfer": receipt });
        journal.append(entry.kind, actor, entry.subject, payload)?;

        if let Some(store) = &self.store {
            store.save(&working.snapshot(journal))?;
        }
        Ok(())
    }

    fn reverse(&self, receipt: &TransferReceipt) {
        match self
            .ledger
            .transfer(&receipt.to, &receipt.from, receipt.amount)
        {
            Ok(reversal) => warn!(
                transfer_id = %receipt.transfer_id,
                reversal_id = %reversal.transfer_id,
                "Transfer reversed after failed commit"
            ),
            Err(err) => error!(
                transfer_id = %receipt.transfer_id,
                error = %err,
                "Transfer reversal failed, ledger needs manual reconciliation"
            ),
        }
    }

    fn authenticate(&self, claimed: &Identity) -> SuretyResult<Identity> {
        self.ledger.authenticate(claimed).map_err(|err| match err {
            LedgerError::UnknownAccount(_) => {
                warn!(caller = %claimed, "Authentication failed");
                SuretyError::unauthorized(claimed, "unknown account")
            }
            other => other.into(),
        })
    }
}
