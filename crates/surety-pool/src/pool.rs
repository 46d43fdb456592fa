use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use surety_types::{
    AirlineState, Amount, FlightKey, FlightOutcome, Identity, PayoutMultiplier, PolicyKey,
    PolicyState,
};
use tracing::{debug, info, warn};

use crate::error::PoolError;
use crate::policy::{
    FlightResolution, FlightStatusRequest, InsurancePolicy, PolicyView, ResolutionSummary,
};

/// Purchase caps and payout terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderwritingRules {
    pub max_premium: Amount,
    pub payout_multiplier: PayoutMultiplier,
}

impl Default for UnderwritingRules {
    fn default() -> Self {
        Self {
            max_premium: Amount::units(10),
            payout_multiplier: PayoutMultiplier::default(),
        }
    }
}

/// Serializable pool contents. Struct-keyed maps are flattened into lists
/// because every record carries its own key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub policies: Vec<InsurancePolicy>,
    pub credits: BTreeMap<Identity, Amount>,
    pub escrow: Amount,
    pub resolutions: Vec<FlightResolution>,
    pub status_requests: Vec<FlightStatusRequest>,
}

/// Insurance pool.
///
/// Escrow holds every premium and airline funding contribution. Resolution
/// only moves value into passenger credit balances; credits leave escrow
/// through [`InsurancePool::withdraw`].
#[derive(Debug, Clone)]
pub struct InsurancePool {
    rules: UnderwritingRules,
    policies: BTreeMap<PolicyKey, InsurancePolicy>,
    credits: BTreeMap<Identity, Amount>,
    escrow: Amount,
    resolutions: BTreeMap<FlightKey, FlightResolution>,
    status_requests: Vec<FlightStatusRequest>,
}

impl InsurancePool {
    pub fn new(rules: UnderwritingRules) -> Self {
        Self {
            rules,
            policies: BTreeMap::new(),
            credits: BTreeMap::new(),
            escrow: Amount::ZERO,
            resolutions: BTreeMap::new(),
            status_requests: Vec::new(),
        }
    }

    pub fn restore(rules: UnderwritingRules, snapshot: PoolSnapshot) -> Self {
        Self {
            rules,
            policies: snapshot
                .policies
                .into_iter()
                .map(|policy| (policy.key.clone(), policy))
                .collect(),
            credits: snapshot.credits,
            escrow: snapshot.escrow,
            resolutions: snapshot
                .resolutions
                .into_iter()
                .map(|resolution| (resolution.flight.clone(), resolution))
                .collect(),
            status_requests: snapshot.status_requests,
        }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            policies: self.policies.values().cloned().collect(),
            credits: self.credits.clone(),
            escrow: self.escrow,
            resolutions: self.resolutions.values().cloned().collect(),
            status_requests: self.status_requests.clone(),
        }
    }

    pub fn rules(&self) -> &UnderwritingRules {
        &self.rules
    }

    /// Add airline funding to escrow.
    pub fn deposit_reserve(&mut self, amount: Amount) -> Result<Amount, PoolError> {
        self.escrow = self
            .escrow
            .checked_add(amount)
            .map_err(|e| PoolError::AmountOverflow(e.to_string()))?;
        debug!(deposit = %amount, escrow = %self.escrow, "Reserve deposited");
        Ok(self.escrow)
    }

    /// Underwrite a policy.
    ///
    /// `underwriter` is the registry state of the covering airline; only a
    /// funded airline may underwrite.
    pub fn purchase(
        &mut self,
        key: PolicyKey,
        premium: Amount,
        underwriter: Option<AirlineState>,
    ) -> Result<&InsurancePolicy, PoolError> {
        if !underwriter.is_some_and(|state| state.is_funded()) {
            warn!(airline = %key.flight.airline, "Purchase rejected, airline not funded");
            return Err(PoolError::AirlineNotFunded(key.flight.airline.clone()));
        }
        if premium.is_zero() {
            return Err(PoolError::ZeroAmount);
        }
        if premium > self.rules.max_premium {
            return Err(PoolError::PremiumExceedsCap {
                premium,
                cap: self.rules.max_premium,
            });
        }
        if self.policies.contains_key(&key) {
            return Err(PoolError::AlreadyPurchased(key));
        }
        if self.resolutions.contains_key(&key.flight) {
            return Err(PoolError::FlightAlreadyResolved(key.flight));
        }

        let escrow = self
            .escrow
            .checked_add(premium)
            .map_err(|e| PoolError::AmountOverflow(e.to_string()))?;
        self.escrow = escrow;

        info!(policy = %key, premium = %premium, "Policy bought");
        let policy = self
            .policies
            .entry(key.clone())
            .or_insert_with(|| InsurancePolicy {
                key,
                premium,
                state: PolicyState::Bought,
                payout: Amount::ZERO,
                purchased_at: Utc::now(),
                resolved_at: None,
            });
        Ok(policy)
    }

    /// Record that a flight status was requested from the oracle.
    pub fn request_flight_status(
        &mut self,
        flight: FlightKey,
        requester: Identity,
    ) -> FlightStatusRequest {
        let request = FlightStatusRequest {
            flight,
            requester,
            requested_at: Utc::now(),
        };
        info!(
            flight = %request.flight,
            requester = %request.requester,
            "Flight status requested"
        );
        self.status_requests.push(request.clone());
        request
    }

    /// Resolve every bought policy on `flight` against the reported outcome.
    ///
    /// A flight resolves once. Later reports, and policies that are no longer
    /// `Bought`, are skipped without error.
    pub fn resolve(
        &mut self,
        flight: &FlightKey,
        outcome: FlightOutcome,
    ) -> Result<ResolutionSummary, PoolError> {
        if let Some(existing) = self.resolutions.get(flight) {
            debug!(
                flight = %flight,
                recorded = ?existing.outcome,
                reported = ?outcome,
                "Flight already resolved, report ignored"
            );
            return Ok(ResolutionSummary {
                already_resolved: true,
                ..ResolutionSummary::default()
            });
        }

        let now = Utc::now();
        let mut available = self.escrow.saturating_sub(self.outstanding_credits()?);
        let mut summary = ResolutionSummary::default();
        let mut credits = self.credits.clone();
        let mut settlements: Vec<(PolicyKey, PolicyState, Amount)> = Vec::new();

        // Price every policy before touching any of them.
        for policy in self
            .policies
            .values()
            .filter(|policy| policy.key.flight == *flight)
            .filter(|policy| policy.state == PolicyState::Bought)
        {
            if !outcome.pays_out() {
                summary.expired.push(policy.key.clone());
                settlements.push((policy.key.clone(), PolicyState::Expired, Amount::ZERO));
                continue;
            }

            let owed = self
                .rules
                .payout_multiplier
                .apply(policy.premium)
                .ok_or_else(|| PoolError::AmountOverflow(format!("payout for {}", policy.key)))?;
            let credit = owed.min(available);
            if credit < owed {
                warn!(
                    policy = %policy.key,
                    owed = %owed,
                    credit = %credit,
                    "Payout capped at pool solvency"
                );
            }
            available = available.saturating_sub(credit);

            let balance = credits
                .entry(policy.key.passenger.clone())
                .or_insert(Amount::ZERO);
            *balance = balance
                .checked_add(credit)
                .map_err(|e| PoolError::AmountOverflow(e.to_string()))?;
            summary.total_credited = summary
                .total_credited
                .checked_add(credit)
                .map_err(|e| PoolError::AmountOverflow(e.to_string()))?;

            summary.paid.push(policy.key.clone());
            settlements.push((policy.key.clone(), PolicyState::Paid, credit));
        }

        for (key, state, payout) in settlements {
            if let Some(policy) = self.policies.get_mut(&key) {
                policy.state = state;
                policy.payout = payout;
                policy.resolved_at = Some(now);
            }
        }
        self.credits = credits;
        self.resolutions.insert(
            flight.clone(),
            FlightResolution {
                flight: flight.clone(),
                outcome,
                resolved_at: now,
            },
        );

        info!(
            flight = %flight,
            outcome = ?outcome,
            paid = summary.paid.len(),
            expired = summary.expired.len(),
            credited = %summary.total_credited,
            "Flight resolved"
        );
        Ok(summary)
    }

    /// Release a passenger's whole credit balance from escrow.
    ///
    /// Returns the amount the caller must settle with the ledger.
    pub fn withdraw(&mut self, passenger: &Identity) -> Result<Amount, PoolError> {
        let balance = self
            .credits
            .get(passenger)
            .copied()
            .filter(|amount| !amount.is_zero())
            .ok_or_else(|| PoolError::NothingToWithdraw(passenger.clone()))?;

        self.escrow = self
            .escrow
            .checked_sub(balance)
            .map_err(|e| PoolError::AmountOverflow(e.to_string()))?;
        self.credits.remove(passenger);

        info!(passenger = %passenger, amount = %balance, escrow = %self.escrow, "Credit withdrawn");
        Ok(balance)
    }

    pub fn policy(&self, key: &PolicyKey) -> Option<&InsurancePolicy> {
        self.policies.get(key)
    }

    pub fn policy_view(&self, key: &PolicyKey) -> PolicyView {
        self.policies
            .get(key)
            .map(PolicyView::from)
            .unwrap_or_else(|| PolicyView::not_purchased(key.clone()))
    }

    pub fn policies_for_flight<'a>(
        &'a self,
        flight: &'a FlightKey,
    ) -> impl Iterator<Item = &'a InsurancePolicy> + 'a {
        self.policies
            .values()
            .filter(move |policy| policy.key.flight == *flight)
    }

    pub fn credit_balance(&self, passenger: &Identity) -> Amount {
        self.credits.get(passenger).copied().unwrap_or(Amount::ZERO)
    }

    pub fn escrow_balance(&self) -> Amount {
        self.escrow
    }

    /// Sum of all unwithdrawn passenger credits.
    pub fn outstanding_credits(&self) -> Result<Amount, PoolError> {
        self.credits
            .values()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(*amount))
            .map_err(|e| PoolError::AmountOverflow(e.to_string()))
    }

    pub fn flight_resolution(&self, flight: &FlightKey) -> Option<&FlightResolution> {
        self.resolutions.get(flight)
    }

    pub fn status_requests(&self, flight: &FlightKey) -> Vec<&FlightStatusRequest> {
        self.status_requests
            .iter()
            .filter(|request| request.flight == *flight)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FUNDED: Option<AirlineState> = Some(AirlineState::Funded);

    fn flight() -> FlightKey {
        FlightKey::new("a0", "FS1234", 1_700_000_000)
    }

    fn key(passenger: &str) -> PolicyKey {
        PolicyKey::new(passenger, flight())
    }

    fn pool_with_reserve(reserve: Amount) -> InsurancePool {
        let mut pool = InsurancePool::new(UnderwritingRules::default());
        pool.deposit_reserve(reserve).unwrap();
        pool
    }

    #[test]
    fn purchase_requires_a_funded_airline() {
        let mut pool = InsurancePool::new(UnderwritingRules::default());
        for state in [None, Some(AirlineState::Applied), Some(AirlineState::Registered)] {
            let err = pool.purchase(key("p1"), Amount::units(1), state).unwrap_err();
            assert_eq!(err, PoolError::AirlineNotFunded(Identity::new("a0")));
        }
        assert_eq!(pool.policy_view(&key("p1")).state, PolicyState::NotPurchased);
    }

    #[test]
    fn purchase_creates_a_bought_policy_and_escrows_premium() {
        let mut pool = InsurancePool::new(UnderwritingRules::default());
        let policy = pool.purchase(key("p1"), Amount::units(10), FUNDED).unwrap();

        assert_eq!(policy.state, PolicyState::Bought);
        assert_eq!(policy.state.ordinal(), 2);
        assert_eq!(pool.escrow_balance(), Amount::units(10));
    }

    #[test]
    fn premium_cap_and_zero_premium_are_rejected() {
        let mut pool = InsurancePool::new(UnderwritingRules::default());
        assert!(matches!(
            pool.purchase(key("p1"), Amount::minor(10_000_001), FUNDED),
            Err(PoolError::PremiumExceedsCap { .. })
        ));
        assert_eq!(
            pool.purchase(key("p1"), Amount::ZERO, FUNDED).unwrap_err(),
            PoolError::ZeroAmount
        );
        assert_eq!(pool.escrow_balance(), Amount::ZERO);
    }

    #[test]
    fn repurchase_is_rejected() {
        let mut pool = InsurancePool::new(UnderwritingRules::default());
        pool.purchase(key("p1"), Amount::units(1), FUNDED).unwrap();
        let err = pool.purchase(key("p1"), Amount::units(1), FUNDED).unwrap_err();
        assert_eq!(err, PoolError::AlreadyPurchased(key("p1")));
        assert_eq!(pool.escrow_balance(), Amount::units(1));
    }

    #[test]
    fn carrier_delay_pays_every_bought_policy() {
        let mut pool = pool_with_reserve(Amount::units(100));
        pool.purchase(key("p1"), Amount::units(2), FUNDED).unwrap();
        pool.purchase(key("p2"), Amount::units(4), FUNDED).unwrap();

        let summary = pool.resolve(&flight(), FlightOutcome::DelayedByCarrier).unwrap();

        assert_eq!(summary.paid.len(), 2);
        assert_eq!(summary.total_credited, Amount::units(9));
        assert_eq!(pool.credit_balance(&Identity::new("p1")), Amount::units(3));
        assert_eq!(pool.credit_balance(&Identity::new("p2")), Amount::units(6));
        assert_eq!(pool.policy_view(&key("p1")).state, PolicyState::Paid);
    }

    #[test]
    fn on_time_expires_without_credit() {
        let mut pool = pool_with_reserve(Amount::units(100));
        pool.purchase(key("p1"), Amount::units(2), FUNDED).unwrap();

        let summary = pool.resolve(&flight(), FlightOutcome::OnTime).unwrap();

        assert_eq!(summary.expired, vec![key("p1")]);
        assert_eq!(pool.credit_balance(&Identity::new("p1")), Amount::ZERO);
        let view = pool.policy_view(&key("p1"));
        assert_eq!(view.state, PolicyState::Expired);
        assert_eq!(view.payout, Amount::ZERO);
    }

    #[test]
    fn resolving_twice_equals_resolving_once() {
        let mut pool = pool_with_reserve(Amount::units(100));
        pool.purchase(key("p1"), Amount::units(2), FUNDED).unwrap();

        pool.resolve(&flight(), FlightOutcome::DelayedByCarrier).unwrap();
        let once = pool.snapshot();

        let again = pool.resolve(&flight(), FlightOutcome::OnTime).unwrap();
        assert!(again.already_resolved);
        assert!(again.is_noop());
        assert_eq!(pool.snapshot(), once);
    }

    #[test]
    fn resolution_for_unknown_flight_changes_no_policy() {
        let mut pool = pool_with_reserve(Amount::units(100));
        pool.purchase(key("p1"), Amount::units(2), FUNDED).unwrap();

        let other = FlightKey::new("a0", "FS9999", 1_700_000_000);
        let summary = pool.resolve(&other, FlightOutcome::DelayedByCarrier).unwrap();

        assert!(summary.is_noop());
        assert_eq!(pool.policy_view(&key("p1")).state, PolicyState::Bought);
    }

    #[test]
    fn purchase_after_resolution_is_rejected() {
        let mut pool = pool_with_reserve(Amount::units(100));
        pool.resolve(&flight(), FlightOutcome::OnTime).unwrap();
        let err = pool.purchase(key("p1"), Amount::units(1), FUNDED).unwrap_err();
        assert_eq!(err, PoolError::FlightAlreadyResolved(flight()));
    }

    #[test]
    fn payout_is_capped_at_solvency() {
        // No reserve: only the premiums themselves back the payouts.
        let mut pool = InsurancePool::new(UnderwritingRules::default());
        pool.purchase(key("p1"), Amount::units(10), FUNDED).unwrap();

        let summary = pool.resolve(&flight(), FlightOutcome::DelayedByCarrier).unwrap();

        assert_eq!(summary.total_credited, Amount::units(10));
        assert_eq!(pool.policy_view(&key("p1")).payout, Amount::units(10));
        assert_eq!(pool.outstanding_credits().unwrap(), pool.escrow_balance());
    }

    #[test]
    fn failed_resolution_leaves_every_policy_untouched() {
        let rules = UnderwritingRules {
            max_premium: Amount::minor(u64::MAX),
            ..UnderwritingRules::default()
        };
        let mut pool = InsurancePool::new(rules);
        pool.purchase(key("p1"), Amount::units(2), FUNDED).unwrap();
        let oversized = Amount::minor(13_000_000_000_000_000_000);
        pool.purchase(key("p2"), oversized, FUNDED).unwrap();
        let before = pool.snapshot();

        let err = pool
            .resolve(&flight(), FlightOutcome::DelayedByCarrier)
            .unwrap_err();
        assert!(matches!(err, PoolError::AmountOverflow(_)));
        assert_eq!(pool.snapshot(), before);

        let p1 = pool.policy_view(&key("p1"));
        assert_eq!(p1.state, PolicyState::Bought);
        assert_eq!(p1.payout, Amount::ZERO);
        assert!(pool.flight_resolution(&flight()).is_none());
    }

    #[test]
    fn withdraw_zeroes_balance_and_fails_when_empty() {
        let mut pool = pool_with_reserve(Amount::units(100));
        pool.purchase(key("p1"), Amount::units(2), FUNDED).unwrap();
        pool.resolve(&flight(), FlightOutcome::DelayedByCarrier).unwrap();

        let paid = pool.withdraw(&Identity::new("p1")).unwrap();
        assert_eq!(paid, Amount::units(3));
        assert_eq!(pool.credit_balance(&Identity::new("p1")), Amount::ZERO);
        assert_eq!(pool.escrow_balance(), Amount::units(99));

        let err = pool.withdraw(&Identity::new("p1")).unwrap_err();
        assert_eq!(err, PoolError::NothingToWithdraw(Identity::new("p1")));
    }

    #[test]
    fn status_requests_are_not_deduplicated() {
        let mut pool = InsurancePool::new(UnderwritingRules::default());
        pool.request_flight_status(flight(), Identity::new("p1"));
        pool.request_flight_status(flight(), Identity::new("p1"));
        assert_eq!(pool.status_requests(&flight()).len(), 2);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut pool = pool_with_reserve(Amount::units(100));
        pool.purchase(key("p1"), Amount::units(2), FUNDED).unwrap();
        pool.resolve(&flight(), FlightOutcome::DelayedByCarrier).unwrap();

        let json = serde_json::to_string(&pool.snapshot()).unwrap();
        let restored =
            InsurancePool::restore(UnderwritingRules::default(), serde_json::from_str(&json).unwrap());

        assert_eq!(restored.snapshot(), pool.snapshot());
        assert_eq!(restored.credit_balance(&Identity::new("p1")), Amount::units(3));
    }

    proptest! {
        #[test]
        fn property_credits_never_exceed_escrow(
            reserve in 0u64..50,
            premiums in proptest::collection::vec(1u64..=10, 1..8),
            delayed in any::<bool>(),
        ) {
            let mut pool = pool_with_reserve(Amount::units(reserve));
            for (i, premium) in premiums.iter().enumerate() {
                pool.purchase(key(&format!("p{i}")), Amount::units(*premium), FUNDED).unwrap();
            }
            let outcome = if delayed { FlightOutcome::DelayedByCarrier } else { FlightOutcome::OnTime };

            pool.resolve(&flight(), outcome).unwrap();
            let once = pool.snapshot();
            pool.resolve(&flight(), outcome).unwrap();

            prop_assert_eq!(pool.snapshot(), once);
            prop_assert!(pool.outstanding_credits().unwrap() <= pool.escrow_balance());
            for policy in pool.policies_for_flight(&flight()) {
                prop_assert!(policy.state.is_terminal());
            }
        }
    }
}
