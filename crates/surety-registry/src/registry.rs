use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use surety_types::{AirlineState, Amount, Identity};
use tracing::{debug, info, warn};

use crate::error::RegistryError;

/// Admission and funding thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryRules {
    /// Direct (single-sponsor) admission is open while fewer than this many
    /// airlines are registered.
    pub direct_admission_limit: usize,
    /// Fraction of registered airlines that must vote for a candidate.
    pub quorum: QuorumRatio,
    /// Funding a registered airline must accumulate to become funded.
    pub min_funding: Amount,
}

impl Default for RegistryRules {
    fn default() -> Self {
        Self {
            direct_admission_limit: 4,
            quorum: QuorumRatio::default(),
            min_funding: Amount::units(10),
        }
    }
}

/// Quorum fraction. Ties round in favour of admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumRatio {
    pub numerator: u64,
    pub denominator: u64,
}

impl QuorumRatio {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// `votes / registered >= numerator / denominator`, without division.
    pub fn is_reached(&self, votes: usize, registered: usize) -> bool {
        let votes = votes as u128 * u128::from(self.denominator);
        let needed = registered as u128 * u128::from(self.numerator);
        votes >= needed
    }
}

impl Default for QuorumRatio {
    fn default() -> Self {
        Self::new(1, 2)
    }
}

/// A single airline known to the federation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirlineRecord {
    pub id: Identity,
    pub state: AirlineState,
    pub votes_received: BTreeSet<Identity>,
    pub funding_amount: Amount,
    /// Airline that filed the application; `None` for the genesis airline.
    pub sponsor: Option<Identity>,
    pub applied_at: DateTime<Utc>,
    pub registered_at: Option<DateTime<Utc>>,
    pub funded_at: Option<DateTime<Utc>>,
}

/// Result of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// Admitted directly; the returned state is `Registered` or, when the
    /// candidate was already funded, `Funded`.
    Admitted(AirlineState),
    /// Direct admission is closed; the candidate waits for quorum.
    PendingVotes,
}

/// Result of a recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub votes: usize,
    pub registered_count: usize,
    /// True only on the vote that crossed the quorum.
    pub admitted: bool,
    pub state: AirlineState,
}

/// Result of a funding contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingOutcome {
    pub funding_amount: Amount,
    pub state: AirlineState,
    /// True only on the contribution that moved the airline to `Funded`.
    pub became_funded: bool,
}

/// Serializable registry contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub airlines: BTreeMap<Identity, AirlineRecord>,
}

/// Airline registry: admission, quorum voting and funding.
///
/// Counters are always derived from the airline set; nothing is cached.
#[derive(Debug, Clone)]
pub struct AirlineRegistry {
    rules: RegistryRules,
    airlines: BTreeMap<Identity, AirlineRecord>,
}

impl AirlineRegistry {
    pub fn new(rules: RegistryRules) -> Self {
        Self {
            rules,
            airlines: BTreeMap::new(),
        }
    }

    /// Rebuild a registry from persisted records under the current rules.
    ///
    /// The genesis airline's stake is notional and is rebased to the current
    /// `min_funding`. Any other funded airline whose contributions fall short
    /// of a raised minimum is rejected, since funded status never regresses.
    pub fn restore(
        rules: RegistryRules,
        snapshot: RegistrySnapshot,
    ) -> Result<Self, RegistryError> {
        let mut airlines = snapshot.airlines;
        for record in airlines.values_mut() {
            if !record.state.is_funded() || record.funding_amount >= rules.min_funding {
                continue;
            }
            if record.sponsor.is_none() {
                debug!(
                    airline = %record.id,
                    from = %record.funding_amount,
                    to = %rules.min_funding,
                    "Genesis stake rebased"
                );
                record.funding_amount = rules.min_funding;
            } else {
                warn!(
                    airline = %record.id,
                    funding = %record.funding_amount,
                    min_funding = %rules.min_funding,
                    "Funded airline below configured minimum"
                );
                return Err(RegistryError::invalid_state(
                    &record.id,
                    format!(
                        "funded with {} but min_funding is {}",
                        record.funding_amount, rules.min_funding
                    ),
                ));
            }
        }

        Ok(Self { rules, airlines })
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            airlines: self.airlines.clone(),
        }
    }

    pub fn rules(&self) -> &RegistryRules {
        &self.rules
    }

    /// Seed the bootstrapping airline as funded. Only legal on an empty
    /// registry.
    pub fn seed_genesis(&mut self, airline: Identity) -> Result<(), RegistryError> {
        if !self.airlines.is_empty() {
            return Err(RegistryError::invalid_state(
                &airline,
                "genesis airline can only be seeded into an empty federation",
            ));
        }

        let now = Utc::now();
        info!(airline = %airline, "Genesis airline seeded");
        self.airlines.insert(
            airline.clone(),
            AirlineRecord {
                id: airline,
                state: AirlineState::Funded,
                votes_received: BTreeSet::new(),
                funding_amount: self.rules.min_funding,
                sponsor: None,
                applied_at: now,
                registered_at: Some(now),
                funded_at: Some(now),
            },
        );
        Ok(())
    }

    /// File an application for `candidate`, sponsored by a funded airline.
    ///
    /// While fewer than `direct_admission_limit` airlines are registered the
    /// candidate is admitted on the spot. Otherwise it is recorded as
    /// `Applied` and must collect votes.
    pub fn apply_and_maybe_register(
        &mut self,
        candidate: &Identity,
        sponsor: &Identity,
    ) -> Result<Admission, RegistryError> {
        self.require_funded(sponsor)?;

        if let Some(existing) = self.airlines.get(candidate) {
            if existing.state.is_registered() {
                return Err(RegistryError::invalid_state(
                    candidate,
                    format!("already admitted ({:?})", existing.state),
                ));
            }
        }

        let registered = self.registered_count();
        let direct = registered < self.rules.direct_admission_limit;
        let min_funding = self.rules.min_funding;
        let now = Utc::now();

        let record = self
            .airlines
            .entry(candidate.clone())
            .or_insert_with(|| AirlineRecord {
                id: candidate.clone(),
                state: AirlineState::Applied,
                votes_received: BTreeSet::new(),
                funding_amount: Amount::ZERO,
                sponsor: Some(sponsor.clone()),
                applied_at: now,
                registered_at: None,
                funded_at: None,
            });

        if !direct {
            info!(
                candidate = %candidate,
                sponsor = %sponsor,
                registered,
                "Direct admission closed, candidate awaits votes"
            );
            return Ok(Admission::PendingVotes);
        }

        admit(record, min_funding, now);
        info!(
            candidate = %candidate,
            sponsor = %sponsor,
            state = ?record.state,
            "Airline admitted directly"
        );
        Ok(Admission::Admitted(record.state))
    }

    /// Record `voter`'s vote for `candidate` and re-evaluate quorum.
    ///
    /// Quorum is measured against the registered count before the candidate
    /// is admitted. Votes for an already admitted candidate are kept but do
    /// not change its state.
    pub fn vote_for_airline(
        &mut self,
        candidate: &Identity,
        voter: &Identity,
    ) -> Result<VoteOutcome, RegistryError> {
        self.require_funded(voter)?;

        if candidate == voter {
            return Err(RegistryError::invalid_state(
                candidate,
                "an airline cannot vote for itself",
            ));
        }

        let registered = self.registered_count();
        let quorum = self.rules.quorum;
        let min_funding = self.rules.min_funding;

        let record = self.airlines.get_mut(candidate).ok_or_else(|| {
            RegistryError::invalid_state(candidate, "no application on record")
        })?;

        if record.votes_received.contains(voter) {
            warn!(voter = %voter, candidate = %candidate, "Duplicate vote rejected");
            return Err(RegistryError::DuplicateVote {
                voter: voter.clone(),
                candidate: candidate.clone(),
            });
        }

        record.votes_received.insert(voter.clone());
        let votes = record.votes_received.len();

        let admitted =
            record.state == AirlineState::Applied && quorum.is_reached(votes, registered);
        if admitted {
            admit(record, min_funding, Utc::now());
            info!(
                candidate = %candidate,
                votes,
                registered,
                state = ?record.state,
                "Quorum reached, airline admitted"
            );
        } else {
            debug!(candidate = %candidate, voter = %voter, votes, registered, "Vote recorded");
        }

        Ok(VoteOutcome {
            votes,
            registered_count: registered,
            admitted,
            state: record.state,
        })
    }

    /// Accumulate a funding contribution.
    ///
    /// Funding an airline that is not yet registered only accumulates; the
    /// promotion happens at admission.
    pub fn fund_airline(
        &mut self,
        airline: &Identity,
        amount: Amount,
    ) -> Result<FundingOutcome, RegistryError> {
        let min_funding = self.rules.min_funding;
        let record = self.airlines.get_mut(airline).ok_or_else(|| {
            RegistryError::invalid_state(airline, "airline has not applied")
        })?;
        if amount.is_zero() {
            return Err(RegistryError::ZeroAmount);
        }

        record.funding_amount = record
            .funding_amount
            .checked_add(amount)
            .map_err(|_| RegistryError::AmountOverflow(airline.clone()))?;

        let became_funded =
            record.state == AirlineState::Registered && record.funding_amount >= min_funding;
        if became_funded {
            record.state = AirlineState::Funded;
            record.funded_at = Some(Utc::now());
            info!(
                airline = %airline,
                funding = %record.funding_amount,
                "Airline funded"
            );
        } else {
            debug!(
                airline = %airline,
                contribution = %amount,
                funding = %record.funding_amount,
                state = ?record.state,
                "Funding accumulated"
            );
        }

        Ok(FundingOutcome {
            funding_amount: record.funding_amount,
            state: record.state,
            became_funded,
        })
    }

    pub fn airline(&self, id: &Identity) -> Option<&AirlineRecord> {
        self.airlines.get(id)
    }

    pub fn airlines(&self) -> impl Iterator<Item = &AirlineRecord> {
        self.airlines.values()
    }

    pub fn state_of(&self, id: &Identity) -> Option<AirlineState> {
        self.airlines.get(id).map(|record| record.state)
    }

    pub fn is_registered(&self, id: &Identity) -> bool {
        self.state_of(id).is_some_and(|state| state.is_registered())
    }

    pub fn is_funded(&self, id: &Identity) -> bool {
        self.state_of(id).is_some_and(|state| state.is_funded())
    }

    /// Applied + Registered + Funded.
    pub fn exist_count(&self) -> usize {
        self.airlines.len()
    }

    /// Registered + Funded.
    pub fn registered_count(&self) -> usize {
        self.airlines
            .values()
            .filter(|record| record.state.is_registered())
            .count()
    }

    pub fn funded_count(&self) -> usize {
        self.airlines
            .values()
            .filter(|record| record.state.is_funded())
            .count()
    }

    fn require_funded(&self, id: &Identity) -> Result<(), RegistryError> {
        if self.is_funded(id) {
            Ok(())
        } else {
            warn!(airline = %id, "Operation requires a funded airline");
            Err(RegistryError::NotFunded(id.clone()))
        }
    }
}

fn admit(record: &mut AirlineRecord, min_funding: Amount, now: DateTime<Utc>) {
    record.registered_at = Some(now);
    if record.funding_amount >= min_funding {
        record.state = AirlineState::Funded;
        record.funded_at = Some(now);
    } else {
        record.state = AirlineState::Registered;
    }
}
