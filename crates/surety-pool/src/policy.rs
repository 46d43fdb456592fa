use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surety_types::{Amount, FlightKey, FlightOutcome, Identity, PolicyKey, PolicyState};

/// A purchased flight-delay policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub key: PolicyKey,
    pub premium: Amount,
    pub state: PolicyState,
    /// Credit granted on resolution; zero unless `Paid`.
    pub payout: Amount,
    pub purchased_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Read view of a policy key. Keys with no record report `NotPurchased`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyView {
    pub key: PolicyKey,
    pub state: PolicyState,
    pub premium: Amount,
    pub payout: Amount,
}

impl PolicyView {
    pub fn not_purchased(key: PolicyKey) -> Self {
        Self {
            key,
            state: PolicyState::NotPurchased,
            premium: Amount::ZERO,
            payout: Amount::ZERO,
        }
    }
}

impl From<&InsurancePolicy> for PolicyView {
    fn from(policy: &InsurancePolicy) -> Self {
        Self {
            key: policy.key.clone(),
            state: policy.state,
            premium: policy.premium,
            payout: policy.payout,
        }
    }
}

/// A status query forwarded to the oracle collaborator.
///
/// Requests are an audit trail only; duplicates for the same flight are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightStatusRequest {
    pub flight: FlightKey,
    pub requester: Identity,
    pub requested_at: DateTime<Utc>,
}

/// First outcome reported for a flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightResolution {
    pub flight: FlightKey,
    pub outcome: FlightOutcome,
    pub resolved_at: DateTime<Utc>,
}

/// What a resolution call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionSummary {
    /// True when the flight had already been resolved and nothing changed.
    pub already_resolved: bool,
    pub paid: Vec<PolicyKey>,
    pub expired: Vec<PolicyKey>,
    pub total_credited: Amount,
}

impl ResolutionSummary {
    pub fn is_noop(&self) -> bool {
        self.paid.is_empty() && self.expired.is_empty()
    }
}
