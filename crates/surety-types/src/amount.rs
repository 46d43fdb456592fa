use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of minor units in one whole unit of value.
pub const MINOR_PER_UNIT: u64 = 1_000_000;

/// Value expressed in minor units.
///
/// All arithmetic is checked; an overflow surfaces as [`AmountError`] rather
/// than wrapping.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount overflow: {0} + {1}")]
    Overflow(u64, u64),

    #[error("amount underflow: {0} - {1}")]
    Underflow(u64, u64),
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn minor(value: u64) -> Self {
        Self(value)
    }

    /// Whole units, e.g. `Amount::units(10)` is ten units of value.
    pub const fn units(value: u64) -> Self {
        Self(value * MINOR_PER_UNIT)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(AmountError::Overflow(self.0, other.0))
    }

    pub fn checked_sub(self, other: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or(AmountError::Underflow(self.0, other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / MINOR_PER_UNIT;
        let frac = self.0 % MINOR_PER_UNIT;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            write!(f, "{}.{:06}", whole, frac)
        }
    }
}

/// Rational payout factor applied to a premium when a flight is delayed by
/// the carrier. Rounds toward zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutMultiplier {
    pub numerator: u64,
    pub denominator: u64,
}

impl PayoutMultiplier {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Apply the multiplier; `None` on a zero denominator or overflow.
    pub fn apply(&self, premium: Amount) -> Option<Amount> {
        if self.denominator == 0 {
            return None;
        }
        let scaled = u128::from(premium.0) * u128::from(self.numerator);
        let credit = scaled / u128::from(self.denominator);
        u64::try_from(credit).ok().map(Amount)
    }
}

impl Default for PayoutMultiplier {
    fn default() -> Self {
        Self::new(3, 2)
    }
}
