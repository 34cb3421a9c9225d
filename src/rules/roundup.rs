//! Round-up rule configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{PiggyError, CURRENCY_DP};

/// How spare change is computed for each transaction.
///
/// Invariant: `round_to_nearest > 0` and `0 <= min_roundup <= max_roundup`,
/// both bounds at currency precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRoundupRule", into = "RawRoundupRule")]
pub struct RoundupRule {
    round_to_nearest: u32,
    min_roundup: Decimal,
    max_roundup: Decimal,
}

/// Unvalidated wire shape of a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRoundupRule {
    round_to_nearest: i64,
    min_roundup: Decimal,
    max_roundup: Decimal,
}

impl TryFrom<RawRoundupRule> for RoundupRule {
    type Error = PiggyError;

    fn try_from(raw: RawRoundupRule) -> Result<Self, Self::Error> {
        RoundupRule::new(raw.round_to_nearest, raw.min_roundup, raw.max_roundup)
    }
}

impl From<RoundupRule> for RawRoundupRule {
    fn from(rule: RoundupRule) -> Self {
        Self {
            round_to_nearest: i64::from(rule.round_to_nearest),
            min_roundup: rule.min_roundup,
            max_roundup: rule.max_roundup,
        }
    }
}

impl Default for RoundupRule {
    fn default() -> Self {
        Self {
            round_to_nearest: 10,
            min_roundup: dec!(1),
            max_roundup: dec!(50),
        }
    }
}

impl RoundupRule {
    /// Build a validated rule.
    pub fn new(
        round_to_nearest: i64,
        min_roundup: Decimal,
        max_roundup: Decimal,
    ) -> Result<Self, PiggyError> {
        if round_to_nearest <= 0 {
            return Err(PiggyError::InvalidRule(format!(
                "round_to_nearest must be positive, got {round_to_nearest}"
            )));
        }
        let round_to_nearest = u32::try_from(round_to_nearest).map_err(|_| {
            PiggyError::InvalidRule(format!("round_to_nearest too large: {round_to_nearest}"))
        })?;
        if min_roundup < Decimal::ZERO {
            return Err(PiggyError::InvalidRule(format!(
                "min_roundup must be non-negative, got {min_roundup}"
            )));
        }
        if max_roundup < min_roundup {
            return Err(PiggyError::InvalidRule(format!(
                "max_roundup ({max_roundup}) is below min_roundup ({min_roundup})"
            )));
        }
        for (name, bound) in [("min_roundup", min_roundup), ("max_roundup", max_roundup)] {
            if bound.normalize().scale() > CURRENCY_DP {
                return Err(PiggyError::InvalidRule(format!(
                    "{name} must have at most {CURRENCY_DP} decimal places, got {bound}"
                )));
            }
        }

        Ok(Self {
            round_to_nearest,
            min_roundup,
            max_roundup,
        })
    }

    pub fn round_to_nearest(&self) -> u32 {
        self.round_to_nearest
    }

    pub fn min_roundup(&self) -> Decimal {
        self.min_roundup
    }

    pub fn max_roundup(&self) -> Decimal {
        self.max_roundup
    }
}
