//! Allocation presets.
//!
//! A preset is a named target allocation plus the minimum balance needed
//! before a sweep is worth running. Selecting a different preset only
//! changes future sweeps; past orders are facts and stay as they are.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::types::PiggyError;

/// One target slice of a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub symbol: String,
    pub weight_pct: Decimal,
}

impl Allocation {
    pub fn new(symbol: &str, weight_pct: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            weight_pct,
        }
    }
}

/// The built-in presets offered in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetKind {
    Safe,
    Balanced,
    Growth,
}

impl PresetKind {
    pub const ALL: &'static [PresetKind] =
        &[PresetKind::Safe, PresetKind::Balanced, PresetKind::Growth];

    /// Materialise the static preset definition.
    pub fn preset(&self) -> PortfolioPreset {
        let (allocations, min_sweep_amount) = match self {
            PresetKind::Safe => (
                vec![
                    Allocation::new("LIQUIDBEES", dec!(60)),
                    Allocation::new("GOLDBEES", dec!(30)),
                    Allocation::new("NIFTYBEES", dec!(10)),
                ],
                dec!(50),
            ),
            PresetKind::Balanced => (
                vec![
                    Allocation::new("NIFTYBEES", dec!(70)),
                    Allocation::new("GOLDBEES", dec!(30)),
                ],
                dec!(100),
            ),
            PresetKind::Growth => (
                vec![
                    Allocation::new("NIFTYBEES", dec!(60)),
                    Allocation::new("JUNIORBEES", dec!(30)),
                    Allocation::new("GOLDBEES", dec!(10)),
                ],
                dec!(200),
            ),
        };
        PortfolioPreset {
            name: self.to_string(),
            allocations,
            min_sweep_amount,
        }
    }
}

impl fmt::Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetKind::Safe => write!(f, "safe"),
            PresetKind::Balanced => write!(f, "balanced"),
            PresetKind::Growth => write!(f, "growth"),
        }
    }
}

/// Parse a preset name (case-insensitive).
impl std::str::FromStr for PresetKind {
    type Err = PiggyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "safe" | "conservative" => Ok(PresetKind::Safe),
            "balanced" | "moderate" => Ok(PresetKind::Balanced),
            "growth" | "aggressive" => Ok(PresetKind::Growth),
            _ => Err(PiggyError::UnknownPreset(s.to_string())),
        }
    }
}

/// A validated allocation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPreset", into = "RawPreset")]
pub struct PortfolioPreset {
    name: String,
    allocations: Vec<Allocation>,
    min_sweep_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPreset {
    name: String,
    allocations: Vec<Allocation>,
    min_sweep_amount: Decimal,
}

impl TryFrom<RawPreset> for PortfolioPreset {
    type Error = PiggyError;

    fn try_from(raw: RawPreset) -> Result<Self, Self::Error> {
        PortfolioPreset::new(&raw.name, raw.allocations, raw.min_sweep_amount)
    }
}

impl From<PortfolioPreset> for RawPreset {
    fn from(preset: PortfolioPreset) -> Self {
        Self {
            name: preset.name,
            allocations: preset.allocations,
            min_sweep_amount: preset.min_sweep_amount,
        }
    }
}

impl fmt::Display for PortfolioPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .allocations
            .iter()
            .map(|a| format!("{} {}%", a.symbol, a.weight_pct))
            .collect();
        write!(
            f,
            "{} [{}] min sweep ₹{:.2}",
            self.name,
            parts.join(" / "),
            self.min_sweep_amount,
        )
    }
}

impl PortfolioPreset {
    /// Build a validated preset: weights in `[0, 100]` summing to exactly
    /// 100, unique non-empty symbols, non-negative sweep minimum.
    pub fn new(
        name: &str,
        allocations: Vec<Allocation>,
        min_sweep_amount: Decimal,
    ) -> Result<Self, PiggyError> {
        let invalid = |message: String| PiggyError::InvalidPreset {
            preset: name.to_string(),
            message,
        };

        if min_sweep_amount < Decimal::ZERO {
            return Err(invalid(format!(
                "min_sweep_amount must be non-negative, got {min_sweep_amount}"
            )));
        }

        let mut seen = HashSet::new();
        for alloc in &allocations {
            if alloc.symbol.trim().is_empty() {
                return Err(invalid("allocation symbol must not be empty".into()));
            }
            if !seen.insert(alloc.symbol.as_str()) {
                return Err(invalid(format!("duplicate symbol {}", alloc.symbol)));
            }
            if alloc.weight_pct < Decimal::ZERO || alloc.weight_pct > dec!(100) {
                return Err(invalid(format!(
                    "weight for {} out of range: {}",
                    alloc.symbol, alloc.weight_pct
                )));
            }
        }

        let total: Decimal = allocations.iter().map(|a| a.weight_pct).sum();
        if total != dec!(100) {
            return Err(invalid(format!("weights sum to {total}, expected 100")));
        }

        Ok(Self {
            name: name.to_string(),
            allocations,
            min_sweep_amount,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    pub fn min_sweep_amount(&self) -> Decimal {
        self.min_sweep_amount
    }

    /// Whether a sweep may run at this balance.
    pub fn is_sweep_eligible(&self, balance: Decimal) -> bool {
        balance > Decimal::ZERO && balance >= self.min_sweep_amount
    }
}
