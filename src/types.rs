//! Shared types for the PIGGYBANK core.
//!
//! These types form the data model used across all modules: external
//! transactions, ledger entries, sweep orders and holdings. Every monetary
//! field is a `Decimal` so that many small round-up credits accumulate
//! without floating-point drift.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Precision
// ---------------------------------------------------------------------------

/// Currency minor-unit precision (paise / cents).
pub const CURRENCY_DP: u32 = 2;

/// Fractional unit precision for orders and holdings.
pub const UNIT_DP: u32 = 6;

/// Precision kept for weighted-average cost per unit.
pub const COST_DP: u32 = 8;

/// Round a monetary value to currency precision (half away from zero).
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncate a unit count to `UNIT_DP` places. Never rounds up, so the
/// resulting purchase can never cost more than the budget it came from.
pub fn truncate_units(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(UNIT_DP, RoundingStrategy::ToZero)
}

/// Symbol → latest price, as supplied by the price feed.
pub type PriceMap = BTreeMap<String, Decimal>;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// An external debit event (card or UPI payment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub merchant: String,
    pub category: String,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ₹{:.2} at {} ({})",
            self.id,
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.amount,
            self.merchant,
            self.category,
        )
    }
}

impl Transaction {
    pub fn new(id: &str, amount: Decimal, merchant: &str, category: &str) -> Self {
        Self {
            id: id.to_string(),
            amount,
            timestamp: Utc::now(),
            merchant: merchant.to_string(),
            category: category.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Kind of ledger movement. Amounts are always stored as positive
/// magnitudes; the sign is implied by the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    RoundupCredit,
    InvestmentDebit,
    ManualTopup,
}

impl EntryType {
    /// Whether this entry adds to the spare-change balance.
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryType::RoundupCredit | EntryType::ManualTopup)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::RoundupCredit => write!(f, "roundup_credit"),
            EntryType::InvestmentDebit => write!(f, "investment_debit"),
            EntryType::ManualTopup => write!(f, "manual_topup"),
        }
    }
}

/// An immutable, append-only accounting record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Transaction id this entry derives from, if any.
    #[serde(default)]
    pub reference: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.entry_type.is_credit() { "+" } else { "-" };
        write!(
            f,
            "[{}] {} {sign}₹{:.2} ({})",
            self.id,
            self.entry_type,
            self.amount,
            self.reference.as_deref().unwrap_or("-"),
        )
    }
}

impl LedgerEntry {
    /// Signed contribution of this entry to the balance.
    pub fn signed_amount(&self) -> Decimal {
        if self.entry_type.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

// ---------------------------------------------------------------------------
// Orders & holdings
// ---------------------------------------------------------------------------

/// What a sweep decided to buy for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub quantity: Decimal,
    /// `quantity * price`, unrounded.
    pub amount: Decimal,
    pub price: Decimal,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BUY {} {} @ ₹{:.2} = ₹{:.2}",
            self.quantity, self.symbol, self.price, self.amount,
        )
    }
}

/// A per-symbol position tracked by units and weighted-average cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub units: Decimal,
    pub avg_cost: Decimal,
    pub current_price: Decimal,
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pnl = self.unrealized_gain();
        let pnl_sign = if pnl >= Decimal::ZERO { "+" } else { "" };
        write!(
            f,
            "{} units={} avg=₹{:.2} px=₹{:.2} val=₹{:.2} ({pnl_sign}{:.2})",
            self.symbol,
            self.units,
            self.avg_cost,
            self.current_price,
            self.current_value(),
            pnl,
        )
    }
}

impl Holding {
    /// `units * current_price`.
    pub fn current_value(&self) -> Decimal {
        self.units * self.current_price
    }

    /// Cost basis: `units * avg_cost`.
    pub fn invested(&self) -> Decimal {
        self.units * self.avg_cost
    }

    pub fn unrealized_gain(&self) -> Decimal {
        self.current_value() - self.invested()
    }

    /// Mark the holding to a new market price without touching cost basis.
    pub fn refresh_price(&mut self, price: Decimal) {
        if price > Decimal::ZERO {
            self.current_price = price;
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for PIGGYBANK.
///
/// Only configuration and programmer errors surface here. Data-shape
/// irregularities (missing prices, zero balances) resolve to empty results.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PiggyError {
    #[error("Invalid round-up rule: {0}")]
    InvalidRule(String),

    #[error("Invalid portfolio preset ({preset}): {message}")]
    InvalidPreset { preset: String, message: String },

    #[error("Unknown portfolio preset: {0}")]
    UnknownPreset(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
