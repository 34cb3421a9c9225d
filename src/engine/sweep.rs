//! Sweep engine — balance accounting and allocation-based order creation.
//!
//! The balance is never cached: it is a fold over the ledger, recomputed
//! from scratch on every call. A sweep only decides *what* to buy given
//! that a sweep is happening; when sweeps happen is the caller's business.
//!
//! Residual policy: a sweep debits the ledger for the invested total only.
//! Whatever the floors and unit truncation leave behind stays in the
//! spare-change balance and is picked up by the next sweep.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::rules::{Allocation, PortfolioPreset};
use crate::types::{truncate_units, EntryType, LedgerEntry, Order, PiggyError, PriceMap};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sweep behaviour knobs.
#[derive(Debug, Clone, Default)]
pub struct SweepConfig {
    /// Skip an allocation whose budget is below one full unit's price.
    /// Off by default: fractional units are bought down to 6 dp.
    pub require_full_unit: bool,
}

// ---------------------------------------------------------------------------
// Sweep outcome
// ---------------------------------------------------------------------------

/// Result of a sweep.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub balance_before: Decimal,
    pub orders: Vec<Order>,
    /// `investment_debit` for the invested total; `None` if nothing was bought.
    pub debit: Option<LedgerEntry>,
    pub invested: Decimal,
    /// Balance left uninvested after this sweep. Negative when the ledger
    /// already owes more than it holds.
    pub residual: Decimal,
}

impl SweepOutcome {
    fn idle(balance: Decimal) -> Self {
        Self {
            balance_before: balance,
            orders: Vec::new(),
            debit: None,
            invested: Decimal::ZERO,
            residual: balance,
        }
    }

    /// Whether anything was bought.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SweepEngine {
    config: SweepConfig,
}

impl SweepEngine {
    pub fn new(config: SweepConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Credits (`roundup_credit` + `manual_topup`) minus `investment_debit`.
    pub fn calculate_balance(ledger: &[LedgerEntry]) -> Decimal {
        ledger.iter().map(LedgerEntry::signed_amount).sum()
    }

    /// Split `amount` across `allocations` at the given prices.
    ///
    /// Each slice gets `floor(amount * weight / 100)`. Slices with no price,
    /// or whose budget buys no units, are dropped for this sweep. The sum of
    /// the returned orders never exceeds `amount`.
    pub fn create_orders(
        &self,
        amount: Decimal,
        allocations: &[Allocation],
        prices: &PriceMap,
    ) -> Vec<Order> {
        if amount <= Decimal::ZERO {
            return Vec::new();
        }

        let mut orders = Vec::new();
        let mut remaining = amount;
        let mut priced = 0usize;

        for Allocation { symbol, weight_pct } in allocations {
            if *weight_pct <= Decimal::ZERO {
                continue;
            }

            // Capped by what is left so over-weighted lists still never overspend.
            let alloc_amount = (amount * *weight_pct / dec!(100)).floor().min(remaining);

            let price = match prices.get(symbol) {
                Some(p) if *p > Decimal::ZERO => *p,
                _ => {
                    debug!(symbol = %symbol, "No price available, skipping allocation");
                    continue;
                }
            };
            priced += 1;

            if self.config.require_full_unit && alloc_amount < price {
                debug!(
                    symbol = %symbol,
                    budget = %alloc_amount,
                    price = %price,
                    "Budget below one unit, skipping allocation"
                );
                continue;
            }

            let units = truncate_units(alloc_amount / price);
            if units <= Decimal::ZERO {
                debug!(symbol = %symbol, budget = %alloc_amount, "Budget buys no units");
                continue;
            }

            let order = Order {
                symbol: symbol.clone(),
                quantity: units,
                amount: units * price,
                price,
            };
            debug!(order = %order, "Order created");
            remaining -= order.amount;
            orders.push(order);
        }

        if priced == 0 && allocations.iter().any(|a| a.weight_pct > Decimal::ZERO) {
            warn!(
                allocations = allocations.len(),
                "Price feed unavailable for every allocation"
            );
        }

        orders
    }

    /// Run a full sweep of the current balance into `preset`.
    ///
    /// Ineligible balances and empty order sets return an outcome with no
    /// debit. Otherwise one `investment_debit` equal to the invested total
    /// is produced; the caller appends it to the ledger.
    pub fn sweep(
        &self,
        ledger: &[LedgerEntry],
        preset: &PortfolioPreset,
        prices: &PriceMap,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> SweepOutcome {
        let balance = Self::calculate_balance(ledger);

        if balance < Decimal::ZERO {
            warn!(balance = %balance, user_id, "Negative spare-change balance, nothing to sweep");
            return SweepOutcome::idle(balance);
        }

        if !preset.is_sweep_eligible(balance) {
            debug!(
                balance = %balance,
                min = %preset.min_sweep_amount(),
                preset = preset.name(),
                "Balance below sweep minimum"
            );
            return SweepOutcome::idle(balance);
        }

        let orders = self.create_orders(balance, preset.allocations(), prices);
        if orders.is_empty() {
            info!(balance = %balance, preset = preset.name(), "Sweep produced no orders");
            return SweepOutcome::idle(balance);
        }

        let invested: Decimal = orders.iter().map(|o| o.amount).sum();
        let debit = LedgerEntry {
            id: format!("sweep:{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            amount: invested,
            entry_type: EntryType::InvestmentDebit,
            reference: None,
            timestamp: now,
        };

        info!(
            preset = preset.name(),
            balance = format!("₹{:.2}", balance),
            invested = format!("₹{:.2}", invested),
            residual = format!("₹{:.2}", balance - invested),
            orders = orders.len(),
            "Sweep complete"
        );

        SweepOutcome {
            balance_before: balance,
            orders,
            debit: Some(debit),
            invested,
            residual: balance - invested,
        }
    }

    /// A user-initiated top-up of the spare-change balance.
    pub fn manual_topup(
        user_id: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, PiggyError> {
        if amount <= Decimal::ZERO {
            return Err(PiggyError::InvalidAmount(amount));
        }
        Ok(LedgerEntry {
            id: format!("topup:{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            amount,
            entry_type: EntryType::ManualTopup,
            reference: None,
            timestamp: now,
        })
    }
}

impl Default for SweepEngine {
    fn default() -> Self {
        Self::new(SweepConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
