//! Portfolio valuation — holdings, weighted-average cost basis, returns.
//!
//! Holdings are a cache derived from the order history. They can always be
//! rebuilt with [`PortfolioValuator::rebuild_holdings`], and
//! [`PortfolioValuator::reconcile`] checks the cache against the orders.
//! This product only buys, so realised gains are not modelled.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::types::{round_currency, Holding, Order, PriceMap, COST_DP};

/// Holdings keyed by symbol.
pub type Holdings = BTreeMap<String, Holding>;

/// Aggregate portfolio returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortfolioReturns {
    pub current: Decimal,
    pub invested: Decimal,
    pub gains: Decimal,
    pub gains_percent: Decimal,
}

impl fmt::Display for PortfolioReturns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.gains >= Decimal::ZERO { "+" } else { "" };
        write!(
            f,
            "value=₹{:.2} invested=₹{:.2} gains={sign}₹{:.2} ({sign}{:.2}%)",
            self.current, self.invested, self.gains, self.gains_percent,
        )
    }
}

impl PortfolioReturns {
    /// Presentation copy with every field at currency precision.
    pub fn rounded(&self) -> Self {
        Self {
            current: round_currency(self.current),
            invested: round_currency(self.invested),
            gains: round_currency(self.gains),
            gains_percent: round_currency(self.gains_percent),
        }
    }
}

/// A holding whose cached cost basis disagrees with the order history.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub symbol: String,
    /// `units * avg_cost` from the cached holding (zero if missing).
    pub holding_cost: Decimal,
    /// Sum of order amounts for the symbol.
    pub order_cost: Decimal,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: holding cost ₹{:.4} vs orders ₹{:.4}",
            self.symbol, self.holding_cost, self.order_cost,
        )
    }
}

pub struct PortfolioValuator;

impl PortfolioValuator {
    /// Fold one purchase into a holding.
    ///
    /// A new holding starts at `avg_cost = new_price`. An existing one gets
    /// the weighted average of its cost basis and the new purchase. The
    /// trade price also becomes `current_price`. Non-positive units or price
    /// leave the holding as it was.
    pub fn update_holding(
        existing: Option<&Holding>,
        symbol: &str,
        new_units: Decimal,
        new_price: Decimal,
    ) -> Holding {
        let valid_trade = new_units > Decimal::ZERO && new_price > Decimal::ZERO;

        match existing {
            None if valid_trade => Holding {
                symbol: symbol.to_string(),
                units: new_units,
                avg_cost: new_price,
                current_price: new_price,
            },
            None => Holding {
                symbol: symbol.to_string(),
                units: Decimal::ZERO,
                avg_cost: Decimal::ZERO,
                current_price: new_price.max(Decimal::ZERO),
            },
            Some(h) if !valid_trade => h.clone(),
            Some(h) => {
                let total_units = h.units + new_units;
                if total_units <= Decimal::ZERO {
                    warn!(holding = %h, "Holding has negative units, ignoring trade");
                    return h.clone();
                }
                let avg_cost = ((h.units * h.avg_cost + new_units * new_price) / total_units)
                    .round_dp_with_strategy(COST_DP, RoundingStrategy::MidpointNearestEven);
                Holding {
                    symbol: h.symbol.clone(),
                    units: total_units,
                    avg_cost,
                    current_price: new_price,
                }
            }
        }
    }

    /// Apply a batch of executed orders to the holdings map.
    pub fn apply_orders(holdings: &mut Holdings, orders: &[Order]) {
        for order in orders {
            let updated = Self::update_holding(
                holdings.get(&order.symbol),
                &order.symbol,
                order.quantity,
                order.price,
            );
            debug!(holding = %updated, "Holding updated");
            holdings.insert(order.symbol.clone(), updated);
        }
    }

    /// Rebuild every holding from the full order history.
    pub fn rebuild_holdings(orders: &[Order]) -> Holdings {
        let mut holdings = Holdings::new();
        Self::apply_orders(&mut holdings, orders);
        holdings
    }

    /// Mark holdings to the latest prices. Symbols without a price keep
    /// their last known price.
    pub fn refresh_prices(holdings: &mut Holdings, prices: &PriceMap) {
        for (symbol, holding) in holdings.iter_mut() {
            match prices.get(symbol) {
                Some(price) => holding.refresh_price(*price),
                None => debug!(symbol = %symbol, "No price tick, keeping last price"),
            }
        }
    }

    /// Aggregate value, cost basis and gains over all holdings.
    pub fn calculate_returns<'a, I>(holdings: I) -> PortfolioReturns
    where
        I: IntoIterator<Item = &'a Holding>,
    {
        let (current, invested) = holdings
            .into_iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(cur, inv), h| {
                (cur + h.current_value(), inv + h.invested())
            });

        let gains = current - invested;
        let gains_percent = if invested > Decimal::ZERO {
            gains / invested * dec!(100)
        } else {
            Decimal::ZERO
        };

        PortfolioReturns {
            current,
            invested,
            gains,
            gains_percent,
        }
    }

    /// Cross-check cached cost basis against the order history.
    ///
    /// For each symbol, `units * avg_cost` must match the summed order
    /// amounts within `tolerance`, and units must match the summed order
    /// quantities exactly.
    pub fn reconcile(holdings: &Holdings, orders: &[Order], tolerance: Decimal) -> Vec<Discrepancy> {
        let mut expected: BTreeMap<&str, (Decimal, Decimal)> = BTreeMap::new();
        for order in orders {
            let slot = expected
                .entry(order.symbol.as_str())
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            slot.0 += order.quantity;
            slot.1 += order.amount;
        }

        let mut discrepancies = Vec::new();

        for (symbol, (units, cost)) in &expected {
            let (held_units, held_cost) = holdings
                .get(*symbol)
                .map(|h| (h.units, h.invested()))
                .unwrap_or((Decimal::ZERO, Decimal::ZERO));
            if held_units != *units || (held_cost - *cost).abs() > tolerance {
                discrepancies.push(Discrepancy {
                    symbol: symbol.to_string(),
                    holding_cost: held_cost,
                    order_cost: *cost,
                });
            }
        }

        for (symbol, holding) in holdings {
            if !expected.contains_key(symbol.as_str()) && holding.units > Decimal::ZERO {
                discrepancies.push(Discrepancy {
                    symbol: symbol.clone(),
                    holding_cost: holding.invested(),
                    order_cost: Decimal::ZERO,
                });
            }
        }

        for d in &discrepancies {
            warn!(discrepancy = %d, "Holding does not reconcile with orders");
        }

        discrepancies
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
