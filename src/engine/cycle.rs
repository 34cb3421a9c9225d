//! One refresh pass over the persisted state.
//!
//! ingest → credits → audit → mark to market → sweep → summarize. The pass
//! does no IO: the caller reads the feeds, hands over the rows and prices,
//! and persists the state afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::engine::report::{self, PortfolioSummary};
use crate::engine::{PortfolioValuator, RoundupEngine, SweepEngine, SweepOutcome};
use crate::rules::{PortfolioPreset, RoundupRule};
use crate::storage::PiggyState;
use crate::types::{PriceMap, Transaction};

/// Settings for a refresh pass.
pub struct RefreshCycle<'a> {
    pub rule: &'a RoundupRule,
    pub preset: &'a PortfolioPreset,
    pub sweeper: &'a SweepEngine,
    pub weekly_goal: Decimal,
    pub auto_sweep: bool,
}

/// What a pass changed.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// Transactions newly added to the state.
    pub ingested: usize,
    /// Whether every credit was rebuilt because the rule changed.
    pub recomputed: bool,
    /// The sweep that was recorded, if any.
    pub sweep: Option<SweepOutcome>,
    pub summary: PortfolioSummary,
}

impl RefreshCycle<'_> {
    /// Run one pass against `state`.
    ///
    /// Credits are rebuilt only when the stored rule differs from the active
    /// one; otherwise only newly ingested transactions are credited.
    pub fn run(
        &self,
        state: &mut PiggyState,
        incoming: Vec<Transaction>,
        prices: &PriceMap,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        // 1. Ingest
        let known = state.transactions.len();
        let ingested = state.ingest(incoming);
        if ingested > 0 {
            info!(ingested, total = state.transactions.len(), "Transactions ingested");
        }

        // 2. Credits
        let recomputed = state.rule.as_ref() != Some(self.rule);
        if recomputed {
            state.ledger = RoundupEngine::recompute_ledger(
                &state.ledger,
                &state.transactions,
                self.rule,
                &state.user_id,
            );
            state.rule = Some(self.rule.clone());
        } else if ingested > 0 {
            let credits = RoundupEngine::process_transactions(
                &state.transactions[known..],
                self.rule,
                &state.user_id,
            );
            state.ledger.extend(credits);
        }
        report::audit_ledger(&state.ledger, &state.transactions);

        // 3. Mark to market
        PortfolioValuator::refresh_prices(&mut state.holdings, prices);

        // 4. Sweep
        let mut sweep = None;
        if self.auto_sweep {
            let outcome = self
                .sweeper
                .sweep(&state.ledger, self.preset, prices, &state.user_id, now);
            if let Some(debit) = outcome.debit.clone() {
                state.ledger.push(debit);
                PortfolioValuator::apply_orders(&mut state.holdings, &outcome.orders);
                state.orders.extend(outcome.orders.iter().cloned());
                sweep = Some(outcome);
            }
        } else {
            debug!("Auto-sweep disabled");
        }

        // 5. Summarize
        let summary = report::summarize(&state.ledger, &state.holdings, self.weekly_goal, now);

        RefreshOutcome {
            ingested,
            recomputed,
            sweep,
            summary,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
