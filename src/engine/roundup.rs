//! Round-up engine.
//!
//! Turns transaction amounts into spare-change credits under a rule and
//! produces the matching `roundup_credit` ledger entries.

use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::rules::RoundupRule;
use crate::types::{round_currency, EntryType, LedgerEntry, Transaction};

/// Deterministic ledger id for the credit derived from a transaction.
pub fn credit_id(transaction_id: &str) -> String {
    format!("roundup:{transaction_id}")
}

pub struct RoundupEngine;

impl RoundupEngine {
    /// Spare change for a single amount.
    ///
    /// Exact multiples and non-positive amounts give zero. A raw round-up
    /// below `min_roundup` gives zero; otherwise it is capped at
    /// `max_roundup` and rounded to currency precision.
    pub fn calculate_roundup(amount: Decimal, rule: &RoundupRule) -> Decimal {
        if amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let step = Decimal::from(rule.round_to_nearest());
        let next_multiple = (amount / step).ceil() * step;
        let raw = next_multiple - amount;

        if raw <= Decimal::ZERO || raw < rule.min_roundup() {
            return Decimal::ZERO;
        }

        round_currency(raw.min(rule.max_roundup()))
    }

    /// One `roundup_credit` per transaction with a non-zero round-up, in
    /// input order. A repeated transaction id is credited once.
    pub fn process_transactions(
        transactions: &[Transaction],
        rule: &RoundupRule,
        user_id: &str,
    ) -> Vec<LedgerEntry> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut entries = Vec::new();

        for txn in transactions {
            if !seen.insert(txn.id.as_str()) {
                warn!(transaction_id = %txn.id, "Duplicate transaction id, skipping");
                continue;
            }

            let roundup = Self::calculate_roundup(txn.amount, rule);
            if roundup.is_zero() {
                debug!(transaction_id = %txn.id, amount = %txn.amount, "No round-up");
                continue;
            }

            entries.push(Self::credit_for(txn, roundup, user_id));
        }

        debug!(
            transactions = transactions.len(),
            credits = entries.len(),
            "Round-ups processed"
        );

        entries
    }

    /// Rebuild the ledger's credits under `rule` without reordering it.
    ///
    /// Each existing `roundup_credit` is replaced in its slot by the fresh
    /// credit for the same transaction, or removed when that transaction now
    /// earns nothing, is unknown, or was already credited earlier in the
    /// ledger. Credits for transactions that had none are appended in
    /// transaction order. Debits and top-ups are untouched.
    pub fn recompute_ledger(
        ledger: &[LedgerEntry],
        transactions: &[Transaction],
        rule: &RoundupRule,
        user_id: &str,
    ) -> Vec<LedgerEntry> {
        let fresh = Self::process_transactions(transactions, rule, user_id);
        let mut pending: HashMap<&str, &LedgerEntry> = fresh
            .iter()
            .filter_map(|e| e.reference.as_deref().map(|r| (r, e)))
            .collect();

        let mut rebuilt = Vec::with_capacity(ledger.len().max(fresh.len()));
        let mut replaced = 0usize;
        let mut dropped = 0usize;

        for entry in ledger {
            if entry.entry_type != EntryType::RoundupCredit {
                rebuilt.push(entry.clone());
                continue;
            }
            match entry.reference.as_deref().and_then(|r| pending.remove(r)) {
                Some(credit) => {
                    rebuilt.push(credit.clone());
                    replaced += 1;
                }
                None => dropped += 1,
            }
        }

        let before = rebuilt.len();
        rebuilt.extend(
            fresh
                .iter()
                .filter(|e| matches!(e.reference.as_deref(), Some(r) if pending.contains_key(r)))
                .cloned(),
        );
        let added = rebuilt.len() - before;

        info!(
            replaced,
            dropped,
            added,
            round_to_nearest = rule.round_to_nearest(),
            "Round-up credits recomputed"
        );

        rebuilt
    }

    fn credit_for(txn: &Transaction, amount: Decimal, user_id: &str) -> LedgerEntry {
        LedgerEntry {
            id: credit_id(&txn.id),
            user_id: user_id.to_string(),
            amount,
            entry_type: EntryType::RoundupCredit,
            reference: Some(txn.id.clone()),
            // Stamped with the transaction time so recomputation is reproducible.
            timestamp: txn.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn rule(step: i64, min: Decimal, max: Decimal) -> RoundupRule {
        RoundupRule::new(step, min, max).unwrap()
    }

    fn txn(id: &str, amount: Decimal) -> Transaction {
        Transaction::new(id, amount, "Chai Point", "food")
    }

    #[test]
    fn test_rounds_up_to_next_multiple() {
        let r = rule(10, dec!(1), dec!(50));
        assert_eq!(RoundupEngine::calculate_roundup(dec!(127), &r), dec!(3));
    }

    #[test]
    fn test_exact_multiple_is_zero() {
        let r = rule(10, dec!(1), dec!(50));
        assert_eq!(RoundupEngine::calculate_roundup(dec!(130), &r), Decimal::ZERO);
        assert_eq!(RoundupEngine::calculate_roundup(dec!(130.00), &r), Decimal::ZERO);
    }

    #[test]
    fn test_below_minimum_is_zero() {
        let r = rule(10, dec!(1), dec!(50));
        assert_eq!(RoundupEngine::calculate_roundup(dec!(129.7), &r), Decimal::ZERO);

        let lenient = rule(10, dec!(0.10), dec!(50));
        assert_eq!(RoundupEngine::calculate_roundup(dec!(129.7), &lenient), dec!(0.3));
    }

    #[test]
    fn test_capped_at_maximum() {
        let r = rule(100, dec!(1), dec!(20));
        assert_eq!(RoundupEngine::calculate_roundup(dec!(1201), &r), dec!(20));
        assert_eq!(RoundupEngine::calculate_roundup(dec!(1285), &r), dec!(15));
    }

    #[test]
    fn test_non_positive_amounts_are_zero() {
        let r = rule(10, Decimal::ZERO, dec!(50));
        assert_eq!(RoundupEngine::calculate_roundup(Decimal::ZERO, &r), Decimal::ZERO);
        assert_eq!(RoundupEngine::calculate_roundup(dec!(-12), &r), Decimal::ZERO);
    }

    #[test]
    fn test_result_rounded_to_paise() {
        let r = rule(10, Decimal::ZERO, dec!(50));
        assert_eq!(RoundupEngine::calculate_roundup(dec!(127.005), &r), dec!(3.00));
        assert_eq!(RoundupEngine::calculate_roundup(dec!(127.251), &r), dec!(2.75));
    }

    #[test]
    fn test_zero_minimum_small_amount() {
        let r = rule(1, Decimal::ZERO, dec!(1));
        assert_eq!(RoundupEngine::calculate_roundup(dec!(0.01), &r), dec!(0.99));
    }

    #[test]
    fn test_process_emits_credits_in_order() {
        let r = rule(10, dec!(1), dec!(50));
        let txns = vec![
            txn("t1", dec!(127)),
            txn("t2", dec!(130)),
            txn("t3", dec!(45.50)),
        ];
        let entries = RoundupEngine::process_transactions(&txns, &r, "user-1");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "roundup:t1");
        assert_eq!(entries[0].amount, dec!(3));
        assert_eq!(entries[0].reference.as_deref(), Some("t1"));
        assert_eq!(entries[0].entry_type, EntryType::RoundupCredit);
        assert_eq!(entries[0].user_id, "user-1");
        assert_eq!(entries[1].reference.as_deref(), Some("t3"));
        assert_eq!(entries[1].amount, dec!(4.50));
    }

    #[test]
    fn test_process_skips_duplicate_ids() {
        let r = rule(10, dec!(1), dec!(50));
        let txns = vec![txn("t1", dec!(127)), txn("t1", dec!(121))];
        let entries = RoundupEngine::process_transactions(&txns, &r, "u");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, dec!(3));
    }

    #[test]
    fn test_recompute_replaces_stale_credits() {
        let old_rule = rule(10, dec!(1), dec!(50));
        let new_rule = rule(100, dec!(1), dec!(50));
        let txns = vec![txn("t1", dec!(127)), txn("t2", dec!(250))];

        let mut ledger = RoundupEngine::process_transactions(&txns, &old_rule, "u");
        ledger.push(LedgerEntry {
            id: "topup-1".into(),
            user_id: "u".into(),
            amount: dec!(20),
            entry_type: EntryType::ManualTopup,
            reference: None,
            timestamp: Utc::now(),
        });

        let rebuilt = RoundupEngine::recompute_ledger(&ledger, &txns, &new_rule, "u");

        let credits: Vec<&LedgerEntry> = rebuilt
            .iter()
            .filter(|e| e.entry_type == EntryType::RoundupCredit)
            .collect();
        assert_eq!(credits.len(), 2);
        assert_eq!(credits[0].amount, dec!(50)); // 127 -> 200 = 73, capped
        assert_eq!(credits[1].amount, dec!(50));
        assert_eq!(rebuilt[2].entry_type, EntryType::ManualTopup);
    }

    fn debit(id: &str, amount: Decimal) -> LedgerEntry {
        LedgerEntry {
            id: id.into(),
            user_id: "u".into(),
            amount,
            entry_type: EntryType::InvestmentDebit,
            reference: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_recompute_keeps_debit_after_its_credits() {
        let r = rule(10, dec!(1), dec!(50));
        let txns = vec![txn("t1", dec!(127))];
        let mut ledger = RoundupEngine::process_transactions(&txns, &r, "u");
        ledger.push(debit("sweep:1", dec!(3)));

        let rebuilt = RoundupEngine::recompute_ledger(&ledger, &txns, &r, "u");
        assert_eq!(rebuilt, ledger);
        assert_eq!(rebuilt[0].entry_type, EntryType::RoundupCredit);
        assert_eq!(rebuilt[1].entry_type, EntryType::InvestmentDebit);
    }

    #[test]
    fn test_recompute_appends_new_credits_after_existing_entries() {
        let r = rule(10, dec!(1), dec!(50));
        let mut txns: Vec<Transaction> = (0..150)
            .map(|i| txn(&format!("t{i}"), dec!(127)))
            .collect();
        let mut ledger = RoundupEngine::process_transactions(&txns, &r, "u");
        ledger.push(debit("sweep:1", dec!(450)));
        txns.push(txn("late", dec!(88)));

        let rebuilt = RoundupEngine::recompute_ledger(&ledger, &txns, &r, "u");

        assert_eq!(rebuilt.len(), 152);
        assert_eq!(rebuilt[150].id, "sweep:1");
        assert_eq!(rebuilt[151].reference.as_deref(), Some("late"));
        assert_eq!(rebuilt[151].amount, dec!(2));
        // Most recent 100 rows still include the sweep.
        assert!(rebuilt[rebuilt.len() - 100..].iter().any(|e| e.id == "sweep:1"));
    }

    #[test]
    fn test_recompute_drops_credits_that_no_longer_apply() {
        let loose = rule(10, dec!(0.10), dec!(50));
        let strict = rule(10, dec!(1), dec!(50));
        let txns = vec![txn("t1", dec!(129.7)), txn("t2", dec!(127))];
        let mut ledger = RoundupEngine::process_transactions(&txns, &loose, "u");
        ledger.push(debit("sweep:1", dec!(1)));

        let rebuilt = RoundupEngine::recompute_ledger(&ledger, &txns, &strict, "u");

        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt[0].reference.as_deref(), Some("t2"));
        assert_eq!(rebuilt[1].id, "sweep:1");
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let r = rule(10, dec!(1), dec!(50));
        let txns = vec![txn("t1", dec!(127)), txn("t2", dec!(88))];
        let first = RoundupEngine::recompute_ledger(&[], &txns, &r, "u");
        let second = RoundupEngine::recompute_ledger(&first, &txns, &r, "u");
        assert_eq!(first, second);
    }
}
