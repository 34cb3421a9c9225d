//! Reporting — the read model handed to the UI and reporting layers.
//!
//! Every value here is derived from the ledger and holdings on each call;
//! nothing is cached. Ledger anomalies are reported as warnings and never
//! block the computation.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{info, warn};

use crate::engine::sweep::SweepEngine;
use crate::engine::valuator::{Holdings, PortfolioValuator};
use crate::types::{round_currency, EntryType, LedgerEntry, Transaction};

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Headline numbers for the home screen, all at currency precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub piggy_balance: Decimal,
    pub portfolio_value: Decimal,
    pub total_invested: Decimal,
    pub total_gains: Decimal,
    pub gains_percent: Decimal,
    /// Credits over the trailing 7 days as a percentage of the weekly goal.
    pub weekly_progress: Decimal,
    pub as_of: DateTime<Utc>,
}

impl fmt::Display for PortfolioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "piggy=₹{} | value=₹{} | invested=₹{} | gains=₹{} ({}%) | week={}%",
            self.piggy_balance,
            self.portfolio_value,
            self.total_invested,
            self.total_gains,
            self.gains_percent,
            self.weekly_progress,
        )
    }
}

/// Build the summary from the ledger and current holdings.
pub fn summarize(
    ledger: &[LedgerEntry],
    holdings: &Holdings,
    weekly_goal: Decimal,
    as_of: DateTime<Utc>,
) -> PortfolioSummary {
    let returns = PortfolioValuator::calculate_returns(holdings.values()).rounded();

    let summary = PortfolioSummary {
        piggy_balance: round_currency(SweepEngine::calculate_balance(ledger)),
        portfolio_value: returns.current,
        total_invested: returns.invested,
        total_gains: returns.gains,
        gains_percent: returns.gains_percent,
        weekly_progress: weekly_progress(ledger, weekly_goal, as_of),
        as_of,
    };

    info!(summary = %summary, "Summary refreshed");
    summary
}

/// Credits in `(as_of - 7d, as_of]` as a percentage of `weekly_goal`,
/// capped at 100. A zero or negative goal gives zero.
pub fn weekly_progress(ledger: &[LedgerEntry], weekly_goal: Decimal, as_of: DateTime<Utc>) -> Decimal {
    if weekly_goal <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let window_start = as_of - Duration::days(7);
    let saved: Decimal = ledger
        .iter()
        .filter(|e| e.entry_type.is_credit())
        .filter(|e| e.timestamp > window_start && e.timestamp <= as_of)
        .map(|e| e.amount)
        .sum();

    round_currency((saved / weekly_goal * dec!(100)).min(dec!(100)))
}

// ---------------------------------------------------------------------------
// Ledger audit
// ---------------------------------------------------------------------------

/// A cosmetic ledger inconsistency worth surfacing to reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWarning {
    /// A credit references a transaction that is not in the known set.
    OrphanedReference { entry_id: String, reference: String },
    /// More than one round-up credit derives from the same transaction.
    DuplicateCredit { reference: String, count: usize },
    /// A round-up credit carries no transaction reference at all.
    MissingReference { entry_id: String },
    /// Debits exceed credits, usually after a rule change shrank credits
    /// that were already swept.
    NegativeBalance { balance: Decimal },
}

impl fmt::Display for LedgerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerWarning::OrphanedReference { entry_id, reference } => {
                write!(f, "entry {entry_id} references unknown transaction {reference}")
            }
            LedgerWarning::DuplicateCredit { reference, count } => {
                write!(f, "transaction {reference} has {count} round-up credits")
            }
            LedgerWarning::MissingReference { entry_id } => {
                write!(f, "round-up credit {entry_id} has no transaction reference")
            }
            LedgerWarning::NegativeBalance { balance } => {
                write!(f, "spare-change balance is negative: ₹{balance:.2}")
            }
        }
    }
}

/// Check round-up credits against the known transactions, and flag a
/// negative balance.
pub fn audit_ledger(ledger: &[LedgerEntry], transactions: &[Transaction]) -> Vec<LedgerWarning> {
    let known: HashSet<&str> = transactions.iter().map(|t| t.id.as_str()).collect();
    let mut per_reference: HashMap<&str, usize> = HashMap::new();
    let mut warnings = Vec::new();

    for entry in ledger.iter().filter(|e| e.entry_type == EntryType::RoundupCredit) {
        match entry.reference.as_deref() {
            Some(reference) => {
                *per_reference.entry(reference).or_insert(0) += 1;
                if !known.contains(reference) {
                    warnings.push(LedgerWarning::OrphanedReference {
                        entry_id: entry.id.clone(),
                        reference: reference.to_string(),
                    });
                }
            }
            None => warnings.push(LedgerWarning::MissingReference {
                entry_id: entry.id.clone(),
            }),
        }
    }

    let mut duplicates: Vec<(&str, usize)> = per_reference
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .collect();
    duplicates.sort();
    warnings.extend(duplicates.into_iter().map(|(reference, count)| {
        LedgerWarning::DuplicateCredit {
            reference: reference.to_string(),
            count,
        }
    }));

    let balance = SweepEngine::calculate_balance(ledger);
    if balance < Decimal::ZERO {
        warnings.push(LedgerWarning::NegativeBalance { balance });
    }

    for w in &warnings {
        warn!(warning = %w, "Ledger inconsistency");
    }

    warnings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Holding;

    fn credit(id: &str, reference: Option<&str>, amount: Decimal, at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id: id.into(),
            user_id: "u".into(),
            amount,
            entry_type: EntryType::RoundupCredit,
            reference: reference.map(str::to_string),
            timestamp: at,
        }
    }

    fn holdings() -> Holdings {
        let mut h = Holdings::new();
        h.insert(
            "NIFTYBEES".into(),
            Holding {
                symbol: "NIFTYBEES".into(),
                units: dec!(0.5),
                avg_cost: dec!(280),
                current_price: dec!(300),
            },
        );
        h
    }

    #[test]
    fn test_summary_empty_user() {
        let s = summarize(&[], &Holdings::new(), dec!(100), Utc::now());
        assert_eq!(s.piggy_balance, Decimal::ZERO);
        assert_eq!(s.portfolio_value, Decimal::ZERO);
        assert_eq!(s.total_invested, Decimal::ZERO);
        assert_eq!(s.total_gains, Decimal::ZERO);
        assert_eq!(s.gains_percent, Decimal::ZERO);
        assert_eq!(s.weekly_progress, Decimal::ZERO);
    }

    #[test]
    fn test_summary_values() {
        let now = Utc::now();
        let ledger = vec![
            credit("c1", Some("t1"), dec!(3), now),
            credit("c2", Some("t2"), dec!(7), now - Duration::days(2)),
        ];
        let s = summarize(&ledger, &holdings(), dec!(50), now);

        assert_eq!(s.piggy_balance, dec!(10));
        assert_eq!(s.portfolio_value, dec!(150));
        assert_eq!(s.total_invested, dec!(140));
        assert_eq!(s.total_gains, dec!(10));
        assert_eq!(s.gains_percent, dec!(7.14));
        assert_eq!(s.weekly_progress, dec!(20));
    }

    #[test]
    fn test_weekly_progress_window_and_cap() {
        let now = Utc::now();
        let ledger = vec![
            credit("old", Some("t0"), dec!(500), now - Duration::days(8)),
            credit("new", Some("t1"), dec!(30), now - Duration::hours(1)),
        ];
        assert_eq!(weekly_progress(&ledger, dec!(60), now), dec!(50));
        assert_eq!(weekly_progress(&ledger, dec!(10), now), dec!(100));
        assert_eq!(weekly_progress(&ledger, Decimal::ZERO, now), Decimal::ZERO);
    }

    #[test]
    fn test_weekly_progress_ignores_debits() {
        let now = Utc::now();
        let mut debit = credit("d", None, dec!(30), now);
        debit.entry_type = EntryType::InvestmentDebit;
        assert_eq!(weekly_progress(&[debit], dec!(60), now), Decimal::ZERO);
    }

    #[test]
    fn test_audit_clean_ledger() {
        let now = Utc::now();
        let txns = vec![Transaction::new("t1", dec!(127), "Cafe", "food")];
        let ledger = vec![credit("roundup:t1", Some("t1"), dec!(3), now)];
        assert!(audit_ledger(&ledger, &txns).is_empty());
    }

    #[test]
    fn test_audit_flags_inconsistencies() {
        let now = Utc::now();
        let txns = vec![Transaction::new("t1", dec!(127), "Cafe", "food")];
        let ledger = vec![
            credit("a", Some("t1"), dec!(3), now),
            credit("b", Some("t1"), dec!(3), now),
            credit("c", Some("ghost"), dec!(1), now),
            credit("d", None, dec!(1), now),
        ];

        let warnings = audit_ledger(&ledger, &txns);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.contains(&LedgerWarning::OrphanedReference {
            entry_id: "c".into(),
            reference: "ghost".into(),
        }));
        assert!(warnings.contains(&LedgerWarning::MissingReference { entry_id: "d".into() }));
        assert!(warnings.contains(&LedgerWarning::DuplicateCredit {
            reference: "t1".into(),
            count: 2,
        }));
    }

    #[test]
    fn test_audit_flags_negative_balance() {
        let now = Utc::now();
        let txns = vec![Transaction::new("t1", dec!(127), "Cafe", "food")];
        let mut debit = credit("sweep:1", None, dec!(10), now);
        debit.entry_type = EntryType::InvestmentDebit;
        let ledger = vec![credit("roundup:t1", Some("t1"), dec!(3), now), debit];

        let warnings = audit_ledger(&ledger, &txns);
        assert_eq!(
            warnings,
            vec![LedgerWarning::NegativeBalance { balance: dec!(-7) }]
        );
    }
}
