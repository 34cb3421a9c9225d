//! End-to-end cycle through the public API.
//!
//! Transactions → round-up credits → sweep → holdings → returns, with the
//! ledger as the only source of balance.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use piggybank::engine::report;
use piggybank::engine::{Holdings, PortfolioValuator, RoundupEngine, SweepEngine};
use piggybank::rules::{PresetKind, RoundupRule};
use piggybank::types::{EntryType, PriceMap, Transaction};

const USER: &str = "user-001";

fn rule() -> RoundupRule {
    RoundupRule::new(10, dec!(1), dec!(50)).unwrap()
}

fn prices() -> PriceMap {
    let mut p = PriceMap::new();
    p.insert("NIFTYBEES".into(), dec!(285.50));
    p.insert("GOLDBEES".into(), dec!(65.25));
    p
}

/// ₹127 (round-up 3), 21 × ₹91 (9 each) and ₹82 (8): exactly ₹200.
fn transactions() -> Vec<Transaction> {
    let mut txns = vec![Transaction::new("t-000", dec!(127), "Blue Tokai", "food")];
    for i in 1..=21 {
        txns.push(Transaction::new(&format!("t-{i:03}"), dec!(91), "Namma Metro", "travel"));
    }
    txns.push(Transaction::new("t-022", dec!(82), "Swiggy", "food"));
    txns
}

#[test]
fn single_transaction_credits_three_rupees() {
    let txns = vec![Transaction::new("t-1", dec!(127), "Blue Tokai", "food")];
    let ledger = RoundupEngine::process_transactions(&txns, &rule(), USER);
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].amount, dec!(3));
    assert_eq!(SweepEngine::calculate_balance(&ledger), dec!(3));
}

#[test]
fn full_cycle_balanced_sweep() {
    let mut ledger = RoundupEngine::process_transactions(&transactions(), &rule(), USER);
    assert_eq!(SweepEngine::calculate_balance(&ledger), dec!(200));

    let preset = PresetKind::Balanced.preset();
    let engine = SweepEngine::default();
    let outcome = engine.sweep(&ledger, &preset, &prices(), USER, Utc::now());

    assert_eq!(outcome.orders.len(), 2);
    let nifty = &outcome.orders[0];
    let gold = &outcome.orders[1];
    assert_eq!(nifty.symbol, "NIFTYBEES");
    assert_eq!(nifty.quantity, dec!(0.490367));
    assert!(nifty.amount <= dec!(140) && nifty.amount > dec!(139.99));
    assert_eq!(gold.symbol, "GOLDBEES");
    assert_eq!(gold.quantity, dec!(0.919540));
    assert!(gold.amount <= dec!(60) && gold.amount > dec!(59.99));

    // Residual stays in the piggy balance.
    let debit = outcome.debit.clone().unwrap();
    assert_eq!(debit.amount, nifty.amount + gold.amount);
    ledger.push(debit);
    let remaining = SweepEngine::calculate_balance(&ledger);
    assert_eq!(remaining, dec!(200) - outcome.invested);
    assert!(remaining >= Decimal::ZERO && remaining < dec!(0.01));

    let mut holdings = Holdings::new();
    PortfolioValuator::apply_orders(&mut holdings, &outcome.orders);
    assert_eq!(holdings["NIFTYBEES"].units, dec!(0.490367));
    assert_eq!(holdings["NIFTYBEES"].avg_cost, dec!(285.50));
    assert_eq!(holdings["GOLDBEES"].units, dec!(0.919540));
    assert_eq!(holdings["GOLDBEES"].avg_cost, dec!(65.25));

    let returns = PortfolioValuator::calculate_returns(holdings.values());
    assert_eq!(returns.gains, Decimal::ZERO);
    assert_eq!(returns.invested, outcome.invested);

    assert!(PortfolioValuator::reconcile(&holdings, &outcome.orders, dec!(0.01)).is_empty());
}

#[test]
fn price_tick_moves_value_not_cost() {
    let ledger = RoundupEngine::process_transactions(&transactions(), &rule(), USER);
    let outcome = SweepEngine::default().sweep(
        &ledger,
        &PresetKind::Balanced.preset(),
        &prices(),
        USER,
        Utc::now(),
    );

    let mut holdings = PortfolioValuator::rebuild_holdings(&outcome.orders);
    let before = PortfolioValuator::calculate_returns(holdings.values());

    let mut tick = prices();
    tick.insert("NIFTYBEES".into(), dec!(314.05));
    PortfolioValuator::refresh_prices(&mut holdings, &tick);

    let after = PortfolioValuator::calculate_returns(holdings.values());
    assert_eq!(after.invested, before.invested);
    assert!(after.current > before.current);
    assert!(after.gains_percent > Decimal::ZERO);
    assert_eq!(holdings["NIFTYBEES"].avg_cost, dec!(285.50));
}

#[test]
fn rule_change_replaces_credits() {
    let txns = transactions();
    let ledger = RoundupEngine::process_transactions(&txns, &rule(), USER);

    let coarser = RoundupRule::new(100, dec!(1), dec!(50)).unwrap();
    let rebuilt = RoundupEngine::recompute_ledger(&ledger, &txns, &coarser, USER);

    let credits: Vec<_> = rebuilt
        .iter()
        .filter(|e| e.entry_type == EntryType::RoundupCredit)
        .collect();
    assert_eq!(credits.len(), txns.len());
    for (credit, txn) in credits.iter().zip(&txns) {
        assert_eq!(credit.reference.as_deref(), Some(txn.id.as_str()));
        assert_eq!(credit.amount, RoundupEngine::calculate_roundup(txn.amount, &coarser));
    }

    // 127 -> 200 capped at 50; 91 -> 9; 82 -> 18
    assert_eq!(
        SweepEngine::calculate_balance(&rebuilt),
        dec!(50) + dec!(9) * Decimal::from(21) + dec!(18)
    );
    assert!(report::audit_ledger(&rebuilt, &txns).is_empty());
}

#[test]
fn sweep_then_rule_change_keeps_debits() {
    let txns = transactions();
    let mut ledger = RoundupEngine::process_transactions(&txns, &rule(), USER);
    let outcome = SweepEngine::default().sweep(
        &ledger,
        &PresetKind::Balanced.preset(),
        &prices(),
        USER,
        Utc::now(),
    );
    ledger.push(outcome.debit.clone().unwrap());

    let rebuilt = RoundupEngine::recompute_ledger(&ledger, &txns, &rule(), USER);
    assert_eq!(rebuilt, ledger);
    assert_eq!(rebuilt.last().map(|e| e.entry_type), Some(EntryType::InvestmentDebit));
    assert_eq!(
        SweepEngine::calculate_balance(&rebuilt),
        SweepEngine::calculate_balance(&ledger)
    );
}

#[test]
fn summary_for_new_user_is_all_zero() {
    let summary = report::summarize(&[], &Holdings::new(), dec!(250), Utc::now());
    assert_eq!(summary.piggy_balance, Decimal::ZERO);
    assert_eq!(summary.portfolio_value, Decimal::ZERO);
    assert_eq!(summary.gains_percent, Decimal::ZERO);
    assert_eq!(summary.weekly_progress, Decimal::ZERO);
}
