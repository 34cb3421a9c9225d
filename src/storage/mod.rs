//! Persistence layer.
//!
//! Saves and loads the user's state to/from a JSON file, and reads the
//! transaction and price feed files. The engines never touch the
//! filesystem; the binary fetches state, runs the core, and persists the result.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::engine::Holdings;
use crate::rules::RoundupRule;
use crate::types::{LedgerEntry, Order, PriceMap, Transaction};

/// Default state file path.
const DEFAULT_STATE_FILE: &str = "piggybank_state.json";

/// Everything persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PiggyState {
    pub user_id: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub ledger: Vec<LedgerEntry>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub holdings: Holdings,
    /// Rule the current credits were computed under.
    #[serde(default)]
    pub rule: Option<RoundupRule>,
}

impl PiggyState {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// Append transactions whose ids are not yet known. Returns how many
    /// were added.
    pub fn ingest(&mut self, incoming: Vec<Transaction>) -> usize {
        let fresh: Vec<Transaction> = {
            let known: HashSet<&str> = self.transactions.iter().map(|t| t.id.as_str()).collect();
            let mut seen = HashSet::new();
            incoming
                .into_iter()
                .filter(|t| !known.contains(t.id.as_str()) && seen.insert(t.id.clone()))
                .collect()
        };

        let added = fresh.len();
        self.transactions.extend(fresh);
        added
    }
}

/// Save state to a JSON file.
pub fn save_state(state: &PiggyState, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(state).context("Failed to serialise state")?;

    std::fs::write(path, &json).context(format!("Failed to write state to {path}"))?;

    debug!(path, entries = state.ledger.len(), "State saved");
    Ok(())
}

/// Load state from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<PiggyState>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path).context(format!("Failed to read state from {path}"))?;

    let state: PiggyState =
        serde_json::from_str(&json).context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        transactions = state.transactions.len(),
        entries = state.ledger.len(),
        holdings = state.holdings.len(),
        "State loaded from disk"
    );

    Ok(Some(state))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path).context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

/// Read the transaction feed (a JSON array). A missing file is an empty feed.
pub fn load_transactions(path: &str) -> Result<Vec<Transaction>> {
    if !Path::new(path).exists() {
        debug!(path, "Transaction feed not found");
        return Ok(Vec::new());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transactions from {path}"))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse transactions from {path}"))
}

/// Read the price feed (a JSON object of symbol → price). A missing file
/// is an empty price map.
pub fn load_prices(path: &str) -> Result<PriceMap> {
    if !Path::new(path).exists() {
        debug!(path, "Price feed not found");
        return Ok(PriceMap::new());
    }
    let json =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read prices from {path}"))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse prices from {path}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
