//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`
//! and replaced wholesale by the binary after each refresh.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::report::{self, PortfolioSummary};
use crate::engine::Holdings;
use crate::storage::PiggyState;
use crate::types::{Holding, LedgerEntry, Order};

/// Maximum rows returned by the list endpoints.
const RECENT_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub summary: RwLock<PortfolioSummary>,
    pub holdings: RwLock<Holdings>,
    pub ledger: RwLock<Vec<LedgerEntry>>,
    pub orders: RwLock<Vec<Order>>,
}

impl DashboardState {
    pub fn new(state: &PiggyState, weekly_goal: Decimal) -> Self {
        Self {
            summary: RwLock::new(report::summarize(
                &state.ledger,
                &state.holdings,
                weekly_goal,
                Utc::now(),
            )),
            holdings: RwLock::new(state.holdings.clone()),
            ledger: RwLock::new(state.ledger.clone()),
            orders: RwLock::new(state.orders.clone()),
        }
    }

    /// Replace the published view with a fresh snapshot.
    pub async fn publish(&self, state: &PiggyState, summary: PortfolioSummary) {
        *self.summary.write().await = summary;
        *self.holdings.write().await = state.holdings.clone();
        *self.ledger.write().await = state.ledger.clone();
        *self.orders.write().await = state.orders.clone();
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HoldingView {
    pub symbol: String,
    pub units: Decimal,
    pub avg_cost: Decimal,
    pub current_price: Decimal,
    pub current_value: Decimal,
}

impl From<&Holding> for HoldingView {
    fn from(h: &Holding) -> Self {
        Self {
            symbol: h.symbol.clone(),
            units: h.units,
            avg_cost: h.avg_cost,
            current_price: h.current_price,
            current_value: h.current_value(),
        }
    }
}

fn tail<T: Clone>(items: &[T]) -> Vec<T> {
    let start = items.len().saturating_sub(RECENT_LIMIT);
    items[start..].to_vec()
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/summary
pub async fn get_summary(State(state): State<AppState>) -> Json<PortfolioSummary> {
    Json(state.summary.read().await.clone())
}

/// GET /api/holdings
pub async fn get_holdings(State(state): State<AppState>) -> Json<Vec<HoldingView>> {
    let holdings = state.holdings.read().await;
    Json(holdings.values().map(HoldingView::from).collect())
}

/// GET /api/ledger
pub async fn get_ledger(State(state): State<AppState>) -> Json<Vec<LedgerEntry>> {
    let ledger = state.ledger.read().await;
    Json(tail(ledger.as_slice()))
}

/// GET /api/orders
pub async fn get_orders(State(state): State<AppState>) -> Json<Vec<Order>> {
    let orders = state.orders.read().await;
    Json(tail(orders.as_slice()))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
