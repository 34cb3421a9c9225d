//! PIGGYBANK — spare-change investing companion
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores state from disk (or creates fresh), and runs the periodic
//! ingest → round-up → sweep → value loop with graceful shutdown.
//! Sweep scheduling lives here; the engines only decide what to buy.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use piggybank::config::{AppConfig, FeedsConfig};
use piggybank::dashboard::{self, DashboardState};
use piggybank::engine::report::PortfolioSummary;
use piggybank::engine::{RefreshCycle, SweepEngine};
use piggybank::storage::{self, PiggyState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;
    init_logging();

    let rule = cfg.roundup_rule()?;
    let preset = cfg.active_preset()?;
    let sweeper = SweepEngine::new(cfg.sweep_config());

    info!(
        name = %cfg.app.name,
        user_id = %cfg.app.user_id,
        currency = %cfg.app.currency,
        round_to_nearest = rule.round_to_nearest(),
        preset = %preset,
        auto_sweep = cfg.app.auto_sweep,
        "PIGGYBANK starting up"
    );

    let state_file = cfg.app.state_file.as_deref();
    let mut state = match storage::load_state(state_file)? {
        Some(s) if s.user_id == cfg.app.user_id => s,
        Some(s) => {
            warn!(stored = %s.user_id, configured = %cfg.app.user_id, "State belongs to another user, starting fresh");
            PiggyState::new(&cfg.app.user_id)
        }
        None => PiggyState::new(&cfg.app.user_id),
    };

    let dash = if cfg.dashboard.enabled {
        let dash = Arc::new(DashboardState::new(&state, cfg.portfolio.weekly_goal));
        dashboard::spawn_dashboard(dash.clone(), cfg.dashboard.port).await?;
        Some(dash)
    } else {
        None
    };

    let cycle = RefreshCycle {
        rule: &rule,
        preset: &preset,
        sweeper: &sweeper,
        weekly_goal: cfg.portfolio.weekly_goal,
        auto_sweep: cfg.app.auto_sweep,
    };

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.app.refresh_interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.app.refresh_interval_secs,
        "Entering refresh loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match run_pass(&cycle, &cfg.feeds, &mut state) {
                    Ok(summary) => {
                        if let Err(e) = storage::save_state(&state, state_file) {
                            error!(error = %e, "Failed to save state");
                        }
                        if let Some(ref dash) = dash {
                            dash.publish(&state, summary).await;
                        }
                    }
                    Err(e) => error!(error = %e, "Refresh failed — continuing to next"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    storage::save_state(&state, state_file)?;
    info!(
        entries = state.ledger.len(),
        orders = state.orders.len(),
        "PIGGYBANK shut down cleanly."
    );

    Ok(())
}

/// Read the feeds and run one refresh pass.
fn run_pass(
    cycle: &RefreshCycle<'_>,
    feeds: &FeedsConfig,
    state: &mut PiggyState,
) -> Result<PortfolioSummary> {
    let incoming = match feeds.transactions_file.as_deref() {
        Some(path) => storage::load_transactions(path)?,
        None => Vec::new(),
    };
    let prices = match feeds.prices_file.as_deref() {
        Some(path) => storage::load_prices(path)?,
        None => Default::default(),
    };

    let outcome = cycle.run(state, incoming, &prices, Utc::now());
    if let Some(sweep) = &outcome.sweep {
        info!(
            invested = %sweep.invested,
            orders = sweep.orders.len(),
            "Sweep recorded"
        );
    }
    Ok(outcome.summary)
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("piggybank=info"));

    if std::env::var("PIGGYBANK_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
