//! Core engine — round-up, sweep and valuation, plus the derived read model.
//!
//! Everything here is pure and synchronous: callers pass in the ledger,
//! prices and settings, and persist whatever comes back.

pub mod cycle;
pub mod report;
pub mod roundup;
pub mod sweep;
pub mod valuator;

pub use cycle::{RefreshCycle, RefreshOutcome};
pub use roundup::RoundupEngine;
pub use sweep::{SweepConfig, SweepEngine, SweepOutcome};
pub use valuator::{Holdings, PortfolioReturns, PortfolioValuator};
