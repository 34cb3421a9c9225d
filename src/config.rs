//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. The
//! round-up rule and the active preset are validated at load time, so an
//! invalid setting stops the app before any ledger entry is written.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

use crate::engine::SweepConfig;
use crate::rules::{PortfolioPreset, PresetKind, RoundupRule};
use crate::types::PiggyError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub app: GeneralConfig,
    pub roundup: RoundupConfig,
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    pub name: String,
    pub user_id: String,
    pub currency: String,
    #[serde(default)]
    pub state_file: Option<String>,
    pub refresh_interval_secs: u64,
    /// Sweep automatically whenever the balance is eligible.
    #[serde(default)]
    pub auto_sweep: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoundupConfig {
    pub round_to_nearest: i64,
    pub min_roundup: Decimal,
    pub max_roundup: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PortfolioConfig {
    /// Built-in preset name, or the name of one of `custom_presets`.
    pub preset: String,
    pub weekly_goal: Decimal,
    #[serde(default)]
    pub require_full_unit: bool,
    #[serde(default)]
    pub custom_presets: Vec<PortfolioPreset>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FeedsConfig {
    pub transactions_file: Option<String>,
    pub prices_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.roundup_rule()?;
        config.active_preset()?;
        Ok(config)
    }

    /// The validated round-up rule.
    pub fn roundup_rule(&self) -> Result<RoundupRule, PiggyError> {
        RoundupRule::new(
            self.roundup.round_to_nearest,
            self.roundup.min_roundup,
            self.roundup.max_roundup,
        )
    }

    /// The selected preset. Custom presets shadow built-ins of the same name.
    pub fn active_preset(&self) -> Result<PortfolioPreset, PiggyError> {
        let wanted = self.portfolio.preset.trim();
        if let Some(custom) = self
            .portfolio
            .custom_presets
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
        {
            return Ok(custom.clone());
        }
        wanted.parse::<PresetKind>().map(|kind| kind.preset())
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            require_full_unit: self.portfolio.require_full_unit,
        }
    }
}
