// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Central configuration hub for the Meridian trading engine. Persistence uses
// an atomic tmp + rename pattern to prevent corruption on crash. All fields
// carry `#[serde(default)]` so that adding new fields never breaks loading an
// older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::OrderType;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_database_url() -> String {
    "meridian.db".to_string()
}

fn default_broker_url() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_watchlist() -> Vec<String> {
    vec![
        "AAPL".to_string(),
        "MSFT".to_string(),
        "NVDA".to_string(),
        "SPY".to_string(),
        "TSLA".to_string(),
    ]
}

fn default_signal_interval_secs() -> u64 {
    300
}

fn default_min_confidence() -> f64 {
    0.6
}

fn default_signal_ttl_hours() -> i64 {
    24
}

fn default_max_risk_per_trade() -> f64 {
    0.01
}

fn default_max_position_value_pct() -> f64 {
    0.20
}

fn default_min_position_size() -> u32 {
    1
}

fn default_max_position_size() -> u32 {
    1000
}

fn default_max_open_positions() -> usize {
    5
}

fn default_max_daily_loss() -> f64 {
    1000.0
}

// =============================================================================
// TraderConfig
// =============================================================================

/// Top-level runtime configuration for the Meridian trader.
///
/// Every field has a serde default so that older JSON files missing new
/// fields will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderConfig {
    // --- Connections ---------------------------------------------------------

    /// Path of the SQLite database holding artifacts, signals, and trades.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Base URL of the broker adapter service.
    #[serde(default = "default_broker_url")]
    pub broker_url: String,

    /// Address the REST API binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Signal generation ---------------------------------------------------

    /// Symbols processed on every generation cycle. The generator always
    /// iterates these in sorted order regardless of file order.
    #[serde(default = "default_watchlist")]
    pub watchlist: Vec<String>,

    /// Cycle cadence in seconds.
    #[serde(default = "default_signal_interval_secs")]
    pub signal_interval_secs: u64,

    /// Lower confidence bound for persisting a signal.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Hours until a pending signal expires.
    #[serde(default = "default_signal_ttl_hours")]
    pub signal_ttl_hours: i64,

    // --- Execution & risk ----------------------------------------------------

    /// Fraction of account value risked per trade.
    #[serde(default = "default_max_risk_per_trade")]
    pub max_risk_per_trade: f64,

    /// Cap on a single position's value relative to account value.
    #[serde(default = "default_max_position_value_pct")]
    pub max_position_value_pct: f64,

    /// Minimum share count for an order; sizing below this is rejected.
    #[serde(default = "default_min_position_size")]
    pub min_position_size: u32,

    /// Maximum share count for an order.
    #[serde(default = "default_max_position_size")]
    pub max_position_size: u32,

    /// Cap on concurrently open positions.
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,

    /// Absolute USD loss for the day that blocks further executions.
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,

    /// Order type used when submitting to the broker.
    #[serde(default)]
    pub default_order_type: OrderType,

    /// Master switch: when false the execution engine refuses all
    /// executions. Defaults to false so a fresh deployment cannot trade
    /// until an operator enables it.
    #[serde(default)]
    pub execution_enabled: bool,

    // --- Development ---------------------------------------------------------

    /// Seed deterministic demo market data and a promoted demo artifact set
    /// at startup. Development convenience only.
    #[serde(default)]
    pub demo_seed: bool,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            broker_url: default_broker_url(),
            bind_addr: default_bind_addr(),
            watchlist: default_watchlist(),
            signal_interval_secs: default_signal_interval_secs(),
            min_confidence: default_min_confidence(),
            signal_ttl_hours: default_signal_ttl_hours(),
            max_risk_per_trade: default_max_risk_per_trade(),
            max_position_value_pct: default_max_position_value_pct(),
            min_position_size: default_min_position_size(),
            max_position_size: default_max_position_size(),
            max_open_positions: default_max_open_positions(),
            max_daily_loss: default_max_daily_loss(),
            default_order_type: OrderType::Lmt,
            execution_enabled: false,
            demo_seed: false,
        }
    }
}

impl TraderConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            watchlist = ?config.watchlist,
            execution_enabled = config.execution_enabled,
            "trader config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise trader config")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "trader config saved (atomic)");
        Ok(())
    }

    /// Apply environment variable overrides (`MERIDIAN_*`). Called once at
    /// startup, after file load.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("MERIDIAN_DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(url) = std::env::var("MERIDIAN_BROKER_URL") {
            self.broker_url = url;
        }
        if let Ok(addr) = std::env::var("MERIDIAN_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Ok(syms) = std::env::var("MERIDIAN_WATCHLIST") {
            let parsed: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.watchlist = parsed;
            }
        }
    }

    /// Signal time-to-live as a chrono duration.
    pub fn signal_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.signal_ttl_hours)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = TraderConfig::default();
        assert_eq!(cfg.signal_interval_secs, 300);
        assert!((cfg.min_confidence - 0.6).abs() < f64::EPSILON);
        assert_eq!(cfg.signal_ttl_hours, 24);
        assert!((cfg.max_risk_per_trade - 0.01).abs() < f64::EPSILON);
        assert!((cfg.max_position_value_pct - 0.20).abs() < f64::EPSILON);
        assert_eq!(cfg.min_position_size, 1);
        assert_eq!(cfg.max_position_size, 1000);
        assert_eq!(cfg.default_order_type, OrderType::Lmt);
        assert!(!cfg.execution_enabled);
        assert!(!cfg.demo_seed);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: TraderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.watchlist.len(), 5);
        assert_eq!(cfg.max_open_positions, 5);
        assert!((cfg.max_daily_loss - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "watchlist": ["AMD"], "execution_enabled": true }"#;
        let cfg: TraderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.watchlist, vec!["AMD"]);
        assert!(cfg.execution_enabled);
        assert_eq!(cfg.signal_interval_secs, 300);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = TraderConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: TraderConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.watchlist, cfg2.watchlist);
        assert_eq!(cfg.default_order_type, cfg2.default_order_type);
        assert_eq!(cfg.max_open_positions, cfg2.max_open_positions);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut cfg = TraderConfig::default();
        cfg.watchlist = vec!["AAPL".to_string()];
        cfg.save(&path).unwrap();

        let loaded = TraderConfig::load(&path).unwrap();
        assert_eq!(loaded.watchlist, vec!["AAPL"]);
    }

    #[test]
    fn ttl_converts_to_duration() {
        let cfg = TraderConfig::default();
        assert_eq!(cfg.signal_ttl(), chrono::Duration::hours(24));
    }
}
