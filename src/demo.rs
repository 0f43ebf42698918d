// =============================================================================
// Demo Seeding — deterministic data for a fresh checkout
// =============================================================================
//
// With `demo_seed = true` the engine starts with synthetic quote/candle
// history for the watchlist and one approved artifact per shipped strategy,
// so the full pipeline (load -> generate -> approve -> execute) can be
// exercised without a research runtime. The walk is a fixed sine blend, not
// an RNG: reseeding produces byte-identical prices.
// =============================================================================

use anyhow::Result;
use chrono::Duration;
use serde_json::json;
use tracing::info;

use crate::artifact::domain::{
    ArtifactState, DataWindow, StrategyRef, ValidationMetrics, ValidationRecord,
};
use crate::artifact::service::{ArtifactService, DraftRequest};
use crate::clock;
use crate::db::Database;
use crate::market_data::{Candle, MarketDataStore, Quote};

/// Candles seeded per symbol.
const SEED_BARS: usize = 260;

/// Seed synthetic market data for `symbols` and promote one artifact per
/// shipped strategy to APPROVED.
pub fn seed(db: &Database, service: &ArtifactService, symbols: &[String]) -> Result<()> {
    seed_market_data(db, symbols)?;
    seed_artifacts(service, symbols)?;
    info!(symbols = symbols.len(), "demo data seeded");
    Ok(())
}

fn seed_market_data(db: &Database, symbols: &[String]) -> Result<()> {
    let market = MarketDataStore::new(db.clone());
    let now = clock::now();

    for (index, symbol) in symbols.iter().enumerate() {
        // Distinct but deterministic per-symbol base price and phase.
        let base = 80.0 + 40.0 * index as f64;
        let phase = index as f64 * 0.7;

        let mut last_close = base;
        for bar in 0..SEED_BARS {
            let t = bar as f64 * 0.12 + phase;
            let close = base * (1.0 + 0.04 * t.sin() + 0.015 * (2.7 * t).cos());
            let high = close.max(last_close) * 1.004;
            let low = close.min(last_close) * 0.996;
            market.insert_candle(
                symbol,
                &Candle {
                    ts: now - Duration::minutes(5 * (SEED_BARS - bar) as i64),
                    open: last_close,
                    high,
                    low,
                    close,
                    volume: 1_000.0 + 50.0 * ((t * 1.3).sin().abs() * 10.0),
                },
            )?;
            last_close = close;
        }

        market.insert_quote(&Quote {
            symbol: symbol.clone(),
            price: last_close,
            volume: 10_000.0,
            timestamp: now,
        })?;
    }

    Ok(())
}

fn seed_artifacts(service: &ArtifactService, symbols: &[String]) -> Result<()> {
    let now = clock::now();
    let window_from = clock::fmt_ts(now - Duration::days(120));
    let window_to = clock::fmt_ts(now);

    for (index, strategy) in ["rsi_momentum", "macd_crossover", "ma_crossover"]
        .iter()
        .enumerate()
    {
        let artifact = service.create_artifact(DraftRequest {
            strategy: StrategyRef {
                name: strategy.to_string(),
                version: "1.0.0".to_string(),
                code_ref: format!("demo:{strategy}"),
                params: json!({}),
            },
            data_window: DataWindow {
                from: window_from.clone(),
                to: window_to.clone(),
                symbols: symbols.to_vec(),
            },
            validation: ValidationRecord {
                backtest_run_id: format!("demo-bt-{index}"),
                metrics: ValidationMetrics {
                    sharpe: 1.1,
                    max_drawdown: 0.12,
                    win_rate: 0.53,
                    total_trades: 120,
                    profit_factor: 1.3,
                },
                determinism_seed: 42,
                report_uri: None,
            },
            risk_profile: json!({
                "max_position_pct": 0.2,
                "max_daily_loss": 1000.0,
                "allowed_order_types": ["LMT", "MKT", "STP"]
            }),
            created_by: "demo-seed".to_string(),
            payload_uri: None,
            signature: None,
        })?;

        for state in [
            ArtifactState::Validated,
            ArtifactState::Reviewed,
            ArtifactState::Approved,
        ] {
            service.promote(&artifact.id, state, "demo-seed", "demo bootstrap")?;
        }
    }

    Ok(())
}
