// =============================================================================
// Signal Generator — the scheduled strategy evaluation pipeline
// =============================================================================
//
// One cycle: snapshot the registry, walk the watchlist in sorted order, and
// for each symbol fetch the latest quote plus bounded candle history, compute
// indicators once, then evaluate every registry entry (sorted by strategy
// name). Qualifying drafts become pending signal rows stamped with the
// originating artifact id. The cycle ends with the idempotent expiry sweep
// and a metrics event.
//
// Failures are isolated: a symbol without data or a failed insert is counted
// and logged, and the cycle moves on.
//
// The ticker loop never overlaps cycles: a cycle still running at the next
// tick causes that tick to be skipped.
// =============================================================================

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::clock;
use crate::indicators::IndicatorSnapshot;
use crate::market_data::MarketDataStore;
use crate::signal_store::{Signal, SignalStore};
use crate::strategies::StrategyInput;
use crate::types::{SignalStatus, SignalType};

/// Candle history window per symbol per cycle.
pub const CANDLE_HISTORY: usize = 250;

/// Outcome of one generation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub signals: Vec<Signal>,
    pub generated: u64,
    pub failed: u64,
    pub expired: u64,
}

pub struct SignalGenerator {
    state: Arc<AppState>,
    market: MarketDataStore,
    signals: SignalStore,
}

impl SignalGenerator {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            market: MarketDataStore::new(state.db.clone()),
            signals: SignalStore::new(state.db.clone()),
            state,
        }
    }

    /// Run one full generation cycle over `symbols`.
    pub fn run_cycle(&self, symbols: &[String]) -> CycleReport {
        let registry = self.state.registry_snapshot();
        let (min_confidence, ttl) = {
            let cfg = self.state.config.read();
            (cfg.min_confidence, cfg.signal_ttl())
        };

        if registry.is_empty() {
            debug!("registry is empty; cycle will generate no signals");
        }

        let mut sorted_symbols: Vec<&String> = symbols.iter().collect();
        sorted_symbols.sort();

        let mut produced = Vec::new();
        let mut failed = 0u64;

        for symbol in sorted_symbols {
            let quote = match self.market.latest_quote(symbol) {
                Ok(Some(quote)) => quote,
                Ok(None) => {
                    warn!(symbol = %symbol, "no quote available; skipping symbol");
                    failed += 1;
                    continue;
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "quote fetch failed; skipping symbol");
                    self.state.push_error(format!("quote fetch for {symbol}: {e}"));
                    failed += 1;
                    continue;
                }
            };

            let candles = match self.market.recent_candles(symbol, CANDLE_HISTORY) {
                Ok(candles) => candles,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "candle fetch failed; skipping symbol");
                    self.state.push_error(format!("candle fetch for {symbol}: {e}"));
                    failed += 1;
                    continue;
                }
            };

            // Indicators once per symbol; every strategy reads the same
            // snapshot.
            let indicators = IndicatorSnapshot::compute(&candles);
            let now = clock::now();

            for entry in registry.iter() {
                let input = StrategyInput {
                    symbol,
                    quote: &quote,
                    candles: &candles,
                    indicators: &indicators,
                };

                let draft = match entry.implementation.evaluate(&input, &entry.params) {
                    Some(draft) => draft,
                    None => continue,
                };

                if draft.signal_type == SignalType::Hold {
                    continue;
                }
                if draft.confidence < min_confidence {
                    debug!(
                        symbol = %symbol,
                        strategy = %entry.strategy_name,
                        confidence = draft.confidence,
                        "draft below confidence floor; dropped"
                    );
                    continue;
                }

                let signal = Signal {
                    id: format!("sig-{}", Uuid::new_v4()),
                    symbol: symbol.to_string(),
                    strategy_name: entry.strategy_name.clone(),
                    signal_type: draft.signal_type,
                    confidence: draft.confidence,
                    entry_price: draft.entry_price,
                    stop_loss: Some(draft.stop_loss),
                    take_profit: draft.take_profit,
                    reasoning: draft.reasoning,
                    indicators: indicators.to_json(),
                    generated_at: now,
                    expires_at: now + ttl,
                    status: SignalStatus::Pending,
                    artifact_id: entry.artifact_id.clone(),
                };

                match self.signals.insert(&signal) {
                    Ok(()) => {
                        info!(
                            signal_id = %signal.id,
                            symbol = %symbol,
                            strategy = %entry.strategy_name,
                            signal_type = %signal.signal_type,
                            confidence = signal.confidence,
                            artifact_id = %signal.artifact_id,
                            "signal generated"
                        );
                        produced.push(signal);
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, strategy = %entry.strategy_name, error = %e, "signal insert failed");
                        self.state.push_error(format!("signal insert failed: {e}"));
                        failed += 1;
                    }
                }
            }
        }

        // Expiry sweep: failures here are logged but do not feed the cycle
        // counters.
        let expired = match self.signals.expire_pending(clock::now()) {
            Ok(count) => count as u64,
            Err(e) => {
                warn!(error = %e, "expiry sweep failed");
                self.state.push_error(format!("expiry sweep failed: {e}"));
                0
            }
        };

        let generated = produced.len() as u64;
        self.state.record_cycle(generated, failed);
        let metrics = self.state.generator_metrics();
        info!(
            runs = metrics.runs,
            signals_generated = generated,
            failed,
            expired,
            "generation cycle complete"
        );

        CycleReport {
            signals: produced,
            generated,
            failed,
            expired,
        }
    }

    /// Drive cycles on the configured cadence until shutdown. Missed ticks
    /// are skipped, so at most one cycle runs at a time.
    pub async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval_secs = self.state.config.read().signal_interval_secs;
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(interval_secs, "signal generator loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let symbols = self.state.config.read().watchlist.clone();
                    self.run_cycle(&symbols);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("signal generator loop stopping");
                        return;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for SignalGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalGenerator").finish_non_exhaustive()
    }
}
