// =============================================================================
// Strategy Library — pure signal producers
// =============================================================================
//
// A strategy is a pure function of (market inputs, artifact params) to an
// optional signal draft. No time reads, no randomness, no I/O: identical
// inputs must produce identical drafts on every invocation, which is what
// makes cycles replayable under a fixed clock.
//
// Artifacts bind to implementations through `resolve`, the process-local
// static map. An artifact naming a strategy that is not in this map cannot
// be loaded.
// =============================================================================

pub mod ma_crossover;
pub mod macd_crossover;
pub mod rsi_momentum;

use std::sync::Arc;

use serde_json::Value;

use crate::indicators::IndicatorSnapshot;
use crate::market_data::{Candle, Quote};
use crate::types::SignalType;

/// Stop-loss distance as a multiple of ATR.
pub const SL_ATR_MULT: f64 = 1.5;
/// Take-profit distance as a multiple of ATR.
pub const TP_ATR_MULT: f64 = 2.5;

/// Everything a strategy may look at for one (symbol, cycle) evaluation.
pub struct StrategyInput<'a> {
    pub symbol: &'a str,
    pub quote: &'a Quote,
    pub candles: &'a [Candle],
    pub indicators: &'a IndicatorSnapshot,
}

/// A strategy's verdict before persistence decorates it with ids, artifact
/// provenance, and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDraft {
    pub signal_type: SignalType,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub reasoning: String,
}

/// A pure trading strategy.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Evaluate one symbol. `None` means no signal, including the
    /// insufficient-data case.
    fn evaluate(&self, input: &StrategyInput<'_>, params: &Value) -> Option<SignalDraft>;
}

/// Static map from artifact strategy name to implementation.
pub fn resolve(name: &str) -> Option<Arc<dyn Strategy>> {
    match name {
        "rsi_momentum" => Some(Arc::new(rsi_momentum::RsiMomentum)),
        "macd_crossover" => Some(Arc::new(macd_crossover::MacdCrossover)),
        "ma_crossover" => Some(Arc::new(ma_crossover::MaCrossover)),
        _ => None,
    }
}

/// Read a float parameter with an explicit default. Unknown keys and
/// non-numeric values fall back to the default; artifacts stay forward
/// compatible.
pub(crate) fn param_f64(params: &Value, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

/// Stop-loss and take-profit levels derived from ATR for a given direction.
/// `None` when ATR is absent or non-positive.
pub(crate) fn atr_levels(
    signal_type: SignalType,
    entry_price: f64,
    atr: Option<f64>,
) -> Option<(f64, f64)> {
    let atr = atr.filter(|a| *a > 0.0)?;
    match signal_type {
        SignalType::Buy => Some((
            entry_price - SL_ATR_MULT * atr,
            entry_price + TP_ATR_MULT * atr,
        )),
        SignalType::Sell => Some((
            entry_price + SL_ATR_MULT * atr,
            entry_price - TP_ATR_MULT * atr,
        )),
        SignalType::Hold => None,
    }
}
