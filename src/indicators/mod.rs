// =============================================================================
// Indicator primitives
// =============================================================================
//
// Pure functions over price history. Each indicator is computed once per
// symbol per generation cycle and bundled into an [`IndicatorSnapshot`] that
// every strategy reads; the snapshot is also what a persisted signal carries
// in its `indicators` column.
//
// Determinism: no time reads, no randomness, no map iteration. Serialisation
// of the snapshot goes through serde_json, whose object keys are sorted.
// =============================================================================

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod volume;

use serde::{Deserialize, Serialize};

use crate::market_data::Candle;

pub use bollinger::BollingerBands;
pub use macd::MacdPoint;

/// Standard periods used across the engine.
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD: f64 = 2.0;
pub const VOLUME_AVG_PERIOD: usize = 20;
pub const SMA_PERIODS: [usize; 3] = [20, 50, 200];

/// All indicators for one symbol at one instant.
///
/// Crossover strategies need the value one bar back as well as the latest,
/// so the snapshot keeps a `prev_*` companion for those series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi_14: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<MacdPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_macd: Option<MacdPoint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_20: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_200: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_sma_20: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_sma_50: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub atr_14: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger: Option<BollingerBands>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_avg_20: Option<f64>,
}

impl IndicatorSnapshot {
    /// Compute every indicator from the candle history (oldest first).
    /// Individual indicators that lack sufficient history are simply absent.
    pub fn compute(candles: &[Candle]) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let rsi_series = rsi::rsi_series(&closes, RSI_PERIOD);
        let macd_series = macd::macd_series(&closes);
        let sma20_series = sma::sma_series(&closes, SMA_PERIODS[0]);
        let sma50_series = sma::sma_series(&closes, SMA_PERIODS[1]);

        Self {
            rsi_14: rsi_series.last().copied(),
            macd: macd_series.last().cloned(),
            prev_macd: previous(&macd_series).cloned(),
            sma_20: sma20_series.last().copied(),
            sma_50: sma50_series.last().copied(),
            sma_200: sma::latest_sma(&closes, SMA_PERIODS[2]),
            prev_sma_20: previous(&sma20_series).copied(),
            prev_sma_50: previous(&sma50_series).copied(),
            atr_14: atr::calculate_atr(candles, ATR_PERIOD),
            bollinger: bollinger::calculate_bollinger(&closes, BOLLINGER_PERIOD, BOLLINGER_STD),
            volume_avg_20: volume::rolling_volume_avg(candles, VOLUME_AVG_PERIOD),
        }
    }

    /// Snapshot as a JSON object for the `indicators` signal column. Keys are
    /// sorted by serde_json's object representation.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Second-to-last element of a series, if present.
fn previous<T>(series: &[T]) -> Option<&T> {
    series.len().checked_sub(2).and_then(|i| series.get(i))
}
