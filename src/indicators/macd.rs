// =============================================================================
// Moving Average Convergence Divergence (MACD) — 12/26/9
// =============================================================================
//
// MACD line  = EMA(12) - EMA(26)
// Signal     = EMA(9) of the MACD line
// Histogram  = MACD line - signal
//
// A histogram sign flip is the crossover event the MACD strategy trades on,
// so the series exposes full points rather than just the latest value.
// =============================================================================

use serde::{Deserialize, Serialize};

use super::ema::ema_series;

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// One bar of the MACD series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Compute the MACD series with the standard 12/26/9 configuration, oldest
/// first. Empty when the history cannot support the slow EMA plus the signal
/// window.
pub fn macd_series(closes: &[f64]) -> Vec<MacdPoint> {
    macd_series_with(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)
}

/// MACD with explicit periods. `fast` must be shorter than `slow`.
pub fn macd_series_with(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Vec<MacdPoint> {
    if fast == 0 || signal == 0 || fast >= slow || closes.len() < slow {
        return Vec::new();
    }

    let fast_series = ema_series(closes, fast);
    let slow_series = ema_series(closes, slow);

    // The fast series starts (slow - fast) bars earlier; align the tails.
    let offset = fast_series.len().saturating_sub(slow_series.len());
    let line: Vec<f64> = fast_series[offset..]
        .iter()
        .zip(slow_series.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_series = ema_series(&line, signal);
    if signal_series.is_empty() {
        return Vec::new();
    }

    let line_offset = line.len() - signal_series.len();
    line[line_offset..]
        .iter()
        .zip(signal_series.iter())
        .map(|(&l, &s)| MacdPoint {
            line: l,
            signal: s,
            histogram: l - s,
        })
        .collect()
}
