// =============================================================================
// Average True Range (ATR) — Wilder's smoothing
// =============================================================================
//
// True Range for a bar:
//   TR = max(H - L, |H - prev_close|, |L - prev_close|)
//
// ATR seeds with the mean of the first `period` TR values and then smooths:
//   ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// Strategies derive stop-loss and take-profit distances from this value.
// =============================================================================

use crate::market_data::Candle;

/// Most recent ATR over `candles` (oldest first).
///
/// Returns `None` when `period` is zero, when there are fewer than
/// `period + 1` candles (each TR needs the previous close), or when any
/// intermediate value is non-finite.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let mut true_ranges = Vec::with_capacity(candles.len() - 1);
    for pair in candles.windows(2) {
        let prev_close = pair[0].close;
        let bar = &pair[1];
        let tr = (bar.high - bar.low)
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs());
        true_ranges.push(tr);
    }

    let period_f = period as f64;
    let mut atr = true_ranges[..period].iter().sum::<f64>() / period_f;
    for &tr in &true_ranges[period..] {
        atr = (atr * (period_f - 1.0) + tr) / period_f;
        if !atr.is_finite() {
            return None;
        }
    }

    atr.is_finite().then_some(atr)
}
