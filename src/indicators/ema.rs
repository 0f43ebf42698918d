// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA weights recent prices more heavily than the simple average:
//
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first output is seeded with the SMA of the first `period` closes.
// MACD is built on top of this series.
// =============================================================================

/// Compute the EMA series for `closes` with look-back `period`.
///
/// The first output element corresponds to the close at index `period - 1`.
/// Returns an empty vec for a zero period or insufficient history; a
/// non-finite intermediate stops the series.
pub fn ema_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let seed: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut series = Vec::with_capacity(closes.len() - period + 1);
    series.push(seed);

    let mut prev = seed;
    for &close in &closes[period..] {
        let ema = close * multiplier + prev * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        series.push(ema);
        prev = ema;
    }

    series
}
