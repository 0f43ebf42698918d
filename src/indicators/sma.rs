// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================

/// Compute the SMA series for `closes` with look-back `period`, one value per
/// full window (oldest first). Empty when `period` is zero or the history is
/// shorter than one window.
pub fn sma_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let mut series = Vec::with_capacity(closes.len() - period + 1);
    let mut window_sum: f64 = closes[..period].iter().sum();
    series.push(window_sum / period as f64);

    for i in period..closes.len() {
        window_sum += closes[i] - closes[i - period];
        series.push(window_sum / period as f64);
    }

    series.retain(|v| v.is_finite());
    series
}

/// Most recent SMA value over the trailing window.
pub fn latest_sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let mean = closes[closes.len() - period..].iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}
