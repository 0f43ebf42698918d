// =============================================================================
// Relative Strength Index (RSI) — Wilder's smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes on a 0..100
// scale. Average gain and average loss are seeded with the simple mean of the
// first `period` deltas, then smoothed:
//
//   avg_gain = (prev_avg_gain * (period - 1) + gain) / period
//   avg_loss = (prev_avg_loss * (period - 1) + loss) / period
//   RSI      = 100 - 100 / (1 + avg_gain / avg_loss)
// =============================================================================

/// Compute the RSI series for `closes` with the given look-back `period`.
///
/// The first value corresponds to the close at index `period`; earlier closes
/// only seed the averages. Returns an empty vec when `period` is zero or the
/// history is too short. Non-finite intermediates truncate the series.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for &d in &deltas[..period] {
        if d > 0.0 {
            avg_gain += d;
        } else {
            avg_loss += -d;
        }
    }
    let period_f = period as f64;
    avg_gain /= period_f;
    avg_loss /= period_f;

    let mut series = Vec::with_capacity(deltas.len() - period + 1);
    match rsi_value(avg_gain, avg_loss) {
        Some(v) => series.push(v),
        None => return Vec::new(),
    }

    for &d in &deltas[period..] {
        let gain = d.max(0.0);
        let loss = (-d).max(0.0);
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_value(avg_gain, avg_loss) {
            Some(v) => series.push(v),
            None => break,
        }
    }

    series
}

/// Most recent RSI value, or `None` on insufficient history.
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    rsi_series(closes, period).last().copied()
}

/// A flat market (no gains, no losses) reads as neutral 50; a market with no
/// losses pins at 100.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };
    rsi.is_finite().then_some(rsi)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_degenerate_inputs() {
        assert!(rsi_series(&[], 14).is_empty());
        assert!(rsi_series(&[1.0, 2.0, 3.0], 0).is_empty());
        // 14 closes give only 13 deltas, one short of a 14-period seed.
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(rsi_series(&closes, 14).is_empty());
    }

    #[test]
    fn monotonic_rise_pins_at_100() {
        let closes: Vec<f64> = (1..=40).map(|x| x as f64).collect();
        for v in rsi_series(&closes, 14) {
            assert!((v - 100.0).abs() < 1e-9, "expected 100, got {v}");
        }
    }

    #[test]
    fn monotonic_fall_pins_at_0() {
        let closes: Vec<f64> = (1..=40).rev().map(|x| x as f64).collect();
        for v in rsi_series(&closes, 14) {
            assert!(v.abs() < 1e-9, "expected 0, got {v}");
        }
    }

    #[test]
    fn flat_market_reads_neutral() {
        let closes = vec![42.0; 40];
        for v in rsi_series(&closes, 14) {
            assert!((v - 50.0).abs() < 1e-9, "expected 50, got {v}");
        }
    }

    #[test]
    fn always_within_bounds() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13, 44.80, 45.20,
        ];
        let series = rsi_series(&closes, 14);
        assert!(!series.is_empty());
        for v in series {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn nan_truncates_series() {
        let mut closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        closes.push(f64::NAN);
        closes.extend((22..=30).map(|x| x as f64));
        let series = rsi_series(&closes, 14);
        // Values produced before the NaN survive; the series stops there.
        assert!(!series.is_empty());
        assert!(series.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn latest_matches_series_tail() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let series = rsi_series(&closes, 14);
        assert_eq!(latest_rsi(&closes, 14), series.last().copied());
    }
}
