// =============================================================================
// Rolling volume average
// =============================================================================

use crate::market_data::Candle;

/// Mean volume over the trailing `period` candles. `None` on insufficient
/// history or non-finite input.
pub fn rolling_volume_avg(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let mean = candles[candles.len() - period..]
        .iter()
        .map(|c| c.volume)
        .sum::<f64>()
        / period as f64;
    mean.is_finite().then_some(mean)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(volume: f64) -> Candle {
        Candle {
            ts: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume,
        }
    }

    #[test]
    fn averages_trailing_window() {
        let candles: Vec<Candle> = (1..=30).map(|i| candle(i as f64)).collect();
        // Trailing 20 volumes are 11..=30, mean 20.5.
        let avg = rolling_volume_avg(&candles, 20).unwrap();
        assert!((avg - 20.5).abs() < 1e-12);
    }

    #[test]
    fn insufficient_history() {
        let candles: Vec<Candle> = (1..=5).map(|i| candle(i as f64)).collect();
        assert!(rolling_volume_avg(&candles, 20).is_none());
        assert!(rolling_volume_avg(&candles, 0).is_none());
    }

    #[test]
    fn nan_volume_returns_none() {
        let mut candles: Vec<Candle> = (1..=20).map(|i| candle(i as f64)).collect();
        candles[10].volume = f64::NAN;
        assert!(rolling_volume_avg(&candles, 20).is_none());
    }
}
