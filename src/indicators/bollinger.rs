// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band is the SMA of the window; upper/lower bands sit `num_std`
// standard deviations away. Width is normalised by the middle band.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Upper / middle / lower band values plus normalised width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

/// Bollinger bands over the trailing `period` closes.
///
/// Returns `None` for a zero period, insufficient history, a zero middle band
/// (degenerate input), or a non-finite width.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    let width = (upper - lower) / middle * 100.0;

    width.is_finite().then_some(BollingerBands {
        upper,
        middle,
        lower,
        width,
    })
}
