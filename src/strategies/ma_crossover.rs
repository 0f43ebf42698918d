// =============================================================================
// MA Crossover — SMA-20 / SMA-50 golden and death crosses
// =============================================================================
//
// BUY when the 20-period SMA crosses above the 50-period SMA between the
// previous bar and the current one; SELL on the opposite cross. Confidence
// grows with the post-cross spread between the averages.
// =============================================================================

use serde_json::Value;

use crate::types::SignalType;

use super::{atr_levels, SignalDraft, Strategy, StrategyInput};

const BASE_CONFIDENCE: f64 = 0.6;
const CONFIDENCE_SPAN: f64 = 0.35;
/// Spread (as a fraction of the slow SMA) at which confidence saturates.
const SPREAD_SATURATION: f64 = 0.01;

pub struct MaCrossover;

impl Strategy for MaCrossover {
    fn name(&self) -> &'static str {
        "ma_crossover"
    }

    fn evaluate(&self, input: &StrategyInput<'_>, _params: &Value) -> Option<SignalDraft> {
        let ind = input.indicators;
        let (fast, slow) = (ind.sma_20?, ind.sma_50?);
        let (prev_fast, prev_slow) = (ind.prev_sma_20?, ind.prev_sma_50?);
        let entry_price = input.quote.price;
        if entry_price <= 0.0 || slow <= 0.0 {
            return None;
        }

        let signal_type = if prev_fast <= prev_slow && fast > slow {
            SignalType::Buy
        } else if prev_fast >= prev_slow && fast < slow {
            SignalType::Sell
        } else {
            return None;
        };

        let spread = (fast - slow).abs() / slow;
        let confidence = BASE_CONFIDENCE + CONFIDENCE_SPAN * (spread / SPREAD_SATURATION).min(1.0);

        let (stop_loss, take_profit) = atr_levels(signal_type, entry_price, ind.atr_14)?;

        Some(SignalDraft {
            signal_type,
            confidence,
            entry_price,
            stop_loss,
            take_profit: Some(take_profit),
            reasoning: format!(
                "SMA-20 crossed {} SMA-50 ({fast:.2} vs {slow:.2})",
                if signal_type == SignalType::Buy {
                    "above"
                } else {
                    "below"
                }
            ),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{assert_replay_deterministic, quote, snapshot};
    use serde_json::json;

    fn input_with<'a>(
        quote: &'a crate::market_data::Quote,
        indicators: &'a crate::indicators::IndicatorSnapshot,
    ) -> StrategyInput<'a> {
        StrategyInput {
            symbol: "SPY",
            quote,
            candles: &[],
            indicators,
        }
    }

    fn crossing_snapshot(
        prev_fast: f64,
        prev_slow: f64,
        fast: f64,
        slow: f64,
    ) -> crate::indicators::IndicatorSnapshot {
        let mut ind = snapshot();
        ind.prev_sma_20 = Some(prev_fast);
        ind.prev_sma_50 = Some(prev_slow);
        ind.sma_20 = Some(fast);
        ind.sma_50 = Some(slow);
        ind.atr_14 = Some(3.0);
        ind
    }

    #[test]
    fn golden_cross_emits_buy() {
        let q = quote("SPY", 450.0);
        let ind = crossing_snapshot(448.0, 449.0, 451.0, 450.0);
        let draft = MaCrossover.evaluate(&input_with(&q, &ind), &json!({})).unwrap();
        assert_eq!(draft.signal_type, SignalType::Buy);
        assert!(draft.stop_loss < 450.0);
        assert!(draft.take_profit.unwrap() > 450.0);
    }

    #[test]
    fn death_cross_emits_sell() {
        let q = quote("SPY", 450.0);
        let ind = crossing_snapshot(451.0, 450.0, 448.0, 449.5);
        let draft = MaCrossover.evaluate(&input_with(&q, &ind), &json!({})).unwrap();
        assert_eq!(draft.signal_type, SignalType::Sell);
    }

    #[test]
    fn already_crossed_stays_silent() {
        let q = quote("SPY", 450.0);
        // Fast above slow on both bars: the cross happened earlier.
        let ind = crossing_snapshot(451.0, 449.0, 452.0, 450.0);
        assert!(MaCrossover.evaluate(&input_with(&q, &ind), &json!({})).is_none());
    }

    #[test]
    fn missing_series_stays_silent() {
        let q = quote("SPY", 450.0);
        let mut ind = crossing_snapshot(448.0, 449.0, 451.0, 450.0);
        ind.prev_sma_50 = None;
        assert!(MaCrossover.evaluate(&input_with(&q, &ind), &json!({})).is_none());
    }

    #[test]
    fn confidence_scales_with_spread() {
        let q = quote("SPY", 450.0);
        let narrow = crossing_snapshot(448.0, 449.0, 450.05, 450.0);
        let wide = crossing_snapshot(448.0, 449.0, 455.0, 450.0);
        let c_narrow = MaCrossover
            .evaluate(&input_with(&q, &narrow), &json!({}))
            .unwrap()
            .confidence;
        let c_wide = MaCrossover
            .evaluate(&input_with(&q, &wide), &json!({}))
            .unwrap()
            .confidence;
        assert!(c_wide > c_narrow);
        assert!((c_wide - 0.95).abs() < 1e-9, "wide spread saturates the span");
    }

    #[test]
    fn replay_is_deterministic() {
        let q = quote("SPY", 450.0);
        let ind = crossing_snapshot(448.0, 449.0, 451.0, 450.0);
        assert_replay_deterministic(&MaCrossover, &input_with(&q, &ind), &json!({}));
    }
}
