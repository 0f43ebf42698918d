// =============================================================================
// RSI Momentum — mean-reversion off overbought/oversold extremes
// =============================================================================
//
// BUY when RSI-14 is at or below the oversold threshold, SELL at or above
// the overbought threshold. Confidence starts at 0.6 on the threshold and
// scales linearly to 1.0 at the extreme.
//
// Params (all optional): `oversold` (30), `overbought` (70).
// =============================================================================

use serde_json::Value;

use crate::types::SignalType;

use super::{atr_levels, param_f64, SignalDraft, Strategy, StrategyInput};

const BASE_CONFIDENCE: f64 = 0.6;
const CONFIDENCE_SPAN: f64 = 0.4;

pub struct RsiMomentum;

impl Strategy for RsiMomentum {
    fn name(&self) -> &'static str {
        "rsi_momentum"
    }

    fn evaluate(&self, input: &StrategyInput<'_>, params: &Value) -> Option<SignalDraft> {
        let rsi = input.indicators.rsi_14?;
        let entry_price = input.quote.price;
        if entry_price <= 0.0 {
            return None;
        }

        let oversold = param_f64(params, "oversold", 30.0);
        let overbought = param_f64(params, "overbought", 70.0);

        let (signal_type, confidence) = if rsi <= oversold && oversold > 0.0 {
            let depth = (oversold - rsi) / oversold;
            (SignalType::Buy, BASE_CONFIDENCE + CONFIDENCE_SPAN * depth)
        } else if rsi >= overbought && overbought < 100.0 {
            let depth = (rsi - overbought) / (100.0 - overbought);
            (SignalType::Sell, BASE_CONFIDENCE + CONFIDENCE_SPAN * depth)
        } else {
            return None;
        };

        let (stop_loss, take_profit) =
            atr_levels(signal_type, entry_price, input.indicators.atr_14)?;

        Some(SignalDraft {
            signal_type,
            confidence: confidence.min(1.0),
            entry_price,
            stop_loss,
            take_profit: Some(take_profit),
            reasoning: format!(
                "RSI-14 at {rsi:.2} ({} threshold {:.0})",
                signal_type,
                if signal_type == SignalType::Buy {
                    oversold
                } else {
                    overbought
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
            symbol: "AAPL",
            quote,
            candles: &[],
            indicators,
        }
    }

    #[test]
    fn oversold_emits_buy() {
        let q = quote("AAPL", 150.0);
        let mut ind = snapshot();
        ind.rsi_14 = Some(20.0);
        ind.atr_14 = Some(2.0);

        let draft = RsiMomentum.evaluate(&input_with(&q, &ind), &json!({})).unwrap();
        assert_eq!(draft.signal_type, SignalType::Buy);
        assert!(draft.stop_loss < draft.entry_price);
        assert!(draft.take_profit.unwrap() > draft.entry_price);
        // Depth 10/30 of the span above base confidence.
        assert!((draft.confidence - (0.6 + 0.4 * (10.0 / 30.0))).abs() < 1e-9);
    }

    #[test]
    fn overbought_emits_sell() {
        let q = quote("AAPL", 150.0);
        let mut ind = snapshot();
        ind.rsi_14 = Some(85.0);
        ind.atr_14 = Some(2.0);

        let draft = RsiMomentum.evaluate(&input_with(&q, &ind), &json!({})).unwrap();
        assert_eq!(draft.signal_type, SignalType::Sell);
        assert!(draft.stop_loss > draft.entry_price);
        assert!(draft.take_profit.unwrap() < draft.entry_price);
    }

    #[test]
    fn threshold_exactly_reaches_base_confidence() {
        let q = quote("AAPL", 150.0);
        let mut ind = snapshot();
        ind.rsi_14 = Some(30.0);
        ind.atr_14 = Some(2.0);

        let draft = RsiMomentum.evaluate(&input_with(&q, &ind), &json!({})).unwrap();
        assert!((draft.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn neutral_rsi_is_silent() {
        let q = quote("AAPL", 150.0);
        let mut ind = snapshot();
        ind.rsi_14 = Some(50.0);
        ind.atr_14 = Some(2.0);
        assert!(RsiMomentum.evaluate(&input_with(&q, &ind), &json!({})).is_none());
    }

    #[test]
    fn missing_rsi_or_atr_is_silent() {
        let q = quote("AAPL", 150.0);
        let mut ind = snapshot();
        ind.atr_14 = Some(2.0);
        assert!(RsiMomentum.evaluate(&input_with(&q, &ind), &json!({})).is_none());

        let mut ind = snapshot();
        ind.rsi_14 = Some(10.0);
        assert!(RsiMomentum.evaluate(&input_with(&q, &ind), &json!({})).is_none());
    }

    #[test]
    fn params_override_thresholds() {
        let q = quote("AAPL", 150.0);
        let mut ind = snapshot();
        ind.rsi_14 = Some(40.0);
        ind.atr_14 = Some(2.0);

        // 40 is neutral by default but oversold under a 45 threshold.
        assert!(RsiMomentum.evaluate(&input_with(&q, &ind), &json!({})).is_none());
        let draft = RsiMomentum
            .evaluate(&input_with(&q, &ind), &json!({"oversold": 45.0}))
            .unwrap();
        assert_eq!(draft.signal_type, SignalType::Buy);
    }

    #[test]
    fn confidence_caps_at_one() {
        let q = quote("AAPL", 150.0);
        let mut ind = snapshot();
        ind.rsi_14 = Some(0.0);
        ind.atr_14 = Some(2.0);
        let draft = RsiMomentum.evaluate(&input_with(&q, &ind), &json!({})).unwrap();
        assert!(draft.confidence <= 1.0);
    }

    #[test]
    fn replay_is_deterministic() {
        let q = quote("AAPL", 150.0);
        let mut ind = snapshot();
        ind.rsi_14 = Some(22.5);
        ind.atr_14 = Some(1.7);
        assert_replay_deterministic(&RsiMomentum, &input_with(&q, &ind), &json!({}));
    }
}
