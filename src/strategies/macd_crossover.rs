// =============================================================================
// MACD Crossover — trade histogram sign flips
// =============================================================================
//
// A bullish cross (histogram moving from <= 0 to > 0) emits BUY; a bearish
// cross emits SELL. Confidence grows with the histogram magnitude relative
// to ATR, so a decisive cross in a volatile market scores higher than a
// grazing one.
// =============================================================================

use serde_json::Value;

use crate::types::SignalType;

use super::{atr_levels, SignalDraft, Strategy, StrategyInput};

const BASE_CONFIDENCE: f64 = 0.6;
const CONFIDENCE_SPAN: f64 = 0.35;

pub struct MacdCrossover;

impl Strategy for MacdCrossover {
    fn name(&self) -> &'static str {
        "macd_crossover"
    }

    fn evaluate(&self, input: &StrategyInput<'_>, _params: &Value) -> Option<SignalDraft> {
        let latest = input.indicators.macd.as_ref()?;
        let prev = input.indicators.prev_macd.as_ref()?;
        let atr = input.indicators.atr_14?;
        let entry_price = input.quote.price;
        if entry_price <= 0.0 || atr <= 0.0 {
            return None;
        }

        let signal_type = if prev.histogram <= 0.0 && latest.histogram > 0.0 {
            SignalType::Buy
        } else if prev.histogram >= 0.0 && latest.histogram < 0.0 {
            SignalType::Sell
        } else {
            return None;
        };

        let strength = (latest.histogram.abs() / atr).min(1.0);
        let confidence = BASE_CONFIDENCE + CONFIDENCE_SPAN * strength;

        let (stop_loss, take_profit) = atr_levels(signal_type, entry_price, Some(atr))?;

        Some(SignalDraft {
            signal_type,
            confidence,
            entry_price,
            stop_loss,
            take_profit: Some(take_profit),
            reasoning: format!(
                "MACD histogram crossed {} ({:.4} -> {:.4})",
                if signal_type == SignalType::Buy {
                    "above zero"
                } else {
                    "below zero"
                },
                prev.histogram,
                latest.histogram
            ),
        })
    }
}
