// =============================================================================
// Position Sizing — risk-based share count with hard caps
// =============================================================================
//
// quantity = floor(risk_per_trade / stop_distance)
//   capped at max_position_size,
//   capped by position value (account_value * max_position_value_pct),
//   capped by buying power,
//   and rejected below min_position_size.
//
// Shares are integers; every division floors.
// =============================================================================

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SizingError {
    /// Entry equals stop: the risk-per-share is undefined.
    #[error("stop distance is zero")]
    ZeroStopDistance,

    /// Caps pushed the share count below the configured minimum.
    #[error("sized {computed} shares, below the minimum of {min}")]
    InsufficientSize { computed: u32, min: u32 },
}

/// Inputs to one sizing decision.
#[derive(Debug, Clone, Copy)]
pub struct SizingInputs {
    pub entry_price: f64,
    pub stop_loss: f64,
    /// Dollars the account may lose if the stop is hit.
    pub risk_per_trade: f64,
    pub account_value: f64,
    pub buying_power: f64,
    pub max_position_value_pct: f64,
    /// Absolute dollar cap on position value, when the authorising artifact
    /// declares one.
    pub max_position_value_usd: Option<f64>,
    pub min_position_size: u32,
    pub max_position_size: u32,
}

/// A sized position ready for order construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizedPosition {
    pub quantity: u32,
    pub stop_distance: f64,
    /// Actual dollars at risk for the final quantity.
    pub risk_amount: f64,
    pub position_value: f64,
}

/// Size a position for the given inputs.
pub fn size_position(inputs: &SizingInputs) -> Result<SizedPosition, SizingError> {
    let stop_distance = (inputs.entry_price - inputs.stop_loss).abs();
    if stop_distance == 0.0 {
        return Err(SizingError::ZeroStopDistance);
    }

    let mut quantity = floor_u32(inputs.risk_per_trade / stop_distance);

    quantity = quantity.min(inputs.max_position_size);

    let value_cap = floor_u32(
        inputs.account_value * inputs.max_position_value_pct / inputs.entry_price,
    );
    quantity = quantity.min(value_cap);

    if let Some(usd_cap) = inputs.max_position_value_usd {
        quantity = quantity.min(floor_u32(usd_cap / inputs.entry_price));
    }

    let buying_power_cap = floor_u32(inputs.buying_power / inputs.entry_price);
    quantity = quantity.min(buying_power_cap);

    if quantity < inputs.min_position_size {
        return Err(SizingError::InsufficientSize {
            computed: quantity,
            min: inputs.min_position_size,
        });
    }

    Ok(SizedPosition {
        quantity,
        stop_distance,
        risk_amount: quantity as f64 * stop_distance,
        position_value: quantity as f64 * inputs.entry_price,
    })
}

fn floor_u32(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.floor().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Baseline account for the scenario tests: 100k account, 1% risk,
    /// 20% value cap, full buying power.
    fn inputs(entry_price: f64, stop_loss: f64) -> SizingInputs {
        SizingInputs {
            entry_price,
            stop_loss,
            risk_per_trade: 1000.0,
            account_value: 100_000.0,
            buying_power: 100_000.0,
            max_position_value_pct: 0.20,
            max_position_value_usd: None,
            min_position_size: 1,
            max_position_size: 1000,
        }
    }

    #[test]
    fn usd_cap_tightens_the_value_cap() {
        let mut i = inputs(150.0, 145.0);
        i.max_position_value_usd = Some(6_000.0); // floor(6000 / 150) = 40
        let sized = size_position(&i).unwrap();
        assert_eq!(sized.quantity, 40);
    }

    #[test]
    fn buy_sized_by_value_cap() {
        // Risk 1000 over a 5-point stop gives 200 raw shares; the 20k value
        // cap at 150/share tightens that to 133.
        let sized = size_position(&inputs(150.0, 145.0)).unwrap();
        assert_eq!(sized.quantity, 133);
        assert!((sized.stop_distance - 5.0).abs() < 1e-12);
        assert!((sized.position_value - 19_950.0).abs() < 1e-9);
        assert!((sized.risk_amount - 665.0).abs() < 1e-9);
    }

    #[test]
    fn sell_sized_by_risk() {
        // Short at 238 with a 12-point stop: raw 83 shares, value cap 84,
        // buying power 420; risk is the binding constraint.
        let sized = size_position(&inputs(238.0, 250.0)).unwrap();
        assert_eq!(sized.quantity, 83);
        assert!((sized.stop_distance - 12.0).abs() < 1e-12);
    }

    #[test]
    fn zero_stop_distance_rejected() {
        assert_eq!(
            size_position(&inputs(300.0, 300.0)),
            Err(SizingError::ZeroStopDistance)
        );
    }

    #[test]
    fn buying_power_caps_the_size() {
        let mut i = inputs(150.0, 145.0);
        i.buying_power = 1500.0; // room for 10 shares only
        let sized = size_position(&i).unwrap();
        assert_eq!(sized.quantity, 10);
    }

    #[test]
    fn max_position_size_caps_the_size() {
        let mut i = inputs(10.0, 9.0); // raw = 1000 risk / 1 = 1000 shares
        i.max_position_size = 250;
        let sized = size_position(&i).unwrap();
        assert_eq!(sized.quantity, 250);
    }

    #[test]
    fn exactly_min_size_is_accepted() {
        let mut i = inputs(150.0, 145.0);
        i.min_position_size = 133;
        assert_eq!(size_position(&i).unwrap().quantity, 133);
    }

    #[test]
    fn one_below_min_size_is_rejected() {
        let mut i = inputs(150.0, 145.0);
        i.min_position_size = 134;
        assert_eq!(
            size_position(&i),
            Err(SizingError::InsufficientSize {
                computed: 133,
                min: 134
            })
        );
    }

    #[test]
    fn tiny_risk_budget_is_rejected() {
        let mut i = inputs(150.0, 145.0);
        i.risk_per_trade = 2.0; // floor(2 / 5) = 0 shares
        assert_eq!(
            size_position(&i),
            Err(SizingError::InsufficientSize { computed: 0, min: 1 })
        );
    }

    #[test]
    fn non_finite_caps_collapse_to_zero() {
        let mut i = inputs(150.0, 145.0);
        i.buying_power = f64::NAN;
        assert!(matches!(
            size_position(&i),
            Err(SizingError::InsufficientSize { computed: 0, .. })
        ));
    }
}
