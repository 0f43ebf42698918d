// =============================================================================
// Risk Gates — pre-trade checks protecting capital
// =============================================================================
//
// Three predicates guard every execution, and all three are evaluated on
// every attempt:
//   1. Open positions    — count of broker positions below the cap.
//   2. Daily loss        — equity drop since the day's baseline within the
//                          absolute USD cap (covers realized + unrealized).
//   3. Risk budget       — a positive per-trade risk allocation exists
//                          (account value times the per-trade risk fraction).
//
// The tracker records the first net-liquidation observation of each UTC day
// as that day's baseline and resets automatically when the date rolls over.
// =============================================================================

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::broker::AccountSnapshot;

// ---------------------------------------------------------------------------
// Gate evaluation
// ---------------------------------------------------------------------------

/// Limits supplied by configuration at evaluation time.
#[derive(Debug, Clone, Copy)]
pub struct GateLimits {
    pub max_open_positions: usize,
    pub max_daily_loss: f64,
    pub max_risk_per_trade: f64,
}

/// Outcome of one full gate evaluation. Every predicate is present whether
/// it passed or not.
#[derive(Debug, Clone, Serialize)]
pub struct GateReport {
    pub open_positions: usize,
    pub open_positions_ok: bool,
    pub daily_loss: f64,
    pub daily_loss_ok: bool,
    pub risk_per_trade: f64,
    pub risk_budget_ok: bool,
}

impl GateReport {
    pub fn all_passed(&self) -> bool {
        self.open_positions_ok && self.daily_loss_ok && self.risk_budget_ok
    }

    /// Human-readable reason for the first failed predicate.
    pub fn rejection_reason(&self) -> Option<String> {
        if !self.open_positions_ok {
            return Some(format!(
                "open position cap reached ({} positions)",
                self.open_positions
            ));
        }
        if !self.daily_loss_ok {
            return Some(format!(
                "daily loss limit reached (${:.2} lost today)",
                self.daily_loss
            ));
        }
        if !self.risk_budget_ok {
            return Some("no positive risk budget for this account".to_string());
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

struct Inner {
    current_date: String,
    baseline_equity: Option<f64>,
}

/// Tracks the day's equity baseline for the daily-loss gate.
pub struct RiskTracker {
    state: RwLock<Inner>,
}

impl Default for RiskTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskTracker {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Inner {
                current_date: String::new(),
                baseline_equity: None,
            }),
        }
    }

    /// Evaluate all three gates against the account snapshot.
    ///
    /// `today` is the UTC calendar date from the deterministic clock; a date
    /// change resets the equity baseline before the daily-loss predicate
    /// runs.
    pub fn evaluate_gates(
        &self,
        today: &str,
        account: &AccountSnapshot,
        open_positions: usize,
        limits: &GateLimits,
    ) -> GateReport {
        let daily_loss = self.daily_loss(today, account.net_liquidation);
        let risk_per_trade = account.net_liquidation * limits.max_risk_per_trade;

        let report = GateReport {
            open_positions,
            open_positions_ok: open_positions < limits.max_open_positions,
            daily_loss,
            daily_loss_ok: daily_loss <= limits.max_daily_loss,
            risk_per_trade,
            risk_budget_ok: risk_per_trade > 0.0,
        };

        if report.all_passed() {
            debug!(
                open_positions,
                daily_loss, risk_per_trade, "risk gates passed"
            );
        } else {
            warn!(
                open_positions,
                daily_loss,
                risk_per_trade,
                reason = report.rejection_reason().as_deref().unwrap_or("unknown"),
                "risk gate rejected execution"
            );
        }

        report
    }

    /// Equity lost since the day's baseline, never negative. The first
    /// observation of a new date becomes that day's baseline.
    fn daily_loss(&self, today: &str, net_liquidation: f64) -> f64 {
        {
            let s = self.state.read();
            if s.current_date == today {
                if let Some(baseline) = s.baseline_equity {
                    return (baseline - net_liquidation).max(0.0);
                }
            }
        }

        // Date rolled (or first ever observation): take the write lock and
        // re-check, another task may have reset already.
        let mut s = self.state.write();
        if s.current_date != today || s.baseline_equity.is_none() {
            info!(
                old_date = %s.current_date,
                new_date = %today,
                baseline = net_liquidation,
                "daily risk baseline reset"
            );
            s.current_date = today.to_string();
            s.baseline_equity = Some(net_liquidation);
        }
        let baseline = s.baseline_equity.unwrap_or(net_liquidation);
        (baseline - net_liquidation).max(0.0)
    }
}

impl std::fmt::Debug for RiskTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.state.read();
        f.debug_struct("RiskTracker")
            .field("current_date", &s.current_date)
            .field("baseline_equity", &s.baseline_equity)
            .finish()
    }
}
