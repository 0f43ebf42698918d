// =============================================================================
// Execution Engine — approved signals to broker orders, with provenance
// =============================================================================
//
// `execute` runs a strict pipeline, stopping on the first error:
//
//   1. fetch the signal joined with the artifact's current payload hash
//   2. validate the signal structure
//   3. fetch the account snapshot from the broker
//   4. evaluate the three risk gates
//   5. size the position
//   6. build the order request
//   7. submit to the broker, then persist the trade + approval order id +
//      signal status flip in one transaction (nothing is written if the
//      broker rejects the submission)
//   8. spawn the bounded order status poller
//
// The whole pipeline carries a 30 s deadline checked between steps: a step
// in flight finishes, but no further step starts past the deadline. The
// artifact hash captured in step 1 is what the trade row carries; it is the
// audit link from any trade back to the exact parameterisation that
// authorised it.
// =============================================================================

pub mod poller;
pub mod sizing;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::broker::{Broker, BrokerError, OrderRequest};
use crate::clock;
use crate::db::Database;
use crate::risk::{GateLimits, RiskTracker};
use crate::runtime_config::TraderConfig;
use crate::signal_store::{Signal, SignalStore, SignalStoreError};
use crate::trade_store::{Trade, TradeRisk, TradeStore};
use crate::types::{OrderType, SignalStatus, SignalType, TradeStatus};

use sizing::{size_position, SizingError, SizingInputs};

/// Wall-clock bound on one execution pipeline.
pub const PIPELINE_DEADLINE: std::time::Duration = std::time::Duration::from_secs(30);

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("execution is disabled")]
    ExecutionDisabled,

    #[error("signal not found: {0}")]
    NotFound(String),

    #[error("signal {0} is not approved")]
    NotApproved(String),

    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("risk gate rejected: {0}")]
    RiskGateRejected(String),

    #[error("sized {computed} shares, below the minimum of {min}")]
    InsufficientSize { computed: u32, min: u32 },

    #[error("execution pipeline deadline exceeded")]
    DeadlineExceeded,

    #[error("store error: {0}")]
    Store(String),
}

impl From<SignalStoreError> for ExecError {
    fn from(e: SignalStoreError) -> Self {
        match e {
            SignalStoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ExecError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<BrokerError> for ExecError {
    fn from(e: BrokerError) -> Self {
        Self::BrokerUnavailable(e.to_string())
    }
}

/// Successful pipeline outcome.
#[derive(Debug, Clone, Serialize)]
pub struct TradeResult {
    pub trade_id: String,
    pub signal_id: String,
    pub order_id: String,
    pub symbol: String,
    pub direction: SignalType,
    pub quantity: u32,
    pub status: TradeStatus,
}

// =============================================================================
// Engine
// =============================================================================

pub struct ExecutionEngine {
    db: Database,
    signals: SignalStore,
    trades: TradeStore,
    broker: Arc<dyn Broker>,
    risk: Arc<RiskTracker>,
    config: Arc<RwLock<TraderConfig>>,
}

impl ExecutionEngine {
    pub fn new(
        db: Database,
        broker: Arc<dyn Broker>,
        risk: Arc<RiskTracker>,
        config: Arc<RwLock<TraderConfig>>,
    ) -> Self {
        Self {
            signals: SignalStore::new(db.clone()),
            trades: TradeStore::new(db.clone()),
            db,
            broker,
            risk,
            config,
        }
    }

    pub fn trades(&self) -> &TradeStore {
        &self.trades
    }

    /// Execute an approved signal on behalf of `approver`.
    pub async fn execute(
        &self,
        signal_id: &str,
        approver: &str,
    ) -> Result<TradeResult, ExecError> {
        let cfg = self.config.read().clone();
        if !cfg.execution_enabled {
            warn!(signal_id, "execution refused: engine is disabled");
            return Err(ExecError::ExecutionDisabled);
        }

        let deadline = tokio::time::Instant::now() + PIPELINE_DEADLINE;

        info!(signal_id, approver, "execution pipeline started");

        // -- 1. Fetch signal + current artifact provenance -------------------
        let provenance = self.signals.get_for_execution(signal_id)?;
        let signal = provenance.signal;
        let artifact_hash = provenance.artifact_hash;
        let artifact_limits = ArtifactRiskLimits::from_profile(&provenance.risk_profile);
        if signal.status != SignalStatus::Approved {
            return Err(ExecError::NotApproved(signal_id.to_string()));
        }
        // The approval row must exist and be positive; its absence means the
        // status flip did not come through the sanctioned path.
        let approval = self
            .signals
            .get_approval(signal_id)
            .map_err(|_| ExecError::NotApproved(signal_id.to_string()))?;
        if !approval.approved {
            return Err(ExecError::NotApproved(signal_id.to_string()));
        }

        // -- 2. Structural validation ---------------------------------------
        validate_signal(&signal)?;
        check_deadline(deadline)?;

        // -- 3. Account snapshot --------------------------------------------
        let account = self.broker.account().await?;
        check_deadline(deadline)?;

        // -- 4. Risk gates ---------------------------------------------------
        let open_positions = self.broker.positions().await?.len();
        let today = clock::now().format("%Y-%m-%d").to_string();
        let gates = self.risk.evaluate_gates(
            &today,
            &account,
            open_positions,
            &GateLimits {
                max_open_positions: cfg.max_open_positions,
                // The artifact's own daily-loss cap tightens the configured
                // one when present.
                max_daily_loss: artifact_limits
                    .max_daily_loss
                    .map_or(cfg.max_daily_loss, |v| v.min(cfg.max_daily_loss)),
                max_risk_per_trade: cfg.max_risk_per_trade,
            },
        );
        if let Some(reason) = gates.rejection_reason() {
            return Err(ExecError::RiskGateRejected(reason));
        }
        check_deadline(deadline)?;

        // -- 5. Position sizing ---------------------------------------------
        // Validation guarantees stop_loss is present for BUY/SELL signals.
        let stop_loss = signal.stop_loss.unwrap_or(signal.entry_price);
        let sized = size_position(&SizingInputs {
            entry_price: signal.entry_price,
            stop_loss,
            risk_per_trade: gates.risk_per_trade,
            account_value: account.net_liquidation,
            buying_power: account.buying_power,
            max_position_value_pct: artifact_limits
                .max_position_pct
                .map_or(cfg.max_position_value_pct, |v| {
                    v.min(cfg.max_position_value_pct)
                }),
            max_position_value_usd: artifact_limits.max_position_size_usd,
            min_position_size: cfg.min_position_size,
            max_position_size: cfg.max_position_size,
        })
        .map_err(|e| match e {
            SizingError::ZeroStopDistance => {
                ExecError::InvalidSignal("stop distance is zero".to_string())
            }
            SizingError::InsufficientSize { computed, min } => {
                ExecError::InsufficientSize { computed, min }
            }
        })?;
        check_deadline(deadline)?;

        // -- 6. Order request ------------------------------------------------
        if !artifact_limits.allows_order_type(cfg.default_order_type) {
            return Err(ExecError::InvalidSignal(format!(
                "order type {} is not allowed by the authorising artifact",
                cfg.default_order_type
            )));
        }
        let order = build_order(&signal, sized.quantity, cfg.default_order_type);

        // -- 7. Submit, then persist atomically ------------------------------
        let ack = self.broker.place_order(&order).await?;
        check_deadline(deadline)?;

        let trade = Trade {
            id: format!("trd-{}", Uuid::new_v4()),
            signal_id: signal.id.clone(),
            symbol: signal.symbol.clone(),
            direction: signal.signal_type,
            quantity: sized.quantity,
            entry_price: signal.entry_price,
            stop_loss,
            take_profit: signal.take_profit,
            strategy_name: signal.strategy_name.clone(),
            status: TradeStatus::Submitted,
            filled_qty: 0.0,
            avg_fill_price: None,
            risk: TradeRisk {
                amount: sized.risk_amount,
                percent: if account.net_liquidation > 0.0 {
                    sized.risk_amount / account.net_liquidation
                } else {
                    0.0
                },
                position_value: sized.position_value,
                quantity: sized.quantity,
                order_id: Some(ack.order_id.clone()),
                status: TradeStatus::Submitted.as_str().to_string(),
            },
            artifact_id: signal.artifact_id.clone(),
            artifact_hash,
            created_at: clock::now(),
        };

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            TradeStore::insert_tx(&tx, &trade)?;
            SignalStore::set_approval_order_id_tx(&tx, &signal.id, &ack.order_id)?;
            SignalStore::mark_executed_tx(&tx, &signal.id)?;
            tx.commit()
        })?;

        info!(
            trade_id = %trade.id,
            signal_id = %signal.id,
            order_id = %ack.order_id,
            symbol = %trade.symbol,
            direction = %trade.direction,
            quantity = trade.quantity,
            artifact_id = %trade.artifact_id,
            "order submitted and trade persisted"
        );

        // -- 8. Background status poller -------------------------------------
        tokio::spawn(poller::poll_order_status(
            self.broker.clone(),
            self.trades.clone(),
            trade.id.clone(),
            ack.order_id.clone(),
        ));

        Ok(TradeResult {
            trade_id: trade.id,
            signal_id: signal.id.clone(),
            order_id: ack.order_id,
            symbol: trade.symbol,
            direction: trade.direction,
            quantity: trade.quantity,
            status: TradeStatus::Submitted,
        })
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine").finish_non_exhaustive()
    }
}

// =============================================================================
// Pipeline pieces
// =============================================================================

fn check_deadline(deadline: tokio::time::Instant) -> Result<(), ExecError> {
    if tokio::time::Instant::now() >= deadline {
        Err(ExecError::DeadlineExceeded)
    } else {
        Ok(())
    }
}

/// Risk limits declared by the authorising artifact. The profile is an
/// opaque JSON object; only these fixed keys are read, each with an
/// explicit absent-means-unconstrained default.
#[derive(Debug, Clone, Default)]
struct ArtifactRiskLimits {
    max_position_pct: Option<f64>,
    max_daily_loss: Option<f64>,
    allowed_order_types: Option<Vec<OrderType>>,
    max_position_size_usd: Option<f64>,
}

impl ArtifactRiskLimits {
    fn from_profile(profile: &serde_json::Value) -> Self {
        let allowed_order_types = profile.get("allowed_order_types").and_then(|v| {
            let list = v.as_array()?;
            Some(
                list.iter()
                    .filter_map(|t| t.as_str())
                    .filter_map(|t| t.parse().ok())
                    .collect::<Vec<OrderType>>(),
            )
        });

        Self {
            max_position_pct: profile.get("max_position_pct").and_then(|v| v.as_f64()),
            max_daily_loss: profile.get("max_daily_loss").and_then(|v| v.as_f64()),
            allowed_order_types,
            max_position_size_usd: profile
                .get("max_position_size_usd")
                .and_then(|v| v.as_f64()),
        }
    }

    /// An absent list allows everything.
    fn allows_order_type(&self, order_type: OrderType) -> bool {
        match &self.allowed_order_types {
            Some(allowed) => allowed.contains(&order_type),
            None => true,
        }
    }
}

/// Structural validation of an executable signal.
pub fn validate_signal(signal: &Signal) -> Result<(), ExecError> {
    let fail = |msg: String| Err(ExecError::InvalidSignal(msg));

    if signal.symbol.trim().is_empty() {
        return fail("symbol is empty".to_string());
    }
    if signal.signal_type == SignalType::Hold {
        return fail("HOLD signals are not executable".to_string());
    }
    if signal.entry_price <= 0.0 {
        return fail(format!("entry price {} is not positive", signal.entry_price));
    }

    let stop_loss = match signal.stop_loss {
        Some(s) => s,
        None => return fail("stop loss is missing".to_string()),
    };

    match signal.signal_type {
        SignalType::Buy => {
            if stop_loss >= signal.entry_price {
                return fail(format!(
                    "BUY stop loss {stop_loss} must be below entry {}",
                    signal.entry_price
                ));
            }
            if let Some(tp) = signal.take_profit {
                if tp <= signal.entry_price {
                    return fail(format!(
                        "BUY take profit {tp} must be above entry {}",
                        signal.entry_price
                    ));
                }
            }
        }
        SignalType::Sell => {
            if stop_loss <= signal.entry_price {
                return fail(format!(
                    "SELL stop loss {stop_loss} must be above entry {}",
                    signal.entry_price
                ));
            }
            if let Some(tp) = signal.take_profit {
                if tp >= signal.entry_price {
                    return fail(format!(
                        "SELL take profit {tp} must be below entry {}",
                        signal.entry_price
                    ));
                }
            }
        }
        SignalType::Hold => unreachable!("rejected above"),
    }

    Ok(())
}

/// Build the broker order for a validated, sized signal.
fn build_order(signal: &Signal, quantity: u32, order_type: OrderType) -> OrderRequest {
    OrderRequest {
        symbol: signal.symbol.clone(),
        side: signal.signal_type,
        quantity,
        order_type,
        limit_price: (order_type == OrderType::Lmt).then_some(signal.entry_price),
        stop_price: (order_type == OrderType::Stp).then(|| signal.stop_loss.unwrap_or_default()),
    }
}
