// =============================================================================
// Signal Store — persistence for signals and trade approvals
// =============================================================================
//
// The generator inserts pending signals and sweeps expired ones; external
// approvers flip status to approved/rejected (recording a trade approval
// row); the execution engine marks a signal executed inside its own trade
// transaction, via the `_tx` helpers that compose with a caller-held
// connection.
// =============================================================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::clock;
use crate::db::Database;
use crate::types::{SignalStatus, SignalType};

#[derive(Debug, Error)]
pub enum SignalStoreError {
    #[error("signal not found: {0}")]
    NotFound(String),

    #[error("signal {0} is not pending")]
    NotPending(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A persisted strategy signal. Immutable except for `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub symbol: String,
    pub strategy_name: String,
    pub signal_type: SignalType,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reasoning: String,
    pub indicators: serde_json::Value,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SignalStatus,
    pub artifact_id: String,
}

/// Approval decision for one signal, written by an external approver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeApproval {
    pub signal_id: String,
    pub approved: bool,
    pub approver: String,
    pub approved_at: DateTime<Utc>,
    pub order_id: Option<String>,
}

/// A signal joined with the current provenance of its artifact.
#[derive(Debug, Clone)]
pub struct SignalProvenance {
    pub signal: Signal,
    pub artifact_hash: String,
    pub risk_profile: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SignalStore {
    db: Database,
}

impl SignalStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    pub fn insert(&self, signal: &Signal) -> Result<(), SignalStoreError> {
        let indicators_json = serde_json::to_string(&signal.indicators)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO strategy_signals
                 (id, symbol, strategy_name, signal_type, confidence, entry_price,
                  stop_loss, take_profit, reasoning, indicators, generated_at,
                  expires_at, status, artifact_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    signal.id,
                    signal.symbol,
                    signal.strategy_name,
                    signal.signal_type.as_str(),
                    signal.confidence,
                    signal.entry_price,
                    signal.stop_loss,
                    signal.take_profit,
                    signal.reasoning,
                    indicators_json,
                    clock::fmt_ts(signal.generated_at),
                    clock::fmt_ts(signal.expires_at),
                    signal.status.as_str(),
                    signal.artifact_id,
                ],
            )?;
            Ok(())
        })?;
        debug!(
            signal_id = %signal.id,
            symbol = %signal.symbol,
            strategy = %signal.strategy_name,
            signal_type = %signal.signal_type,
            "signal persisted"
        );
        Ok(())
    }

    /// Record an approval decision and flip the signal's status in one
    /// transaction. Only pending signals can be decided.
    pub fn decide(
        &self,
        signal_id: &str,
        approver: &str,
        approved: bool,
    ) -> Result<TradeApproval, SignalStoreError> {
        let approved_at = clock::now();

        let outcome: Result<Result<(), SignalStoreError>, rusqlite::Error> =
            self.db.with_conn(|conn| {
                let tx = conn.transaction()?;

                let status: Option<String> = tx
                    .query_row(
                        "SELECT status FROM strategy_signals WHERE id = ?1",
                        params![signal_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                match status.as_deref() {
                    None => return Ok(Err(SignalStoreError::NotFound(signal_id.to_string()))),
                    Some("pending") => {}
                    Some(_) => {
                        return Ok(Err(SignalStoreError::NotPending(signal_id.to_string())))
                    }
                }

                tx.execute(
                    "INSERT INTO trade_approvals (signal_id, approved, approver, approved_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        signal_id,
                        approved as i32,
                        approver,
                        clock::fmt_ts(approved_at)
                    ],
                )?;

                let new_status = if approved {
                    SignalStatus::Approved
                } else {
                    SignalStatus::Rejected
                };
                tx.execute(
                    "UPDATE strategy_signals SET status = ?1 WHERE id = ?2",
                    params![new_status.as_str(), signal_id],
                )?;

                tx.commit()?;
                Ok(Ok(()))
            });

        match outcome {
            Ok(Ok(())) => {
                info!(signal_id, approver, approved, "signal decision recorded");
                Ok(TradeApproval {
                    signal_id: signal_id.to_string(),
                    approved,
                    approver: approver.to_string(),
                    approved_at,
                    order_id: None,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(e) => Err(e.into()),
        }
    }

    /// Mark every pending signal past its expiry as expired. Idempotent:
    /// re-running against the same clock instant changes nothing further.
    pub fn expire_pending(&self, now: DateTime<Utc>) -> Result<usize, SignalStoreError> {
        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE strategy_signals SET status = 'expired'
                 WHERE status = 'pending' AND expires_at < ?1",
                params![clock::fmt_ts(now)],
            )
        })?;
        if changed > 0 {
            info!(count = changed, "pending signals expired");
        }
        Ok(changed)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Result<Signal, SignalStoreError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    &format!("{SELECT_SIGNAL} WHERE id = ?1"),
                    params![id],
                    signal_from_row,
                )
                .optional()
            })?
            .ok_or_else(|| SignalStoreError::NotFound(id.to_string()))
    }

    /// Signal plus the referenced artifact's **current** payload hash and
    /// risk profile, read in one join. The execution engine snapshots the
    /// hash onto the trade and honours the profile's limits.
    pub fn get_for_execution(&self, id: &str) -> Result<SignalProvenance, SignalStoreError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT s.id, s.symbol, s.strategy_name, s.signal_type, s.confidence,
                            s.entry_price, s.stop_loss, s.take_profit, s.reasoning,
                            s.indicators, s.generated_at, s.expires_at, s.status,
                            s.artifact_id, a.payload_hash, a.risk_profile
                     FROM strategy_signals s
                     JOIN strategy_artifacts a ON a.id = s.artifact_id
                     WHERE s.id = ?1",
                    params![id],
                    |row| {
                        let signal = signal_from_row(row)?;
                        let artifact_hash: String = row.get(14)?;
                        let risk_profile: String = row.get(15)?;
                        let risk_profile =
                            serde_json::from_str(&risk_profile).map_err(|e| {
                                rusqlite::Error::FromSqlConversionFailure(
                                    15,
                                    rusqlite::types::Type::Text,
                                    Box::new(e),
                                )
                            })?;
                        Ok(SignalProvenance {
                            signal,
                            artifact_hash,
                            risk_profile,
                        })
                    },
                )
                .optional()
            })?
            .ok_or_else(|| SignalStoreError::NotFound(id.to_string()))
    }

    /// Bounded recent history for one symbol, newest first.
    pub fn recent(&self, symbol: &str, limit: usize) -> Result<Vec<Signal>, SignalStoreError> {
        let signals = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_SIGNAL} WHERE symbol = ?1 ORDER BY generated_at DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![symbol, limit as i64], signal_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(signals)
    }

    pub fn get_approval(&self, signal_id: &str) -> Result<TradeApproval, SignalStoreError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT signal_id, approved, approver, approved_at, order_id
                     FROM trade_approvals WHERE signal_id = ?1",
                    params![signal_id],
                    |row| {
                        let approved_at: String = row.get(3)?;
                        Ok(TradeApproval {
                            signal_id: row.get(0)?,
                            approved: row.get::<_, i32>(1)? != 0,
                            approver: row.get(2)?,
                            approved_at: clock::parse_ts(&approved_at).unwrap_or_default(),
                            order_id: row.get(4)?,
                        })
                    },
                )
                .optional()
            })?
            .ok_or_else(|| SignalStoreError::NotFound(signal_id.to_string()))
    }

    // -------------------------------------------------------------------------
    // Transaction helpers for the execution engine
    // -------------------------------------------------------------------------

    /// Mark a signal executed on a caller-held connection.
    pub fn mark_executed_tx(conn: &Connection, signal_id: &str) -> Result<(), rusqlite::Error> {
        conn.execute(
            "UPDATE strategy_signals SET status = 'executed' WHERE id = ?1",
            params![signal_id],
        )?;
        Ok(())
    }

    /// Attach the broker order id to the approval row on a caller-held
    /// connection.
    pub fn set_approval_order_id_tx(
        conn: &Connection,
        signal_id: &str,
        order_id: &str,
    ) -> Result<(), rusqlite::Error> {
        conn.execute(
            "UPDATE trade_approvals SET order_id = ?1 WHERE signal_id = ?2",
            params![order_id, signal_id],
        )?;
        Ok(())
    }
}

// =============================================================================
// Row mapping
// =============================================================================

const SELECT_SIGNAL: &str = "SELECT id, symbol, strategy_name, signal_type, confidence, \
     entry_price, stop_loss, take_profit, reasoning, indicators, generated_at, expires_at, \
     status, artifact_id FROM strategy_signals";

fn signal_from_row(row: &rusqlite::Row<'_>) -> Result<Signal, rusqlite::Error> {
    let signal_type: String = row.get(3)?;
    let indicators: String = row.get(9)?;
    let generated_at: String = row.get(10)?;
    let expires_at: String = row.get(11)?;
    let status: String = row.get(12)?;

    let bad_column = |idx: usize, msg: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
    };

    Ok(Signal {
        id: row.get(0)?,
        symbol: row.get(1)?,
        strategy_name: row.get(2)?,
        signal_type: signal_type
            .parse()
            .map_err(|e: String| bad_column(3, e))?,
        confidence: row.get(4)?,
        entry_price: row.get(5)?,
        stop_loss: row.get(6)?,
        take_profit: row.get(7)?,
        reasoning: row.get(8)?,
        indicators: serde_json::from_str(&indicators)
            .map_err(|e| bad_column(9, e.to_string()))?,
        generated_at: clock::parse_ts(&generated_at).unwrap_or_default(),
        expires_at: clock::parse_ts(&expires_at).unwrap_or_default(),
        status: status.parse().map_err(|e: String| bad_column(12, e))?,
        artifact_id: row.get(13)?,
    })
}
