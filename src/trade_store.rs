// =============================================================================
// Trade Store — persistence for executed trades
// =============================================================================
//
// Trades are written once, inside the execution engine's submission
// transaction, stamped with the artifact provenance captured at that moment.
// Afterwards only the fill tracking columns (`status`, `filled_qty`,
// `avg_fill_price`) mutate, driven by the order status poller.
// =============================================================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::clock;
use crate::db::Database;
use crate::types::{SignalType, TradeStatus};

#[derive(Debug, Error)]
pub enum TradeStoreError {
    #[error("trade not found: {0}")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Risk accounting snapshot embedded in the trade row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRisk {
    /// Dollars at risk between entry and stop for the sized quantity.
    pub amount: f64,
    /// `amount` as a fraction of account value at submission.
    pub percent: f64,
    pub position_value: f64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub status: String,
}

/// A persisted order submission, linked to its signal and the artifact that
/// authorised it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub signal_id: String,
    pub symbol: String,
    pub direction: SignalType,
    pub quantity: u32,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub strategy_name: String,
    pub status: TradeStatus,
    pub filled_qty: f64,
    pub avg_fill_price: Option<f64>,
    pub risk: TradeRisk,
    pub artifact_id: String,
    pub artifact_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TradeStore {
    db: Database,
}

impl TradeStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a trade on a caller-held connection, composing with the
    /// execution engine's submission transaction.
    pub fn insert_tx(conn: &Connection, trade: &Trade) -> Result<(), rusqlite::Error> {
        let risk_json = serde_json::to_string(&trade.risk).map_err(|e| {
            rusqlite::Error::ToSqlConversionFailure(Box::new(e))
        })?;
        conn.execute(
            "INSERT INTO trades
             (id, signal_id, symbol, direction, quantity, entry_price, stop_loss,
              take_profit, strategy_name, status, filled_qty, avg_fill_price, risk,
              artifact_id, artifact_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                trade.id,
                trade.signal_id,
                trade.symbol,
                trade.direction.as_str(),
                trade.quantity,
                trade.entry_price,
                trade.stop_loss,
                trade.take_profit,
                trade.strategy_name,
                trade.status.as_str(),
                trade.filled_qty,
                trade.avg_fill_price,
                risk_json,
                trade.artifact_id,
                trade.artifact_hash,
                clock::fmt_ts(trade.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Trade, TradeStoreError> {
        self.db
            .with_conn(|conn| {
                conn.query_row(
                    &format!("{SELECT_TRADE} WHERE id = ?1"),
                    params![id],
                    trade_from_row,
                )
                .optional()
            })?
            .ok_or_else(|| TradeStoreError::NotFound(id.to_string()))
    }

    pub fn list_recent(&self, limit: usize) -> Result<Vec<Trade>, TradeStoreError> {
        let trades = self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT_TRADE} ORDER BY created_at DESC LIMIT ?1"))?;
            let rows = stmt.query_map(params![limit as i64], trade_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(trades)
    }

    /// Update the fill tracking columns (and the mirrored risk status).
    pub fn update_fill(
        &self,
        id: &str,
        status: TradeStatus,
        filled_qty: f64,
        avg_fill_price: Option<f64>,
    ) -> Result<(), TradeStoreError> {
        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE trades SET
                     status = ?1,
                     filled_qty = ?2,
                     avg_fill_price = ?3,
                     risk = json_set(risk, '$.status', ?1)
                 WHERE id = ?4",
                params![status.as_str(), filled_qty, avg_fill_price, id],
            )
        })?;
        if changed == 0 {
            return Err(TradeStoreError::NotFound(id.to_string()));
        }
        debug!(trade_id = %id, status = %status, filled_qty, "trade fill state updated");
        Ok(())
    }
}

// =============================================================================
// Row mapping
// =============================================================================

const SELECT_TRADE: &str = "SELECT id, signal_id, symbol, direction, quantity, entry_price, \
     stop_loss, take_profit, strategy_name, status, filled_qty, avg_fill_price, risk, \
     artifact_id, artifact_hash, created_at FROM trades";

fn trade_from_row(row: &rusqlite::Row<'_>) -> Result<Trade, rusqlite::Error> {
    let direction: String = row.get(3)?;
    let status: String = row.get(9)?;
    let risk: String = row.get(12)?;
    let created_at: String = row.get(15)?;

    let bad_column = |idx: usize, msg: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
    };

    Ok(Trade {
        id: row.get(0)?,
        signal_id: row.get(1)?,
        symbol: row.get(2)?,
        direction: direction.parse().map_err(|e: String| bad_column(3, e))?,
        quantity: row.get(4)?,
        entry_price: row.get(5)?,
        stop_loss: row.get(6)?,
        take_profit: row.get(7)?,
        strategy_name: row.get(8)?,
        status: status.parse().map_err(|e: String| bad_column(9, e))?,
        filled_qty: row.get(10)?,
        avg_fill_price: row.get(11)?,
        risk: serde_json::from_str(&risk).map_err(|e| bad_column(12, e.to_string()))?,
        artifact_id: row.get(13)?,
        artifact_hash: row.get(14)?,
        created_at: clock::parse_ts(&created_at).unwrap_or_default(),
    })
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixture() -> (Database, TradeStore) {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO strategy_artifacts
                 (id, schema_version, strategy_name, strategy_version, code_ref,
                  params, data_window, validation, risk_profile, created_by,
                  created_at, payload_hash, state)
                 VALUES ('art-1', '1', 'rsi_momentum', '1', 'ref', '{}', '{}', '{}',
                         '{}', 'research', '2024-06-01T00:00:00.000000Z',
                         'sha256:feed', 'APPROVED');
                 INSERT INTO strategy_signals
                 (id, symbol, strategy_name, signal_type, confidence, entry_price,
                  reasoning, indicators, generated_at, expires_at, status, artifact_id)
                 VALUES ('sig-1', 'AAPL', 'rsi_momentum', 'BUY', 0.7, 150.0, 'r', '{}',
                         '2024-06-01T12:00:00.000000Z', '2024-06-02T12:00:00.000000Z',
                         'approved', 'art-1');",
            )
        })
        .unwrap();
        let store = TradeStore::new(db.clone());
        (db, store)
    }

    fn trade(id: &str) -> Trade {
        Trade {
            id: id.to_string(),
            signal_id: "sig-1".to_string(),
            symbol: "AAPL".to_string(),
            direction: SignalType::Buy,
            quantity: 133,
            entry_price: 150.0,
            stop_loss: 145.0,
            take_profit: Some(160.0),
            strategy_name: "rsi_momentum".to_string(),
            status: TradeStatus::Submitted,
            filled_qty: 0.0,
            avg_fill_price: None,
            risk: TradeRisk {
                amount: 665.0,
                percent: 0.00665,
                position_value: 19950.0,
                quantity: 133,
                order_id: Some("ord-1".to_string()),
                status: "submitted".to_string(),
            },
            artifact_id: "art-1".to_string(),
            artifact_hash: "sha256:feed".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 5, 0).unwrap(),
        }
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let (db, store) = fixture();
        db.with_conn(|conn| insert_in_tx(conn, &trade("t-1"))).unwrap();

        let fetched = store.get("t-1").unwrap();
        assert_eq!(fetched.quantity, 133);
        assert_eq!(fetched.direction, SignalType::Buy);
        assert_eq!(fetched.status, TradeStatus::Submitted);
        assert_eq!(fetched.artifact_hash, "sha256:feed");
        assert_eq!(fetched.risk.quantity, 133);
        assert_eq!(fetched.risk.order_id.as_deref(), Some("ord-1"));
    }

    fn insert_in_tx(conn: &mut Connection, trade: &Trade) -> Result<(), rusqlite::Error> {
        let tx = conn.transaction()?;
        TradeStore::insert_tx(&tx, trade)?;
        tx.commit()
    }

    #[test]
    fn update_fill_mutates_tracking_columns_only() {
        let (db, store) = fixture();
        db.with_conn(|conn| insert_in_tx(conn, &trade("t-1"))).unwrap();

        store
            .update_fill("t-1", TradeStatus::PartiallyFilled, 50.0, Some(150.02))
            .unwrap();
        let fetched = store.get("t-1").unwrap();
        assert_eq!(fetched.status, TradeStatus::PartiallyFilled);
        assert!((fetched.filled_qty - 50.0).abs() < f64::EPSILON);
        assert_eq!(fetched.avg_fill_price, Some(150.02));
        // The embedded risk status mirrors the trade status.
        assert_eq!(fetched.risk.status, "partially_filled");
        // Immutable columns are untouched.
        assert_eq!(fetched.quantity, 133);
        assert_eq!(fetched.artifact_hash, "sha256:feed");
    }

    #[test]
    fn update_fill_missing_trade() {
        let (_db, store) = fixture();
        assert!(matches!(
            store.update_fill("ghost", TradeStatus::Filled, 1.0, None),
            Err(TradeStoreError::NotFound(_))
        ));
    }

    #[test]
    fn list_recent_orders_newest_first() {
        let (db, store) = fixture();
        for i in 0..3 {
            let mut t = trade(&format!("t-{i}"));
            t.created_at = t.created_at + chrono::Duration::minutes(i);
            db.with_conn(|conn| insert_in_tx(conn, &t)).unwrap();
        }
        let trades = store.list_recent(2).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].id, "t-2");
    }
}
