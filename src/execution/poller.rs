// =============================================================================
// Order Status Poller — bounded background fill tracking
// =============================================================================
//
// One poller per submitted order. Every 10 s it asks the broker for the
// order's status and persists changes to the trade row. It exits on a
// terminal status (filled / cancelled / rejected) or after 120 s, whichever
// comes first; on timeout the trade is marked `timeout` locally while the
// broker-side state stays unknown. The final state is always persisted
// before the task ends, so there is no open-ended background work.
//
// Poll failures are logged and retried on the next tick; they never abort
// the poller early.
// =============================================================================

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::broker::Broker;
use crate::trade_store::TradeStore;
use crate::types::TradeStatus;

/// Interval between status polls.
pub const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(10);
/// Total poller lifetime from submission.
pub const POLL_LIFETIME: std::time::Duration = std::time::Duration::from_secs(120);

pub async fn poll_order_status(
    broker: Arc<dyn Broker>,
    trades: TradeStore,
    trade_id: String,
    order_id: String,
) {
    let started = tokio::time::Instant::now();
    let mut last_status = TradeStatus::Submitted;
    let mut last_filled_qty = 0.0_f64;
    let mut last_avg_fill: Option<f64> = None;

    debug!(trade_id = %trade_id, order_id = %order_id, "order status poller started");

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        if started.elapsed() >= POLL_LIFETIME {
            if let Err(e) =
                trades.update_fill(&trade_id, TradeStatus::Timeout, last_filled_qty, last_avg_fill)
            {
                warn!(trade_id = %trade_id, error = %e, "failed to persist poller timeout");
            }
            warn!(
                trade_id = %trade_id,
                order_id = %order_id,
                last_status = %last_status,
                "poller lifetime exhausted; trade marked timeout (broker state unknown)"
            );
            return;
        }

        let info = match broker.order_status(&order_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "order status poll failed; will retry");
                continue;
            }
        };

        let changed = info.status != last_status
            || (info.filled_qty - last_filled_qty).abs() > f64::EPSILON
            || info.avg_fill_price != last_avg_fill;

        if changed {
            if let Err(e) =
                trades.update_fill(&trade_id, info.status, info.filled_qty, info.avg_fill_price)
            {
                warn!(trade_id = %trade_id, error = %e, "failed to persist fill update");
            } else {
                debug!(
                    trade_id = %trade_id,
                    status = %info.status,
                    filled_qty = info.filled_qty,
                    "fill state updated"
                );
            }
            last_status = info.status;
            last_filled_qty = info.filled_qty;
            last_avg_fill = info.avg_fill_price;
        }

        if info.status.is_terminal() {
            info!(
                trade_id = %trade_id,
                order_id = %order_id,
                status = %info.status,
                filled_qty = info.filled_qty,
                "order reached terminal status; poller exiting"
            );
            return;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::stub::StubBroker;
    use crate::broker::AccountSnapshot;
    use crate::db::Database;
    use crate::trade_store::{Trade, TradeRisk};
    use crate::types::SignalType;
    use chrono::{TimeZone, Utc};

    fn fixture() -> (Database, TradeStore, Arc<StubBroker>) {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO strategy_artifacts
                 (id, schema_version, strategy_name, strategy_version, code_ref,
                  params, data_window, validation, risk_profile, created_by,
                  created_at, payload_hash, state)
                 VALUES ('art-1', '1', 's', '1', 'ref', '{}', '{}', '{}', '{}', 'r',
                         '2024-06-01T00:00:00.000000Z', 'sha256:feed', 'APPROVED');
                 INSERT INTO strategy_signals
                 (id, symbol, strategy_name, signal_type, confidence, entry_price,
                  reasoning, indicators, generated_at, expires_at, status, artifact_id)
                 VALUES ('sig-1', 'AAPL', 's', 'BUY', 0.7, 150.0, 'r', '{}',
                         '2024-06-01T12:00:00.000000Z', '2024-06-02T12:00:00.000000Z',
                         'executed', 'art-1');",
            )
        })
        .unwrap();

        let trades = TradeStore::new(db.clone());
        db.with_conn(|conn| {
            let tx = conn.transaction()?;
            TradeStore::insert_tx(
                &tx,
                &Trade {
                    id: "trd-1".to_string(),
                    signal_id: "sig-1".to_string(),
                    symbol: "AAPL".to_string(),
                    direction: SignalType::Buy,
                    quantity: 100,
                    entry_price: 150.0,
                    stop_loss: 145.0,
                    take_profit: None,
                    strategy_name: "s".to_string(),
                    status: TradeStatus::Submitted,
                    filled_qty: 0.0,
                    avg_fill_price: None,
                    risk: TradeRisk {
                        amount: 500.0,
                        percent: 0.005,
                        position_value: 15_000.0,
                        quantity: 100,
                        order_id: Some("ord-1".to_string()),
                        status: "submitted".to_string(),
                    },
                    artifact_id: "art-1".to_string(),
                    artifact_hash: "sha256:feed".to_string(),
                    created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
                },
            )?;
            tx.commit()
        })
        .unwrap();

        let broker = Arc::new(StubBroker::healthy(AccountSnapshot {
            cash: 0.0,
            buying_power: 0.0,
            net_liquidation: 0.0,
        }));
        (db, trades, broker)
    }

    #[tokio::test(start_paused = true)]
    async fn poller_stops_on_terminal_status() {
        let (_db, trades, broker) = fixture();
        broker.push_status(TradeStatus::Submitted, 0.0, None);
        broker.push_status(TradeStatus::Filled, 100.0, Some(150.05));

        poll_order_status(
            broker.clone(),
            trades.clone(),
            "trd-1".to_string(),
            "ord-1".to_string(),
        )
        .await;

        let trade = trades.get("trd-1").unwrap();
        assert_eq!(trade.status, TradeStatus::Filled);
        assert!((trade.filled_qty - 100.0).abs() < f64::EPSILON);
        assert_eq!(trade.avg_fill_price, Some(150.05));
        assert_eq!(*broker.poll_count.lock(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_tracks_partial_fills() {
        let (_db, trades, broker) = fixture();
        broker.push_status(TradeStatus::PartiallyFilled, 40.0, Some(150.01));
        broker.push_status(TradeStatus::PartiallyFilled, 80.0, Some(150.02));
        broker.push_status(TradeStatus::Filled, 100.0, Some(150.03));

        poll_order_status(
            broker.clone(),
            trades.clone(),
            "trd-1".to_string(),
            "ord-1".to_string(),
        )
        .await;

        let trade = trades.get("trd-1").unwrap();
        assert_eq!(trade.status, TradeStatus::Filled);
        assert!((trade.filled_qty - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_times_out_at_lifetime() {
        let (_db, trades, broker) = fixture();
        // The broker forever reports a non-terminal status.
        broker.push_status(TradeStatus::Submitted, 0.0, None);

        let started = tokio::time::Instant::now();
        poll_order_status(
            broker.clone(),
            trades.clone(),
            "trd-1".to_string(),
            "ord-1".to_string(),
        )
        .await;
        let elapsed = started.elapsed();

        // Exactly the lifetime, not a tick more.
        assert_eq!(elapsed.as_secs(), POLL_LIFETIME.as_secs());

        let trade = trades.get("trd-1").unwrap();
        assert_eq!(trade.status, TradeStatus::Timeout);
        assert!((trade.filled_qty - 0.0).abs() < f64::EPSILON);
        // Polls happen at 10..=110 s; the 120 s wake-up hits the lifetime.
        assert_eq!(*broker.poll_count.lock(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_do_not_abort_the_poller() {
        let (_db, trades, broker) = fixture();
        // No scripted statuses: every poll errors until the lifetime ends.

        poll_order_status(
            broker.clone(),
            trades.clone(),
            "trd-1".to_string(),
            "ord-1".to_string(),
        )
        .await;

        let trade = trades.get("trd-1").unwrap();
        assert_eq!(trade.status, TradeStatus::Timeout);
        assert_eq!(*broker.poll_count.lock(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_preserves_last_known_fill() {
        let (_db, trades, broker) = fixture();
        broker.push_status(TradeStatus::PartiallyFilled, 25.0, Some(150.0));

        poll_order_status(
            broker.clone(),
            trades.clone(),
            "trd-1".to_string(),
            "ord-1".to_string(),
        )
        .await;

        let trade = trades.get("trd-1").unwrap();
        assert_eq!(trade.status, TradeStatus::Timeout);
        assert!((trade.filled_qty - 25.0).abs() < f64::EPSILON);
    }
}
