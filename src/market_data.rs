// =============================================================================
// Market Data — quote and candle inputs
// =============================================================================
//
// The `quotes` and `candles` tables are inputs written by the data ingestion
// runtime; this module is the trader's read path over them. Candles come back
// oldest-first, bounded to the generator's history window.
// =============================================================================

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::db::Database;

/// Latest traded price snapshot for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

/// One OHLCV bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub ts: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Read access to the market data input tables.
#[derive(Debug, Clone)]
pub struct MarketDataStore {
    db: Database,
}

impl MarketDataStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Most recent quote for `symbol`, by timestamp.
    pub fn latest_quote(&self, symbol: &str) -> Result<Option<Quote>, rusqlite::Error> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT symbol, price, volume, timestamp FROM quotes
                 WHERE symbol = ?1 ORDER BY timestamp DESC LIMIT 1",
            )?;
            let mut rows = stmt.query(params![symbol])?;
            match rows.next()? {
                Some(row) => {
                    let ts: String = row.get(3)?;
                    Ok(Some(Quote {
                        symbol: row.get(0)?,
                        price: row.get(1)?,
                        volume: row.get(2)?,
                        timestamp: clock::parse_ts(&ts).unwrap_or_default(),
                    }))
                }
                None => Ok(None),
            }
        })
    }

    /// Last `limit` candles for `symbol`, oldest first.
    pub fn recent_candles(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, rusqlite::Error> {
        let mut candles = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT ts, open, high, low, close, volume FROM candles
                 WHERE symbol = ?1 ORDER BY ts DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![symbol, limit as i64], |row| {
                let ts: String = row.get(0)?;
                Ok(Candle {
                    ts: clock::parse_ts(&ts).unwrap_or_default(),
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        candles.reverse();
        Ok(candles)
    }

    /// Insert a quote row. Used by the demo seeder and tests; the live data
    /// path belongs to the ingestion runtime.
    pub fn insert_quote(&self, quote: &Quote) -> Result<(), rusqlite::Error> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO quotes (symbol, price, volume, timestamp)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    quote.symbol,
                    quote.price,
                    quote.volume,
                    clock::fmt_ts(quote.timestamp)
                ],
            )?;
            Ok(())
        })
    }

    /// Insert a candle row. Same caveat as [`insert_quote`].
    pub fn insert_candle(&self, symbol: &str, candle: &Candle) -> Result<(), rusqlite::Error> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO candles (symbol, ts, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    symbol,
                    clock::fmt_ts(candle.ts),
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume
                ],
            )?;
            Ok(())
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn store() -> MarketDataStore {
        MarketDataStore::new(Database::in_memory().unwrap())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn latest_quote_picks_newest() {
        let store = store();
        for (i, price) in [150.0, 151.0, 152.5].iter().enumerate() {
            store
                .insert_quote(&Quote {
                    symbol: "AAPL".to_string(),
                    price: *price,
                    volume: 1000.0,
                    timestamp: t0() + Duration::minutes(i as i64),
                })
                .unwrap();
        }

        let quote = store.latest_quote("AAPL").unwrap().unwrap();
        assert!((quote.price - 152.5).abs() < f64::EPSILON);
    }

    #[test]
    fn latest_quote_missing_symbol() {
        assert!(store().latest_quote("MSFT").unwrap().is_none());
    }

    #[test]
    fn recent_candles_ascending_and_bounded() {
        let store = store();
        for i in 0..10 {
            store
                .insert_candle(
                    "AAPL",
                    &Candle {
                        ts: t0() + Duration::minutes(5 * i),
                        open: 100.0 + i as f64,
                        high: 101.0 + i as f64,
                        low: 99.0 + i as f64,
                        close: 100.5 + i as f64,
                        volume: 500.0,
                    },
                )
                .unwrap();
        }

        let candles = store.recent_candles("AAPL", 4).unwrap();
        assert_eq!(candles.len(), 4);
        // Oldest-first, and only the newest four survive the bound.
        assert!((candles[0].close - 106.5).abs() < f64::EPSILON);
        assert!((candles[3].close - 109.5).abs() < f64::EPSILON);
        assert!(candles.windows(2).all(|w| w[0].ts < w[1].ts));
    }

    #[test]
    fn candle_insert_is_upsert_on_symbol_ts() {
        let store = store();
        let candle = Candle {
            ts: t0(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10.0,
        };
        store.insert_candle("SPY", &candle).unwrap();
        store
            .insert_candle(
                "SPY",
                &Candle {
                    close: 1.75,
                    ..candle.clone()
                },
            )
            .unwrap();

        let candles = store.recent_candles("SPY", 10).unwrap();
        assert_eq!(candles.len(), 1);
        assert!((candles[0].close - 1.75).abs() < f64::EPSILON);
    }
}
