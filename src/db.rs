// =============================================================================
// Database — SQLite connection handle and schema
// =============================================================================
//
// Single persistent store for the whole runtime. The connection lives behind
// a `parking_lot::Mutex`; the runtime is single-writer by design, and every
// transaction (state transitions, trade creation, signal inserts) serialises
// on this handle.
//
// WAL mode is enabled for read concurrency. `in_memory()` backs the test
// suites.
// =============================================================================

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

/// Shared handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and initialise the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<R>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<R, rusqlite::Error>,
    ) -> Result<R, rusqlite::Error> {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }

    fn initialize_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        "#,
        )?;

        conn.execute_batch(
            r#"
            -- Immutable strategy artifacts; only state (and the hash that
            -- covers it) change after insert, via the promotion machinery.
            CREATE TABLE IF NOT EXISTS strategy_artifacts (
                id               TEXT PRIMARY KEY,
                schema_version   TEXT NOT NULL,
                strategy_name    TEXT NOT NULL,
                strategy_version TEXT NOT NULL,
                code_ref         TEXT NOT NULL,
                params           TEXT NOT NULL,
                data_window      TEXT NOT NULL,
                validation       TEXT NOT NULL,
                risk_profile     TEXT NOT NULL,
                created_by       TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                payload_hash     TEXT NOT NULL UNIQUE,
                payload_uri      TEXT,
                signature        TEXT,
                state            TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_artifacts_name_state
                ON strategy_artifacts(strategy_name, state, created_at DESC);

            CREATE TABLE IF NOT EXISTS artifact_approvals (
                id            TEXT PRIMARY KEY,
                artifact_id   TEXT NOT NULL REFERENCES strategy_artifacts(id),
                approver_id   TEXT NOT NULL,
                approved_at   TEXT NOT NULL,
                approval_type TEXT NOT NULL,
                notes         TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_approvals_artifact
                ON artifact_approvals(artifact_id);

            -- Append-only audit trail of every state transition.
            CREATE TABLE IF NOT EXISTS artifact_promotions (
                id          TEXT PRIMARY KEY,
                artifact_id TEXT NOT NULL REFERENCES strategy_artifacts(id),
                from_state  TEXT NOT NULL,
                to_state    TEXT NOT NULL,
                promoted_by TEXT NOT NULL,
                promoted_at TEXT NOT NULL,
                reason      TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_promotions_artifact
                ON artifact_promotions(artifact_id);

            CREATE TABLE IF NOT EXISTS artifact_validation_reports (
                id                    TEXT PRIMARY KEY,
                artifact_id           TEXT NOT NULL REFERENCES strategy_artifacts(id),
                backtest_run_id       TEXT NOT NULL,
                report_uri            TEXT,
                metrics               TEXT NOT NULL,
                determinism_verified  INTEGER NOT NULL,
                generated_at          TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_validation_reports_artifact
                ON artifact_validation_reports(artifact_id);

            CREATE TABLE IF NOT EXISTS strategy_signals (
                id            TEXT PRIMARY KEY,
                symbol        TEXT NOT NULL,
                strategy_name TEXT NOT NULL,
                signal_type   TEXT NOT NULL,
                confidence    REAL NOT NULL,
                entry_price   REAL NOT NULL,
                stop_loss     REAL,
                take_profit   REAL,
                reasoning     TEXT NOT NULL,
                indicators    TEXT NOT NULL,
                generated_at  TEXT NOT NULL,
                expires_at    TEXT NOT NULL,
                status        TEXT NOT NULL,
                artifact_id   TEXT NOT NULL REFERENCES strategy_artifacts(id)
            );
            CREATE INDEX IF NOT EXISTS idx_signals_symbol_time
                ON strategy_signals(symbol, generated_at DESC);
            CREATE INDEX IF NOT EXISTS idx_signals_status_expiry
                ON strategy_signals(status, expires_at);

            CREATE TABLE IF NOT EXISTS trade_approvals (
                signal_id   TEXT PRIMARY KEY REFERENCES strategy_signals(id),
                approved    INTEGER NOT NULL,
                approver    TEXT NOT NULL,
                approved_at TEXT NOT NULL,
                order_id    TEXT
            );

            CREATE TABLE IF NOT EXISTS trades (
                id             TEXT PRIMARY KEY,
                signal_id      TEXT NOT NULL REFERENCES strategy_signals(id),
                symbol         TEXT NOT NULL,
                direction      TEXT NOT NULL,
                quantity       INTEGER NOT NULL,
                entry_price    REAL NOT NULL,
                stop_loss      REAL NOT NULL,
                take_profit    REAL,
                strategy_name  TEXT NOT NULL,
                status         TEXT NOT NULL,
                filled_qty     REAL NOT NULL DEFAULT 0,
                avg_fill_price REAL,
                risk           TEXT NOT NULL,
                artifact_id    TEXT NOT NULL REFERENCES strategy_artifacts(id),
                artifact_hash  TEXT NOT NULL,
                created_at     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_artifact
                ON trades(artifact_id);

            -- Market data inputs. Written by the research/data runtime; the
            -- trader only reads them.
            CREATE TABLE IF NOT EXISTS quotes (
                symbol    TEXT NOT NULL,
                price     REAL NOT NULL,
                volume    REAL NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_quotes_symbol_time
                ON quotes(symbol, timestamp DESC);

            CREATE TABLE IF NOT EXISTS candles (
                symbol TEXT NOT NULL,
                ts     TEXT NOT NULL,
                open   REAL NOT NULL,
                high   REAL NOT NULL,
                low    REAL NOT NULL,
                close  REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (symbol, ts)
            );
        "#,
        )?;

        info!("database schema initialised");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
