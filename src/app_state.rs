// =============================================================================
// Central Application State — Meridian Trading Engine
// =============================================================================
//
// Ties the subsystems together for the API surface and the background tasks.
// Process-wide mutable state is deliberately small: the strategy registry
// reference (swapped atomically by the loader), a set of atomic metric
// counters, and a bounded recent-error ring for operators.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::artifact::registry::{RegistryEntrySummary, StrategyRegistry};
use crate::clock;
use crate::db::Database;
use crate::runtime_config::TraderConfig;

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// A recorded error event for the operator API.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    pub at: String,
}

/// Signal generator counters, cumulative since startup.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GeneratorMetrics {
    pub runs: u64,
    pub signals_generated: u64,
    pub failed: u64,
}

/// Central state shared across tasks via `Arc<AppState>`.
pub struct AppState {
    pub config: Arc<RwLock<TraderConfig>>,
    pub db: Database,

    // ── Strategy registry (single swappable reference) ──────────────────
    registry: RwLock<Arc<StrategyRegistry>>,

    // ── Generator metrics ───────────────────────────────────────────────
    cycles_run: AtomicU64,
    signals_generated: AtomicU64,
    signals_failed: AtomicU64,

    // ── Error log ───────────────────────────────────────────────────────
    recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: TraderConfig, db: Database) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            db,
            registry: RwLock::new(Arc::new(StrategyRegistry::empty())),
            cycles_run: AtomicU64::new(0),
            signals_generated: AtomicU64::new(0),
            signals_failed: AtomicU64::new(0),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Registry ────────────────────────────────────────────────────────

    /// Consistent snapshot of the live registry: a cheap Arc clone. A cycle
    /// holds its snapshot for the whole run regardless of refreshes.
    pub fn registry_snapshot(&self) -> Arc<StrategyRegistry> {
        self.registry.read().clone()
    }

    /// Replace the live registry. Readers keep whatever snapshot they hold.
    pub fn swap_registry(&self, registry: StrategyRegistry) {
        *self.registry.write() = Arc::new(registry);
    }

    // ── Metrics ─────────────────────────────────────────────────────────

    /// Record the outcome of one generator cycle.
    pub fn record_cycle(&self, generated: u64, failed: u64) {
        self.cycles_run.fetch_add(1, Ordering::Relaxed);
        self.signals_generated.fetch_add(generated, Ordering::Relaxed);
        self.signals_failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn generator_metrics(&self) -> GeneratorMetrics {
        GeneratorMetrics {
            runs: self.cycles_run.load(Ordering::Relaxed),
            signals_generated: self.signals_generated.load(Ordering::Relaxed),
            failed: self.signals_failed.load(Ordering::Relaxed),
        }
    }

    // ── Error log ───────────────────────────────────────────────────────

    /// Record an error message; the ring is capped at [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, message: String) {
        let mut errors = self.recent_errors.write();
        errors.push(ErrorRecord {
            message,
            at: clock::fmt_ts(clock::now()),
        });
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.recent_errors.read().clone()
    }

    // ── Snapshot for the API ────────────────────────────────────────────

    pub fn build_summary(&self) -> StateSummary {
        let config = self.config.read();
        StateSummary {
            uptime_secs: self.start_time.elapsed().as_secs(),
            watchlist: config.watchlist.clone(),
            execution_enabled: config.execution_enabled,
            signal_interval_secs: config.signal_interval_secs,
            registry: self.registry_snapshot().summaries(),
            metrics: self.generator_metrics(),
            recent_errors: self.recent_errors(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registry_len", &self.registry_snapshot().len())
            .field("metrics", &self.generator_metrics())
            .finish_non_exhaustive()
    }
}

/// Operator-facing engine summary.
#[derive(Debug, Clone, Serialize)]
pub struct StateSummary {
    pub uptime_secs: u64,
    pub watchlist: Vec<String>,
    pub execution_enabled: bool,
    pub signal_interval_secs: u64,
    pub registry: Vec<RegistryEntrySummary>,
    pub metrics: GeneratorMetrics,
    pub recent_errors: Vec<ErrorRecord>,
}
