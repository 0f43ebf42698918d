// =============================================================================
// Meridian Trading Engine — Main Entry Point
// =============================================================================
//
// Single-process trader runtime: the artifact loader binds approved
// strategy artifacts at startup, the signal generator evaluates the
// watchlist on a fixed cadence, and the execution engine routes approved
// signals to the broker adapter. Execution starts disabled; operators
// enable it explicitly via configuration.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod artifact;
mod broker;
mod clock;
mod db;
mod demo;
mod execution;
mod generator;
mod indicators;
mod market_data;
mod risk;
mod runtime_config;
mod signal_store;
mod strategies;
mod trade_store;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::rest::ApiContext;
use crate::app_state::AppState;
use crate::artifact::loader::ArtifactLoader;
use crate::artifact::service::ArtifactService;
use crate::artifact::store::ArtifactStore;
use crate::broker::HttpBroker;
use crate::db::Database;
use crate::execution::ExecutionEngine;
use crate::generator::SignalGenerator;
use crate::risk::RiskTracker;
use crate::runtime_config::TraderConfig;
use crate::signal_store::SignalStore;

const CONFIG_PATH: &str = "meridian_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Meridian Trading Engine starting up");

    let mut config = TraderConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        TraderConfig::default()
    });
    config.apply_env_overrides();

    info!(
        watchlist = ?config.watchlist,
        signal_interval_secs = config.signal_interval_secs,
        execution_enabled = config.execution_enabled,
        "trader configuration resolved"
    );

    // ── 2. Database & stores ─────────────────────────────────────────────
    let db = Database::open(&config.database_url)?;
    let artifact_store = ArtifactStore::new(db.clone());
    let artifact_service = Arc::new(ArtifactService::new(artifact_store.clone()));

    // ── 3. Optional demo seed ────────────────────────────────────────────
    if config.demo_seed {
        warn!("demo_seed enabled: seeding synthetic market data and demo artifacts");
        if let Err(e) = demo::seed(&db, &artifact_service, &config.watchlist) {
            error!(error = %e, "demo seeding failed");
        }
    }

    // ── 4. Shared state & registry load ──────────────────────────────────
    let broker_url = config.broker_url.clone();
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config, db.clone()));

    let loader = Arc::new(ArtifactLoader::new(artifact_store.clone()));
    let bound = loader.refresh(&state);
    if bound == 0 {
        // Non-fatal: the engine stays observable and administrable; a
        // refresh picks up artifacts approved later.
        warn!("starting with an empty strategy registry");
    }

    // ── 5. Broker client & engines ───────────────────────────────────────
    let broker = Arc::new(HttpBroker::new(broker_url));
    let risk = Arc::new(RiskTracker::new());
    let execution = Arc::new(ExecutionEngine::new(
        db.clone(),
        broker.clone(),
        risk.clone(),
        state.config.clone(),
    ));
    let generator = Arc::new(SignalGenerator::new(state.clone()));

    // ── 6. API server ────────────────────────────────────────────────────
    let ctx = ApiContext {
        state: state.clone(),
        service: artifact_service.clone(),
        loader: loader.clone(),
        generator: generator.clone(),
        execution: execution.clone(),
        signals: Arc::new(SignalStore::new(db.clone())),
    };
    let app = api::rest::router(ctx);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 7. Signal generator loop ─────────────────────────────────────────
    // The loop runs under an explicit system-clock scope; tests drive the
    // same code path with a fixed clock.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let generator_task = tokio::spawn(clock::scope(
        Arc::new(clock::SystemClock),
        generator.clone().run_loop(shutdown_rx),
    ));

    info!("all subsystems running; press Ctrl+C to stop");

    // ── 8. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping gracefully");

    // The generator finishes any in-flight cycle before exiting.
    let _ = shutdown_tx.send(true);
    if let Err(e) = generator_task.await {
        error!(error = %e, "generator task ended abnormally");
    }

    info!("Meridian shut down complete");
    Ok(())
}
