//! Ladder bot binary.
//!
//! ```text
//!   TradingView alert ──► POST /webhook ──► SignalRouter ──┐
//!                                                          ▼
//!                               PositionLifecycleEngine ◄── PositionMonitor (every POLL_INTERVAL)
//!                                   │        │       │
//!                       BinanceFuturesClient  │   CsvLedger
//!                                       StateStore (JSON)
//! ```

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use auth::ApiCredentials;
use binance_futures::BinanceFuturesClient;
use common::BinanceEnvironment;
use execution_core::Ladder;
use metrics::{create_metrics, SharedMetrics};
use position_engine::{PositionLifecycleEngine, PositionMonitor};
use state_store::{create_state_store, create_symbol_locks, CsvLedger, SharedLedger};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::state::AppState;

/// Interval for periodic health status logging.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    common::init_logging();

    let config = RunnerConfig::from_env();
    let environment = BinanceEnvironment::from_env();

    let ladder = match &config.ladder_file {
        Some(path) => Ladder::from_file(path)
            .with_context(|| format!("loading ladder from {}", path.display()))?,
        None => Ladder::default(),
    };

    info!(
        environment = %environment,
        addr = %config.addr(),
        levels = ladder.max_level(),
        total_capital = %ladder.total_capital(),
        state_file = %config.state_file.display(),
        history = %config.history_path.display(),
        "Starting ladder bot"
    );
    if environment.is_production() {
        warn!("Trading on PRODUCTION futures");
    }

    let credentials = ApiCredentials::from_env().context("reading API credentials")?;
    let client = Arc::new(
        BinanceFuturesClient::new(credentials, environment).context("building exchange client")?,
    );
    if let Err(e) = client.sync_time().await {
        warn!(error = %e, "Server time sync failed, using local clock");
    }

    let metrics = create_metrics(config.poll_interval);
    let store = create_state_store(config.state_file.clone());
    let ledger: SharedLedger = Arc::new(
        CsvLedger::open(config.history_path.clone()).context("opening trade ledger")?,
    );
    let locks = create_symbol_locks();

    let engine = Arc::new(PositionLifecycleEngine::new(
        Arc::new(ladder),
        client.clone(),
        store,
        ledger,
        metrics.clone(),
        config.engine_config(),
    ));

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn position monitor
    let monitor = PositionMonitor::new(engine.clone(), locks.clone());
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    // Spawn periodic health reporter
    spawn_health_reporter(metrics.clone(), shutdown_tx.subscribe());

    let addr = config.addr();
    let state = AppState::new(config, engine, locks, client);
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    let server_shutdown_tx = shutdown_tx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, initiating shutdown");
            }
            let _ = server_shutdown_tx.send(true);
        })
        .await
        .context("HTTP server")?;

    // Monitor observes shutdown between cycles
    let _ = shutdown_tx.send(true);
    if let Err(e) = monitor_handle.await {
        warn!(error = %e, "Monitor task ended abnormally");
    }

    // Print final metrics
    let snapshot = metrics.snapshot();
    println!("\n{}", snapshot);

    info!("Shutdown complete");
    Ok(())
}

fn spawn_health_reporter(metrics: SharedMetrics, mut shutdown_rx: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_LOG_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = metrics.snapshot();
                    info!(
                        status = %snapshot.health_status(),
                        signals = snapshot.signals_received,
                        opened = snapshot.positions_opened,
                        reinforcements = snapshot.reinforcements,
                        closes = snapshot.closes(),
                        cycles = snapshot.monitor_cycles,
                        errors = snapshot.monitor_errors + snapshot.rejected,
                        "Health check"
                    );
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });
}
