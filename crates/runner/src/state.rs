use std::sync::Arc;

use binance_futures::BinanceFuturesClient;
use position_engine::{SharedEngine, SignalRouter};
use state_store::SharedSymbolLocks;

use crate::config::RunnerConfig;

/// Shared application state, passed to all route handlers via `axum::extract::State`.
pub struct AppState {
    pub config: RunnerConfig,
    pub router: SignalRouter,
    pub engine: SharedEngine,
    /// Account endpoints the gateway trait does not cover (balances).
    pub client: Arc<BinanceFuturesClient>,
}

impl AppState {
    pub fn new(
        config: RunnerConfig,
        engine: SharedEngine,
        locks: SharedSymbolLocks,
        client: Arc<BinanceFuturesClient>,
    ) -> Arc<Self> {
        let router = SignalRouter::new(engine.clone(), locks, config.default_symbol.clone());

        Arc::new(Self {
            config,
            router,
            engine,
            client,
        })
    }
}
