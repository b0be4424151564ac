//! In-memory exchange and wiring for engine tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use execution_core::ladder;
use execution_core::{
    Direction, EntryFill, ExchangeGateway, GatewayError, Ladder, OpenOrder, OrderSide,
    OrderSnapshot, OrderStatus, OrderType, Position, Protection, ProtectiveKind, SymbolFilters,
};
use metrics::{create_metrics, SharedMetrics};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use state_store::{
    create_state_store, create_symbol_locks, HistoryStats, LedgerEntry, LedgerError,
    LedgerRecord, MemoryLedger, SharedLedger, SharedStateStore, SharedSymbolLocks, TradeLedger,
};
use tempfile::TempDir;

use crate::config::EngineConfig;
use crate::lifecycle::{PositionLifecycleEngine, SharedEngine};
use crate::monitor::PositionMonitor;
use crate::router::SignalRouter;

/// Default timing with every sleep removed.
pub fn fast_config() -> EngineConfig {
    EngineConfig::default()
        .with_fill_polling(3, Duration::ZERO)
        .with_protection_retries(3, Duration::ZERO)
}

#[derive(Debug, Clone)]
struct FakeOrder {
    symbol: String,
    side: OrderSide,
    order_type: OrderType,
    status: OrderStatus,
    stop_price: Decimal,
}

#[derive(Debug)]
struct FakeState {
    next_id: u64,
    ticker: Decimal,
    fill_price: Option<Decimal>,
    entry_status: OrderStatus,
    filters: SymbolFilters,
    orders: HashMap<String, FakeOrder>,
    positions: HashMap<String, Decimal>,
    leverage: HashMap<String, u32>,
    market_orders: Vec<(OrderSide, Decimal)>,
    canceled: Vec<String>,
    protective_failures: HashMap<ProtectiveKind, u32>,
    protective_rejections: HashMap<ProtectiveKind, i64>,
    protective_attempts: HashMap<ProtectiveKind, u32>,
    fail_status: bool,
    fail_open_orders: bool,
    fail_leverage: bool,
}

/// Scriptable exchange. Market orders fill at the fill price (default: the
/// ticker) and move the position amount; protective orders rest until
/// triggered or canceled.
#[derive(Debug)]
pub struct FakeGateway {
    inner: Mutex<FakeState>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FakeState {
                next_id: 1000,
                ticker: dec!(2000),
                fill_price: None,
                entry_status: OrderStatus::Filled,
                filters: SymbolFilters {
                    step_size: dec!(0.001),
                    tick_size: dec!(0.01),
                },
                orders: HashMap::new(),
                positions: HashMap::new(),
                leverage: HashMap::new(),
                market_orders: Vec::new(),
                canceled: Vec::new(),
                protective_failures: HashMap::new(),
                protective_rejections: HashMap::new(),
                protective_attempts: HashMap::new(),
                fail_status: false,
                fail_open_orders: false,
                fail_leverage: false,
            }),
        }
    }

    pub fn set_ticker(&self, price: Decimal) {
        self.inner.lock().ticker = price;
    }

    pub fn set_fill_price(&self, price: Decimal) {
        self.inner.lock().fill_price = Some(price);
    }

    /// Status reported for market orders.
    pub fn set_entry_status(&self, status: OrderStatus) {
        self.inner.lock().entry_status = status;
    }

    pub fn set_position_amount(&self, symbol: &str, amount: Decimal) {
        self.inner.lock().positions.insert(symbol.to_string(), amount);
    }

    /// Fail the next `times` placements of this leg.
    pub fn fail_protective(&self, kind: ProtectiveKind, times: u32) {
        self.inner.lock().protective_failures.insert(kind, times);
    }

    /// Reject every placement of this leg with exchange error `code`.
    pub fn reject_protective(&self, kind: ProtectiveKind, code: i64) {
        self.inner.lock().protective_rejections.insert(kind, code);
    }

    pub fn fail_status_queries(&self, fail: bool) {
        self.inner.lock().fail_status = fail;
    }

    pub fn fail_open_orders(&self, fail: bool) {
        self.inner.lock().fail_open_orders = fail;
    }

    pub fn fail_leverage(&self, fail: bool) {
        self.inner.lock().fail_leverage = fail;
    }

    /// Fire a protective order: it reports FILLED and the position goes flat.
    pub fn trigger(&self, order_id: &str) {
        let mut inner = self.inner.lock();
        let symbol = match inner.orders.get_mut(order_id) {
            Some(order) => {
                order.status = OrderStatus::Filled;
                order.symbol.clone()
            }
            None => return,
        };
        inner.positions.insert(symbol, Decimal::ZERO);
    }

    /// Cancel every resting order for `symbol` without touching the position.
    pub fn cancel_all(&self, symbol: &str) {
        for order in self.inner.lock().orders.values_mut() {
            if order.symbol == symbol && order.status == OrderStatus::New {
                order.status = OrderStatus::Canceled;
            }
        }
    }

    pub fn leverage(&self, symbol: &str) -> Option<u32> {
        self.inner.lock().leverage.get(symbol).copied()
    }

    pub fn market_orders(&self) -> Vec<(OrderSide, Decimal)> {
        self.inner.lock().market_orders.clone()
    }

    pub fn was_canceled(&self, order_id: &str) -> bool {
        self.inner.lock().canceled.iter().any(|id| id == order_id)
    }

    pub fn protective_attempts(&self, kind: ProtectiveKind) -> u32 {
        self.inner
            .lock()
            .protective_attempts
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn open_protective(&self, symbol: &str) -> Vec<OpenOrder> {
        let inner = self.inner.lock();
        Self::open_orders(&inner, symbol)
    }

    fn open_orders(inner: &FakeState, symbol: &str) -> Vec<OpenOrder> {
        inner
            .orders
            .iter()
            .filter(|(_, o)| o.symbol == symbol && o.status == OrderStatus::New)
            .map(|(id, o)| OpenOrder {
                order_id: id.clone(),
                symbol: o.symbol.clone(),
                side: o.side,
                order_type: Some(o.order_type),
                status: o.status,
                stop_price: o.stop_price,
            })
            .collect()
    }

    fn next_id(inner: &mut FakeState) -> String {
        inner.next_id += 1;
        inner.next_id.to_string()
    }
}

#[async_trait]
impl ExchangeGateway for FakeGateway {
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        if inner.fail_leverage {
            return Err(GatewayError::Api {
                code: -4028,
                message: "Leverage is not valid".into(),
            });
        }
        inner.leverage.insert(symbol.to_string(), leverage);
        Ok(())
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<String, GatewayError> {
        let mut inner = self.inner.lock();
        let id = Self::next_id(&mut inner);
        let status = inner.entry_status;
        inner.orders.insert(
            id.clone(),
            FakeOrder {
                symbol: symbol.to_string(),
                side,
                order_type: OrderType::Market,
                status,
                stop_price: Decimal::ZERO,
            },
        );
        inner.market_orders.push((side, quantity));
        if status.is_filled() {
            let signed = match side {
                OrderSide::Buy => quantity,
                OrderSide::Sell => -quantity,
            };
            *inner.positions.entry(symbol.to_string()).or_default() += signed;
        }
        Ok(id)
    }

    async fn get_order_status(
        &self,
        _symbol: &str,
        order_id: &str,
    ) -> Result<OrderSnapshot, GatewayError> {
        let inner = self.inner.lock();
        if inner.fail_status {
            return Err(GatewayError::Transport("status query timed out".into()));
        }
        let order = inner
            .orders
            .get(order_id)
            .ok_or_else(|| GatewayError::Api {
                code: -2013,
                message: "Order does not exist.".into(),
            })?;
        let (avg_price, executed_qty) = match (order.order_type, order.status) {
            (OrderType::Market, status) if status.is_filled() => (
                inner.fill_price.unwrap_or(inner.ticker),
                inner.market_orders.last().map(|(_, q)| *q).unwrap_or_default(),
            ),
            _ => (Decimal::ZERO, Decimal::ZERO),
        };
        Ok(OrderSnapshot {
            status: order.status,
            avg_price,
            executed_qty,
        })
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &str) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        inner.canceled.push(order_id.to_string());
        match inner.orders.get_mut(order_id) {
            Some(order) if order.status == OrderStatus::New => {
                order.status = OrderStatus::Canceled;
                Ok(())
            }
            _ => Err(GatewayError::Api {
                code: -2011,
                message: "Unknown order sent.".into(),
            }),
        }
    }

    async fn submit_close_position_order(
        &self,
        symbol: &str,
        side: OrderSide,
        kind: ProtectiveKind,
        stop_price: Decimal,
    ) -> Result<String, GatewayError> {
        let mut inner = self.inner.lock();
        *inner.protective_attempts.entry(kind).or_default() += 1;

        if let Some(&code) = inner.protective_rejections.get(&kind) {
            return Err(GatewayError::Api {
                code,
                message: "Order would immediately trigger.".into(),
            });
        }

        if let Some(remaining) = inner.protective_failures.get_mut(&kind) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GatewayError::Transport("connection reset".into()));
            }
        }

        let id = Self::next_id(&mut inner);
        inner.orders.insert(
            id.clone(),
            FakeOrder {
                symbol: symbol.to_string(),
                side,
                order_type: kind.order_type(),
                status: OrderStatus::New,
                stop_price,
            },
        );
        Ok(id)
    }

    async fn get_ticker_price(&self, _symbol: &str) -> Result<Decimal, GatewayError> {
        Ok(self.inner.lock().ticker)
    }

    async fn get_symbol_filters(&self, _symbol: &str) -> Result<SymbolFilters, GatewayError> {
        Ok(self.inner.lock().filters)
    }

    async fn list_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, GatewayError> {
        let inner = self.inner.lock();
        if inner.fail_open_orders {
            return Err(GatewayError::Transport("open orders timed out".into()));
        }
        Ok(Self::open_orders(&inner, symbol))
    }

    async fn get_position_amount(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        Ok(self
            .inner
            .lock()
            .positions
            .get(symbol)
            .copied()
            .unwrap_or_default())
    }
}

/// Ledger whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingLedger;

impl TradeLedger for FailingLedger {
    fn append(&self, _entry: LedgerEntry) -> Result<LedgerRecord, LedgerError> {
        Err(LedgerError::Io(std::io::Error::other("disk full")))
    }

    fn history(&self, _limit: Option<usize>) -> Result<Vec<LedgerRecord>, LedgerError> {
        Ok(Vec::new())
    }

    fn stats(&self) -> Result<HistoryStats, LedgerError> {
        Ok(HistoryStats::default())
    }
}

/// Engine wired to a fake exchange, a temp state file and an in-memory ledger.
pub struct TestHarness {
    pub engine: SharedEngine,
    pub fake: Arc<FakeGateway>,
    pub store: SharedStateStore,
    pub ledger: Arc<MemoryLedger>,
    pub locks: SharedSymbolLocks,
    pub metrics: SharedMetrics,
    _dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let ledger = Arc::new(MemoryLedger::new());
        Self::build(config, ledger.clone(), ledger)
    }

    pub fn with_failing_ledger() -> Self {
        Self::build(fast_config(), Arc::new(FailingLedger), Arc::new(MemoryLedger::new()))
    }

    fn build(config: EngineConfig, ledger: SharedLedger, memory: Arc<MemoryLedger>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeGateway::new());
        let store = create_state_store(dir.path().join("state.json"));
        let metrics = create_metrics(config.poll_interval);
        let engine = Arc::new(PositionLifecycleEngine::new(
            Arc::new(Ladder::default()),
            fake.clone(),
            store.clone(),
            ledger,
            metrics.clone(),
            config,
        ));

        Self {
            engine,
            fake,
            store,
            ledger: memory,
            locks: create_symbol_locks(),
            metrics,
            _dir: dir,
        }
    }

    pub fn router(&self) -> SignalRouter {
        SignalRouter::new(self.engine.clone(), self.locks.clone(), "ETHUSDC")
    }

    pub fn monitor(&self) -> PositionMonitor {
        PositionMonitor::new(self.engine.clone(), self.locks.clone())
    }
}

/// Persist an active position at `level` entered at 2000, `age` ago, with
/// both protective legs resting on the fake exchange.
pub async fn seed_position(
    h: &TestHarness,
    symbol: &str,
    direction: Direction,
    level: u32,
    age: chrono::Duration,
) -> Position {
    let ladder = Ladder::default();
    let config = ladder.level(level).unwrap();
    let entry_price = dec!(2000);
    let quantity = ladder::quantity(config.capital, config.leverage, entry_price, dec!(0.001)).unwrap();
    let prices = ladder::protective_prices(entry_price, direction, config, dec!(0.01));

    let exit = direction.exit_side();
    let tp = h
        .fake
        .submit_close_position_order(symbol, exit, ProtectiveKind::TakeProfit, prices.take_profit)
        .await
        .unwrap();
    let sl = h
        .fake
        .submit_close_position_order(symbol, exit, ProtectiveKind::StopLoss, prices.stop_loss)
        .await
        .unwrap();
    let signed = match direction {
        Direction::Buy => quantity,
        Direction::Sell => -quantity,
    };
    h.fake.set_position_amount(symbol, signed);

    let position = Position::open(
        symbol,
        direction,
        level,
        config,
        EntryFill {
            order_id: format!("entry-{}", symbol),
            price: entry_price,
            quantity,
        },
        Protection {
            take_profit_order_id: Some(tp),
            stop_loss_order_id: Some(sl),
        },
        Utc::now() - age,
        None,
    );
    let stored = position.clone();
    h.store
        .update(move |s| {
            s.positions.insert(stored.symbol.clone(), stored);
        })
        .unwrap();
    position
}
