//! Per-symbol position state machine.
//!
//! ```text
//! NONE ──open──> ACTIVE ──TP──> NONE
//!                  │ ──manual──> NONE
//!                  └──SL──> PENDING_REINFORCEMENT ──next signal──> ACTIVE (level + 1)
//!                      (at the last level the chain ends: NONE)
//! ```
//!
//! Every transition expects the caller to hold the symbol's lock, and ends
//! with a targeted state update so records of other symbols are never lost.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use execution_core::ladder::{self, ProtectivePrices};
use execution_core::{
    CloseType, Direction, EntryFill, Ladder, LadderLevel, Position, Protection, SharedGateway,
};
use metrics::SharedMetrics;
use rust_decimal::Decimal;
use state_store::{LedgerEntry, LedgerEvent, SharedLedger, SharedStateStore};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::executor::OrderExecutor;

/// Result of evaluating one active position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// No record, or not active.
    NotActive,
    /// Still open.
    Unchanged,
    /// A status query failed; manual-close detection was skipped.
    Inconclusive,
    /// The position was closed this cycle.
    Closed(CloseType),
}

/// The position state machine and its collaborators.
pub struct PositionLifecycleEngine {
    ladder: Arc<Ladder>,
    executor: OrderExecutor,
    store: SharedStateStore,
    ledger: SharedLedger,
    metrics: SharedMetrics,
    config: EngineConfig,
}

/// A filled entry with its protection.
struct Entry {
    fill: EntryFill,
    protection: Protection,
    prices: ProtectivePrices,
    opened_at: DateTime<Utc>,
}

/// Shared engine handle.
pub type SharedEngine = Arc<PositionLifecycleEngine>;

/// `position` has been open for longer than `grace`.
fn older_than(position: &Position, now: DateTime<Utc>, grace: Duration) -> bool {
    position
        .age(now)
        .to_std()
        .map(|age| age > grace)
        .unwrap_or(false)
}

impl PositionLifecycleEngine {
    pub fn new(
        ladder: Arc<Ladder>,
        gateway: SharedGateway,
        store: SharedStateStore,
        ledger: SharedLedger,
        metrics: SharedMetrics,
        config: EngineConfig,
    ) -> Self {
        Self {
            executor: OrderExecutor::new(gateway, &config),
            ladder,
            store,
            ledger,
            metrics,
            config,
        }
    }

    pub fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    pub fn gateway(&self) -> &SharedGateway {
        self.executor.gateway()
    }

    pub fn store(&self) -> &SharedStateStore {
        &self.store
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Entry transitions
    // =========================================================================

    /// NONE -> ACTIVE at level 1. Persists the position and the dedup key together.
    pub async fn open(
        &self,
        symbol: &str,
        signal: Direction,
        price: Decimal,
        alert_key: String,
    ) -> Result<Position, EngineError> {
        let level = 1;
        let config = self.ladder.level(level)?;
        let entry = self.enter(symbol, signal, price, config).await?;
        let position = Position::open(
            symbol,
            signal,
            level,
            config,
            entry.fill,
            entry.protection,
            entry.opened_at,
            Some(alert_key.clone()),
        );
        let prices = entry.prices;

        let next = self.ladder.next_after_stop_loss(level).unwrap_or(1);
        self.record(LedgerEntry::opened(
            LedgerEvent::PositionOpened,
            &position,
            prices,
            next,
        ));

        let processed_at = position.opened_at.timestamp();
        let persisted = position.clone();
        self.store.update(move |state| {
            state.positions.insert(persisted.symbol.clone(), persisted);
            state.mark_processed(alert_key, processed_at);
        })?;

        self.metrics.inc_positions_opened();
        info!(
            symbol = %symbol,
            signal = %signal,
            level,
            entry_price = %position.entry_price,
            quantity = %position.quantity,
            "position opened"
        );
        Ok(position)
    }

    /// PENDING_REINFORCEMENT -> ACTIVE at the armed level, in the new signal's direction.
    pub async fn reinforce(
        &self,
        symbol: &str,
        signal: Direction,
        price: Decimal,
    ) -> Result<Position, EngineError> {
        let mut position = self
            .store
            .load()?
            .position(symbol)
            .cloned()
            .ok_or_else(|| EngineError::InvalidState {
                symbol: symbol.to_string(),
                reason: "no position record".into(),
            })?;

        let level = match position.next_level {
            Some(level) if position.pending_reinforcement && level > position.current_level => level,
            _ => {
                return Err(EngineError::InvalidState {
                    symbol: symbol.to_string(),
                    reason: "no reinforcement pending".into(),
                })
            }
        };
        let config = self.ladder.level(level)?;

        let entry = self.enter(symbol, signal, price, config).await?;
        let prices = entry.prices;
        if !position.reinforce(
            signal,
            level,
            config,
            entry.fill,
            entry.protection,
            entry.opened_at,
        ) {
            return Err(EngineError::InvalidState {
                symbol: symbol.to_string(),
                reason: format!("cannot reinforce to level {}", level),
            });
        }

        let next = self.ladder.next_after_stop_loss(level).unwrap_or(1);
        self.record(LedgerEntry::opened(
            LedgerEvent::ReinforcementOpened,
            &position,
            prices,
            next,
        ));

        let persisted = position.clone();
        self.store.update(move |state| {
            state.positions.insert(persisted.symbol.clone(), persisted);
        })?;

        self.metrics.inc_reinforcements();
        info!(
            symbol = %symbol,
            signal = %signal,
            level,
            entry_price = %position.entry_price,
            quantity = %position.quantity,
            "reinforcement opened"
        );
        Ok(position)
    }

    /// Size, enter and protect.
    async fn enter(
        &self,
        symbol: &str,
        signal: Direction,
        price: Decimal,
        config: &LadderLevel,
    ) -> Result<Entry, EngineError> {
        let filters = self.gateway().get_symbol_filters(symbol).await?;
        let quantity = ladder::quantity(config.capital, config.leverage, price, filters.step_size)?;

        let fill = self
            .executor
            .open_entry(symbol, signal, quantity, config)
            .await?;
        let (protection, prices) = self
            .executor
            .place_protection(symbol, signal, fill.price, config)
            .await;

        Ok(Entry {
            fill,
            protection,
            prices,
            opened_at: Utc::now(),
        })
    }

    /// Drop a record whose position no longer exists on the exchange.
    pub fn clear(&self, symbol: &str) -> Result<(), EngineError> {
        self.store.update(|state| {
            state.positions.remove(symbol);
        })?;
        info!(symbol = %symbol, "stale position record cleared");
        Ok(())
    }

    // =========================================================================
    // Monitoring
    // =========================================================================

    /// Check an active position for a TP fill, an SL fill, then a manual close.
    ///
    /// Manual-close detection only runs when both status queries succeeded
    /// and the position is older than the manual-close grace.
    pub async fn evaluate(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, EngineError> {
        let position = match self.store.load()?.position(symbol) {
            Some(p) if p.is_active => p.clone(),
            _ => return Ok(Evaluation::NotActive),
        };

        let mut inconclusive = false;

        if let Some(order_id) = &position.take_profit_order_id {
            match self.gateway().get_order_status(symbol, order_id).await {
                Ok(snapshot) if snapshot.status.is_filled() => {
                    self.close_take_profit(&position).await?;
                    return Ok(Evaluation::Closed(CloseType::TakeProfit));
                }
                Ok(snapshot) => {
                    debug!(symbol = %symbol, order_id = %order_id, status = %snapshot.status, "take profit open");
                }
                Err(e) => {
                    warn!(symbol = %symbol, order_id = %order_id, error = %e, "take profit status query failed");
                    inconclusive = true;
                }
            }
        }

        if let Some(order_id) = &position.stop_loss_order_id {
            match self.gateway().get_order_status(symbol, order_id).await {
                Ok(snapshot) if snapshot.status.is_filled() => {
                    self.close_stop_loss(&position).await?;
                    return Ok(Evaluation::Closed(CloseType::StopLoss));
                }
                Ok(snapshot) => {
                    debug!(symbol = %symbol, order_id = %order_id, status = %snapshot.status, "stop loss open");
                }
                Err(e) => {
                    warn!(symbol = %symbol, order_id = %order_id, error = %e, "stop loss status query failed");
                    inconclusive = true;
                }
            }
        }

        if inconclusive {
            return Ok(Evaluation::Inconclusive);
        }

        if older_than(&position, now, self.config.manual_close_grace)
            && !self.has_footprint(symbol).await
        {
            self.close_manual(&position).await?;
            return Ok(Evaluation::Closed(CloseType::Manual));
        }

        Ok(Evaluation::Unchanged)
    }

    /// Whether the exchange still shows the position: a protective order is
    /// open or the position amount is non-zero. Query failures count as open.
    pub async fn has_footprint(&self, symbol: &str) -> bool {
        match self.gateway().list_open_orders(symbol).await {
            Ok(orders) if orders.iter().any(|o| o.is_protective()) => return true,
            Ok(_) => {}
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "open orders query failed, assuming position open");
                return true;
            }
        }

        match self.gateway().get_position_amount(symbol).await {
            Ok(amount) => !amount.is_zero(),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "position query failed, assuming position open");
                true
            }
        }
    }

    // =========================================================================
    // Close transitions
    // =========================================================================

    /// ACTIVE -> NONE after the take-profit leg fired.
    async fn close_take_profit(&self, position: &Position) -> Result<(), EngineError> {
        let symbol = &position.symbol;
        if let Some(order_id) = &position.stop_loss_order_id {
            self.executor.cancel_best_effort(symbol, order_id).await;
        }

        self.book_close(position, CloseType::TakeProfit, None, 1);
        self.persist_close(position, |p| p.close())?;

        self.metrics.inc_take_profits();
        info!(symbol = %symbol, level = position.current_level, "take profit hit, chain complete");
        Ok(())
    }

    /// ACTIVE -> PENDING_REINFORCEMENT, or NONE at the last level.
    async fn close_stop_loss(&self, position: &Position) -> Result<(), EngineError> {
        let symbol = &position.symbol;
        if let Some(order_id) = &position.take_profit_order_id {
            self.executor.cancel_best_effort(symbol, order_id).await;
        }

        let next = self.ladder.next_after_stop_loss(position.current_level);
        self.book_close(position, CloseType::StopLoss, None, next.unwrap_or(1));
        self.persist_close(position, |p| match next {
            Some(level) => p.arm_reinforcement(level),
            None => p.close(),
        })?;

        self.metrics.inc_stop_losses();
        match next {
            Some(level) => info!(
                symbol = %symbol,
                level = position.current_level,
                next_level = level,
                "stop loss hit, reinforcement armed for next signal"
            ),
            None => info!(
                symbol = %symbol,
                level = position.current_level,
                "stop loss hit at last level, chain terminated"
            ),
        }
        Ok(())
    }

    /// ACTIVE -> NONE after the position disappeared without a TP/SL fill.
    async fn close_manual(&self, position: &Position) -> Result<(), EngineError> {
        let symbol = &position.symbol;
        for order_id in [&position.take_profit_order_id, &position.stop_loss_order_id]
            .into_iter()
            .flatten()
        {
            self.executor.cancel_best_effort(symbol, order_id).await;
        }

        let price = match self.gateway().get_ticker_price(symbol).await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "ticker unavailable, booking manual close at entry");
                None
            }
        };

        self.book_close(position, CloseType::Manual, price, 1);
        self.persist_close(position, |p| p.close())?;

        self.metrics.inc_manual_closes();
        info!(symbol = %symbol, level = position.current_level, "manual close detected");
        Ok(())
    }

    /// Compute the PnL and append the close row.
    fn book_close(
        &self,
        position: &Position,
        close_type: CloseType,
        close_price: Option<Decimal>,
        next_level: u32,
    ) {
        let (price, pnl) = match ladder::try_close_price(&self.ladder, position, close_type, close_price)
            .and_then(|price| {
                ladder::try_realized_pnl(&self.ladder, position, close_type, close_price)
                    .map(|pnl| (price, pnl))
            }) {
            Ok(booked) => booked,
            Err(e) => {
                error!(symbol = %position.symbol, error = %e, "pnl calculation failed, booking zero");
                (position.entry_price, Decimal::ZERO)
            }
        };

        info!(
            symbol = %position.symbol,
            close_type = %close_type,
            close_price = %price,
            pnl = %pnl,
            "position closed"
        );
        self.record(LedgerEntry::closed(position, close_type, price, pnl, next_level));
    }

    /// Apply `transition` to the stored record if it is still the same position.
    fn persist_close(
        &self,
        position: &Position,
        transition: impl FnOnce(&mut Position),
    ) -> Result<(), EngineError> {
        self.store.update(|state| {
            match state.position_mut(&position.symbol) {
                Some(stored) if stored.entry_order_id == position.entry_order_id => {
                    transition(stored)
                }
                _ => warn!(symbol = %position.symbol, "position record changed during close"),
            }
        })?;
        Ok(())
    }

    /// Append to the ledger. Failures are logged and never block a transition.
    fn record(&self, entry: LedgerEntry) {
        let symbol = entry.symbol.clone();
        match self.ledger.append(entry) {
            Ok(record) => debug!(symbol = %symbol, id = record.id, event = ?record.event, "ledger row written"),
            Err(e) => error!(symbol = %symbol, error = %e, "ledger write failed"),
        }
    }
}
