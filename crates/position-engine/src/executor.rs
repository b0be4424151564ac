//! Entry and protective order placement.

use common::RetryPolicy;
use execution_core::ladder::{self, ProtectivePrices};
use execution_core::{
    Direction, EntryFill, GatewayError, LadderLevel, OrderSide, Protection, ProtectiveKind,
    SharedGateway,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Tick size used for trigger prices when the symbol's filters are unavailable.
const FALLBACK_TICK_SIZE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Places entries and TP/SL legs through the gateway.
pub struct OrderExecutor {
    gateway: SharedGateway,
    fill_polling: RetryPolicy,
    protection_retry: RetryPolicy,
}

impl OrderExecutor {
    pub fn new(gateway: SharedGateway, config: &EngineConfig) -> Self {
        Self {
            gateway,
            fill_polling: RetryPolicy::new(config.fill_poll_attempts, config.fill_poll_interval),
            protection_retry: RetryPolicy::new(
                config.protection_retries,
                config.protection_retry_delay,
            ),
        }
    }

    pub fn gateway(&self) -> &SharedGateway {
        &self.gateway
    }

    /// Set leverage, send a market entry and wait for its fill.
    ///
    /// The fill price is the order's average price. When the status never
    /// settles within the polling budget, the current ticker price is used.
    pub async fn open_entry(
        &self,
        symbol: &str,
        signal: Direction,
        quantity: Decimal,
        level: &LadderLevel,
    ) -> Result<EntryFill, EngineError> {
        self.gateway.set_leverage(symbol, level.leverage).await?;

        let order_id = self
            .gateway
            .submit_market_order(symbol, signal.entry_side(), quantity)
            .await?;
        info!(
            symbol = %symbol,
            order_id = %order_id,
            side = %signal,
            quantity = %quantity,
            leverage = level.leverage,
            "entry order submitted"
        );

        let attempts = self.fill_polling.max_attempts();
        for attempt in 1..=attempts {
            match self.gateway.get_order_status(symbol, &order_id).await {
                Ok(snapshot) if snapshot.status.is_filled() && snapshot.avg_price > Decimal::ZERO => {
                    let filled_qty = if snapshot.executed_qty > Decimal::ZERO {
                        snapshot.executed_qty
                    } else {
                        quantity
                    };
                    info!(
                        symbol = %symbol,
                        order_id = %order_id,
                        price = %snapshot.avg_price,
                        quantity = %filled_qty,
                        "entry filled"
                    );
                    return Ok(EntryFill {
                        order_id,
                        price: snapshot.avg_price,
                        quantity: filled_qty,
                    });
                }
                Ok(snapshot) if snapshot.status.is_rejected() => {
                    warn!(symbol = %symbol, order_id = %order_id, status = %snapshot.status, "entry order not filled");
                    return Err(EngineError::OrderRejected {
                        symbol: symbol.to_string(),
                        order_id,
                        status: snapshot.status,
                    });
                }
                Ok(snapshot) => {
                    debug!(symbol = %symbol, order_id = %order_id, status = %snapshot.status, attempt, "waiting for fill");
                }
                Err(e) => {
                    warn!(symbol = %symbol, order_id = %order_id, attempt, error = %e, "order status query failed");
                }
            }

            if attempt < attempts && !self.fill_polling.delay().is_zero() {
                tokio::time::sleep(self.fill_polling.delay()).await;
            }
        }

        let price = self.gateway.get_ticker_price(symbol).await?;
        warn!(
            symbol = %symbol,
            order_id = %order_id,
            price = %price,
            "fill not confirmed, using ticker price as entry"
        );
        Ok(EntryFill {
            order_id,
            price,
            quantity,
        })
    }

    /// Place the take-profit and stop-loss legs for an entry at `entry_price`.
    ///
    /// Never fails: a leg that cannot be placed after all retries is left
    /// empty and the position is reported as degraded.
    pub async fn place_protection(
        &self,
        symbol: &str,
        signal: Direction,
        entry_price: Decimal,
        level: &LadderLevel,
    ) -> (Protection, ProtectivePrices) {
        let tick_size = match self.gateway.get_symbol_filters(symbol).await {
            Ok(filters) => filters.tick_size,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "symbol filters unavailable, using fallback tick size");
                FALLBACK_TICK_SIZE
            }
        };

        let prices = ladder::protective_prices(entry_price, signal, level, tick_size);
        let side = signal.exit_side();

        let protection = Protection {
            take_profit_order_id: self
                .place_leg(symbol, side, ProtectiveKind::TakeProfit, prices.take_profit)
                .await,
            stop_loss_order_id: self
                .place_leg(symbol, side, ProtectiveKind::StopLoss, prices.stop_loss)
                .await,
        };

        if protection.is_degraded() {
            warn!(
                symbol = %symbol,
                take_profit_order_id = ?protection.take_profit_order_id,
                stop_loss_order_id = ?protection.stop_loss_order_id,
                "ProtectionPlacementDegraded: position is missing a protective leg"
            );
        } else {
            info!(
                symbol = %symbol,
                take_profit = %prices.take_profit,
                stop_loss = %prices.stop_loss,
                "protection placed"
            );
        }

        (protection, prices)
    }

    async fn place_leg(
        &self,
        symbol: &str,
        side: OrderSide,
        kind: ProtectiveKind,
        stop_price: Decimal,
    ) -> Option<String> {
        let label = format!("{} {}", kind, symbol);
        let gateway = &self.gateway;

        self.protection_retry
            .run_if(&label, GatewayError::is_retryable, |_| {
                gateway.submit_close_position_order(symbol, side, kind, stop_price)
            })
            .await
            .inspect_err(|e| {
                warn!(symbol = %symbol, leg = %kind, stop_price = %stop_price, error = %e, "protective leg not placed");
            })
            .ok()
    }

    /// Cancel an order, logging instead of failing.
    pub async fn cancel_best_effort(&self, symbol: &str, order_id: &str) {
        match self.gateway.cancel_order(symbol, order_id).await {
            Ok(()) => debug!(symbol = %symbol, order_id = %order_id, "order canceled"),
            Err(e) => warn!(symbol = %symbol, order_id = %order_id, error = %e, "cancel failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fast_config, FakeGateway};
    use execution_core::{Ladder, OrderStatus};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn executor(fake: &Arc<FakeGateway>) -> OrderExecutor {
        OrderExecutor::new(fake.clone(), &fast_config())
    }

    #[tokio::test]
    async fn test_open_entry_uses_average_fill_price() {
        let fake = Arc::new(FakeGateway::new());
        fake.set_fill_price(dec!(2000));
        let ladder = Ladder::default();

        let fill = executor(&fake)
            .open_entry("ETHUSDC", Direction::Buy, dec!(0.025), ladder.level(1).unwrap())
            .await
            .unwrap();

        assert_eq!(fill.price, dec!(2000));
        assert_eq!(fill.quantity, dec!(0.025));
        assert_eq!(fake.leverage("ETHUSDC"), Some(50));
        assert_eq!(fake.market_orders(), vec![(OrderSide::Buy, dec!(0.025))]);
    }

    #[tokio::test]
    async fn test_open_entry_rejected() {
        let fake = Arc::new(FakeGateway::new());
        fake.set_entry_status(OrderStatus::Expired);
        let ladder = Ladder::default();

        let result = executor(&fake)
            .open_entry("ETHUSDC", Direction::Sell, dec!(0.025), ladder.level(1).unwrap())
            .await;

        assert!(matches!(
            result,
            Err(EngineError::OrderRejected { status: OrderStatus::Expired, .. })
        ));
    }

    #[tokio::test]
    async fn test_open_entry_falls_back_to_ticker() {
        let fake = Arc::new(FakeGateway::new());
        fake.set_entry_status(OrderStatus::New);
        fake.set_ticker(dec!(2001.5));
        let ladder = Ladder::default();

        let fill = executor(&fake)
            .open_entry("ETHUSDC", Direction::Buy, dec!(0.025), ladder.level(1).unwrap())
            .await
            .unwrap();

        assert_eq!(fill.price, dec!(2001.5));
        assert_eq!(fill.quantity, dec!(0.025));
    }

    #[tokio::test]
    async fn test_open_entry_survives_status_errors() {
        let fake = Arc::new(FakeGateway::new());
        fake.fail_status_queries(true);
        fake.set_ticker(dec!(1999));
        let ladder = Ladder::default();

        let fill = executor(&fake)
            .open_entry("ETHUSDC", Direction::Buy, dec!(0.025), ladder.level(1).unwrap())
            .await
            .unwrap();
        assert_eq!(fill.price, dec!(1999));
    }

    #[tokio::test]
    async fn test_open_entry_leverage_failure_places_nothing() {
        let fake = Arc::new(FakeGateway::new());
        fake.fail_leverage(true);
        let ladder = Ladder::default();

        let result = executor(&fake)
            .open_entry("ETHUSDC", Direction::Buy, dec!(0.025), ladder.level(1).unwrap())
            .await;

        assert!(matches!(result, Err(EngineError::Exchange(GatewayError::Api { .. }))));
        assert!(fake.market_orders().is_empty());
    }

    #[tokio::test]
    async fn test_place_protection_both_legs() {
        let fake = Arc::new(FakeGateway::new());
        let ladder = Ladder::default();

        let (protection, prices) = executor(&fake)
            .place_protection("ETHUSDC", Direction::Buy, dec!(2000), ladder.level(1).unwrap())
            .await;

        assert!(!protection.is_degraded());
        assert_eq!(prices.take_profit, dec!(2006.00));
        assert_eq!(prices.stop_loss, dec!(1994.00));

        let open = fake.open_protective("ETHUSDC");
        assert_eq!(open.len(), 2);
        assert!(open.iter().all(|o| o.side == OrderSide::Sell));
    }

    #[tokio::test]
    async fn test_place_protection_retries_then_degrades() {
        let fake = Arc::new(FakeGateway::new());
        fake.fail_protective(ProtectiveKind::StopLoss, u32::MAX);
        fake.fail_protective(ProtectiveKind::TakeProfit, 2);
        let ladder = Ladder::default();

        let (protection, _) = executor(&fake)
            .place_protection("ETHUSDC", Direction::Sell, dec!(2000), ladder.level(1).unwrap())
            .await;

        // TP succeeds on the third attempt, SL never does
        assert!(protection.take_profit_order_id.is_some());
        assert!(protection.stop_loss_order_id.is_none());
        assert!(protection.is_degraded());
        assert_eq!(fake.protective_attempts(ProtectiveKind::StopLoss), 3);
        assert_eq!(fake.protective_attempts(ProtectiveKind::TakeProfit), 3);
    }

    #[tokio::test]
    async fn test_place_protection_does_not_retry_rejections() {
        let fake = Arc::new(FakeGateway::new());
        fake.reject_protective(ProtectiveKind::TakeProfit, -2021);
        let ladder = Ladder::default();

        let (protection, _) = executor(&fake)
            .place_protection("ETHUSDC", Direction::Buy, dec!(2000), ladder.level(1).unwrap())
            .await;

        assert!(protection.take_profit_order_id.is_none());
        assert!(protection.stop_loss_order_id.is_some());
        assert_eq!(fake.protective_attempts(ProtectiveKind::TakeProfit), 1);
        assert_eq!(fake.protective_attempts(ProtectiveKind::StopLoss), 1);
    }
}
