//! Inbound signal handling.
//!
//! Order of precedence once the symbol's lock is held:
//! pending reinforcement, duplicate alert, already-open position, open.

use std::str::FromStr;

use chrono::Utc;
use execution_core::{Direction, Position};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use state_store::{dedup_key, SharedSymbolLocks};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::lifecycle::SharedEngine;

/// Raw webhook payload. Every field is optional so validation can report
/// what is wrong instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundSignal {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub signal: Option<String>,
    /// Number or numeric string.
    #[serde(default)]
    pub price: Option<Value>,
    /// Alert time, any scalar. Part of the dedup key.
    #[serde(default)]
    pub time: Option<Value>,
}

/// A signal that passed validation.
#[derive(Debug, Clone, PartialEq)]
struct ValidSignal {
    symbol: String,
    direction: Direction,
    price: Decimal,
    event_time: String,
}

fn parse_price(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn event_time(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        // No usable time: the receive time keeps distinct alerts distinct
        _ => Utc::now().timestamp_millis().to_string(),
    }
}

impl InboundSignal {
    fn validate(&self, default_symbol: &str) -> Result<ValidSignal, EngineError> {
        let direction = self
            .signal
            .as_deref()
            .and_then(Direction::parse)
            .ok_or_else(|| {
                EngineError::InvalidSignal(format!(
                    "signal must be BUY or SELL, got {:?}",
                    self.signal
                ))
            })?;

        let price = self
            .price
            .as_ref()
            .and_then(parse_price)
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| EngineError::InvalidSignal("price must be a positive number".into()))?;

        let symbol = self
            .symbol
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default_symbol)
            .to_uppercase();

        Ok(ValidSignal {
            symbol,
            direction,
            price,
            event_time: event_time(self.time.as_ref()),
        })
    }
}

/// Why a valid signal did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    DuplicateAlert,
    PositionAlreadyOpen,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::DuplicateAlert => "duplicate_alert",
            IgnoreReason::PositionAlreadyOpen => "position_already_open",
        }
    }
}

/// What a signal did.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Opened(Position),
    Reinforced(Position),
    Ignored(IgnoreReason),
}

/// Position summary returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalDetails {
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub capital: Decimal,
    pub leverage: u32,
    pub order_id: Option<String>,
    pub current_level: u32,
}

impl From<&Position> for SignalDetails {
    fn from(position: &Position) -> Self {
        Self {
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            entry_price: position.entry_price,
            capital: position.capital,
            leverage: position.leverage,
            order_id: position.entry_order_id.clone(),
            current_level: position.current_level,
        }
    }
}

/// Webhook response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<SignalDetails>,
}

impl SignalResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            details: None,
        }
    }
}

impl SignalOutcome {
    pub fn to_response(&self) -> SignalResponse {
        match self {
            SignalOutcome::Opened(p) => SignalResponse {
                status: "success",
                message: format!("Position {} opened (Level {})", p.signal, p.current_level),
                details: Some(SignalDetails::from(p)),
            },
            SignalOutcome::Reinforced(p) => SignalResponse {
                status: "success",
                message: format!("Reinforcement {} (Level {})", p.signal, p.current_level),
                details: Some(SignalDetails::from(p)),
            },
            SignalOutcome::Ignored(reason) => SignalResponse {
                status: "ignored",
                message: reason.as_str().to_string(),
                details: None,
            },
        }
    }
}

/// Entry point for inbound signals.
pub struct SignalRouter {
    engine: SharedEngine,
    locks: SharedSymbolLocks,
    default_symbol: String,
}

impl SignalRouter {
    pub fn new(
        engine: SharedEngine,
        locks: SharedSymbolLocks,
        default_symbol: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            locks,
            default_symbol: default_symbol.into(),
        }
    }

    pub fn default_symbol(&self) -> &str {
        &self.default_symbol
    }

    /// Validate, serialize on the symbol's lock and dispatch.
    pub async fn handle(&self, signal: InboundSignal) -> Result<SignalOutcome, EngineError> {
        let metrics = self.engine.metrics();
        metrics.inc_signals_received();

        let result = self.dispatch(signal).await;
        match &result {
            Ok(SignalOutcome::Ignored(IgnoreReason::DuplicateAlert)) => {
                metrics.inc_duplicates();
                metrics.inc_ignored();
            }
            Ok(SignalOutcome::Ignored(_)) => metrics.inc_ignored(),
            Ok(_) => {}
            Err(e) => {
                metrics.inc_rejected();
                warn!(error = %e, "signal rejected");
            }
        }
        result
    }

    async fn dispatch(&self, signal: InboundSignal) -> Result<SignalOutcome, EngineError> {
        let signal = signal.validate(&self.default_symbol)?;
        let symbol = signal.symbol.as_str();
        info!(
            symbol = %symbol,
            signal = %signal.direction,
            price = %signal.price,
            time = %signal.event_time,
            "signal received"
        );

        let _guard = self
            .locks
            .acquire(symbol, self.engine.config().lock_timeout)
            .await
            .ok_or_else(|| EngineError::SymbolBusy(symbol.to_string()))?;

        let state = self.engine.store().load()?;
        let existing = state.position(symbol);

        if existing.is_some_and(|p| p.pending_reinforcement) {
            let position = self
                .engine
                .reinforce(symbol, signal.direction, signal.price)
                .await?;
            return Ok(SignalOutcome::Reinforced(position));
        }

        let key = dedup_key(symbol, signal.direction, &signal.event_time);
        if state.is_processed(&key) {
            info!(symbol = %symbol, alert = %key, "duplicate alert ignored");
            return Ok(SignalOutcome::Ignored(IgnoreReason::DuplicateAlert));
        }

        if existing.is_some_and(|p| p.is_active) {
            if self.engine.has_footprint(symbol).await {
                info!(symbol = %symbol, "position already open, signal ignored");
                return Ok(SignalOutcome::Ignored(IgnoreReason::PositionAlreadyOpen));
            }
            self.engine.clear(symbol)?;
        }

        let position = self
            .engine
            .open(symbol, signal.direction, signal.price, key)
            .await?;
        Ok(SignalOutcome::Opened(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Evaluation;
    use crate::test_support::{seed_position, TestHarness};
    use chrono::Duration as ChronoDuration;
    use execution_core::CloseType;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use state_store::LedgerEvent;
    use std::time::Duration;

    fn inbound(value: Value) -> InboundSignal {
        serde_json::from_value(value).unwrap()
    }

    fn buy(time: i64) -> InboundSignal {
        inbound(json!({"symbol": "ETHUSDC", "signal": "BUY", "price": 2000, "time": time}))
    }

    #[test]
    fn test_validate_accepts_string_price_and_lowercase_signal() {
        let signal = inbound(json!({"signal": "sell", "price": "2000.50", "time": "t1"}))
            .validate("ETHUSDC")
            .unwrap();
        assert_eq!(signal.symbol, "ETHUSDC");
        assert_eq!(signal.direction, Direction::Sell);
        assert_eq!(signal.price, dec!(2000.50));
        assert_eq!(signal.event_time, "t1");
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        for payload in [
            json!({"price": 2000}),
            json!({"signal": "HOLD", "price": 2000}),
            json!({"signal": "BUY"}),
            json!({"signal": "BUY", "price": 0}),
            json!({"signal": "BUY", "price": "abc"}),
            json!({"signal": "BUY", "price": -5}),
        ] {
            assert!(matches!(
                inbound(payload).validate("ETHUSDC"),
                Err(EngineError::InvalidSignal(_))
            ));
        }
    }

    #[test]
    fn test_event_time_from_scalars() {
        assert_eq!(event_time(Some(&json!(1700000000))), "1700000000");
        assert_eq!(event_time(Some(&json!("2024-01-01T00:00:00Z"))), "2024-01-01T00:00:00Z");
        assert!(!event_time(None).is_empty());
    }

    #[test]
    fn test_response_shapes() {
        let ignored = SignalOutcome::Ignored(IgnoreReason::DuplicateAlert).to_response();
        let body = serde_json::to_value(&ignored).unwrap();
        assert_eq!(body, json!({"status": "ignored", "message": "duplicate_alert"}));

        let error = serde_json::to_value(SignalResponse::error("boom")).unwrap();
        assert_eq!(error["status"], "error");
    }

    #[tokio::test]
    async fn test_duplicate_alert_is_idempotent() {
        let h = TestHarness::new();
        let router = h.router();

        let first = router.handle(buy(1700000000)).await.unwrap();
        assert!(matches!(first, SignalOutcome::Opened(_)));
        let response = first.to_response();
        assert_eq!(response.status, "success");
        assert_eq!(response.message, "Position BUY opened (Level 1)");
        assert_eq!(response.details.unwrap().quantity, dec!(0.025));

        let second = router.handle(buy(1700000000)).await.unwrap();
        assert_eq!(second, SignalOutcome::Ignored(IgnoreReason::DuplicateAlert));

        assert_eq!(h.ledger.events(LedgerEvent::PositionOpened).len(), 1);
        assert_eq!(h.fake.market_orders().len(), 1);
        assert_eq!(h.metrics.duplicates(), 1);
        assert_eq!(h.metrics.signals_received(), 2);
    }

    #[tokio::test]
    async fn test_open_position_ignores_new_alert() {
        let h = TestHarness::new();
        let router = h.router();

        router.handle(buy(1)).await.unwrap();
        let outcome = router.handle(buy(2)).await.unwrap();

        assert_eq!(outcome, SignalOutcome::Ignored(IgnoreReason::PositionAlreadyOpen));
        assert_eq!(h.fake.market_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_record_is_cleared_and_reopened() {
        let h = TestHarness::new();
        let router = h.router();

        router.handle(buy(1)).await.unwrap();
        // position gone on the exchange, monitor has not noticed yet
        h.fake.cancel_all("ETHUSDC");
        h.fake.set_position_amount("ETHUSDC", Decimal::ZERO);

        let outcome = router.handle(buy(2)).await.unwrap();
        assert!(matches!(outcome, SignalOutcome::Opened(_)));
        assert_eq!(h.fake.market_orders().len(), 2);
    }

    #[tokio::test]
    async fn test_reinforcement_ignores_direction_and_dedup() {
        let h = TestHarness::new();
        let position = seed_position(&h, "ETHUSDC", Direction::Buy, 2, ChronoDuration::minutes(5)).await;
        h.fake.trigger(position.stop_loss_order_id.as_deref().unwrap());
        assert_eq!(
            h.engine.evaluate("ETHUSDC", Utc::now()).await.unwrap(),
            Evaluation::Closed(CloseType::StopLoss)
        );
        let closed = h.ledger.events(LedgerEvent::PositionClosed);
        assert_eq!(closed[0].close_type, Some(CloseType::StopLoss));
        assert_eq!(closed[0].next_reinforcement_level, 3);

        // opposite direction, and a key that was already seen
        h.store.update(|s| s.mark_processed("ETHUSDC_SELL_9", 0)).unwrap();
        let sell = inbound(json!({"symbol": "ethusdc", "signal": "SELL", "price": 2000, "time": 9}));
        let outcome = h.router().handle(sell).await.unwrap();

        let SignalOutcome::Reinforced(reinforced) = outcome.clone() else {
            panic!("expected reinforcement, got {:?}", outcome);
        };
        assert_eq!(reinforced.signal, Direction::Sell);
        assert_eq!(reinforced.current_level, 3);
        assert_eq!(outcome.to_response().message, "Reinforcement SELL (Level 3)");

        let stored = h.store.load().unwrap();
        let stored = stored.position("ETHUSDC").unwrap();
        assert!(stored.is_active && !stored.pending_reinforcement);
    }

    #[tokio::test]
    async fn test_after_last_level_next_signal_opens_level_one() {
        let h = TestHarness::new();
        let position = seed_position(&h, "ETHUSDC", Direction::Buy, 5, ChronoDuration::minutes(5)).await;
        h.fake.trigger(position.stop_loss_order_id.as_deref().unwrap());
        h.engine.evaluate("ETHUSDC", Utc::now()).await.unwrap();

        let outcome = h.router().handle(buy(42)).await.unwrap();
        let SignalOutcome::Opened(opened) = outcome else {
            panic!("expected open, got {:?}", outcome);
        };
        assert_eq!(opened.current_level, 1);
        assert_eq!(opened.capital, dec!(1));
    }

    #[tokio::test]
    async fn test_busy_symbol() {
        let h = TestHarness::with_config(
            crate::test_support::fast_config().with_lock_timeout(Duration::from_millis(20)),
        );
        let _held = h.locks.try_acquire("ETHUSDC").unwrap();

        let result = h.router().handle(buy(1)).await;
        assert!(matches!(result, Err(EngineError::SymbolBusy(s)) if s == "ETHUSDC"));
        assert_eq!(h.metrics.rejected(), 1);
    }

    #[tokio::test]
    async fn test_lock_released_after_error() {
        let h = TestHarness::new();
        h.fake.set_entry_status(execution_core::OrderStatus::Rejected);

        let result = h.router().handle(buy(1)).await;
        assert!(matches!(result, Err(EngineError::OrderRejected { .. })));
        assert!(h.locks.try_acquire("ETHUSDC").is_some());
        // a rejected entry is not recorded as processed
        assert!(!h.store.load().unwrap().is_processed("ETHUSDC_BUY_1"));
    }

    #[tokio::test]
    async fn test_unsizable_price_is_invalid_quantity() {
        let h = TestHarness::new();
        let signal = inbound(json!({
            "signal": "BUY",
            "price": "0.0000000000000000000000000001",
            "time": 1
        }));

        let result = h.router().handle(signal).await;

        assert!(matches!(result, Err(EngineError::InvalidQuantity(_))));
        assert!(h.fake.market_orders().is_empty());
        assert!(h.locks.try_acquire("ETHUSDC").is_some());
        assert!(h.store.load().unwrap().position("ETHUSDC").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_signals_open_once() {
        let h = TestHarness::new();
        let router = std::sync::Arc::new(h.router());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let router = router.clone();
                tokio::spawn(async move { router.handle(buy(7)).await })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            if let Ok(SignalOutcome::Opened(_)) = handle.await.unwrap() {
                opened += 1;
            }
        }
        assert_eq!(opened, 1);
        assert_eq!(h.fake.market_orders().len(), 1);
    }
}
