//! Exchange gateway abstraction.
//!
//! Everything the engine needs from an exchange, behind one object-safe trait
//! so the Binance client and in-memory fakes are interchangeable.

use crate::order::{OrderSide, OrderStatus, OrderType, ProtectiveKind};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network / timeout / rate-limit failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The exchange rejected the request.
    #[error("exchange error {code}: {message}")]
    Api { code: i64, message: String },

    /// Response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

impl GatewayError {
    /// Failures worth retrying on the next attempt or cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

/// Point-in-time view of one order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSnapshot {
    pub status: OrderStatus,
    /// Zero until something executes.
    pub avg_price: Decimal,
    pub executed_qty: Decimal,
}

/// Lot and price increments for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolFilters {
    pub step_size: Decimal,
    pub tick_size: Decimal,
}

/// An order resting on the book.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    /// `None` for order types the bot never places.
    pub order_type: Option<OrderType>,
    pub status: OrderStatus,
    pub stop_price: Decimal,
}

impl OpenOrder {
    pub fn is_protective(&self) -> bool {
        self.order_type.is_some_and(|t| t.is_protective())
    }
}

/// Exchange operations used by the position engine.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), GatewayError>;

    /// Submit a market order, returning the exchange order id.
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<String, GatewayError>;

    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderSnapshot, GatewayError>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), GatewayError>;

    /// Place a trigger order that closes the whole position at `stop_price`.
    async fn submit_close_position_order(
        &self,
        symbol: &str,
        side: OrderSide,
        kind: ProtectiveKind,
        stop_price: Decimal,
    ) -> Result<String, GatewayError>;

    async fn get_ticker_price(&self, symbol: &str) -> Result<Decimal, GatewayError>;

    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters, GatewayError>;

    async fn list_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, GatewayError>;

    /// Signed position size (negative = short, zero = flat).
    async fn get_position_amount(&self, symbol: &str) -> Result<Decimal, GatewayError>;
}

/// Shared gateway handle.
pub type SharedGateway = Arc<dyn ExchangeGateway>;
