//! Order side, type and status enums for USDⓈ-M futures.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a unique client order id (`{prefix}_{uuid}`).
///
/// Binance caps `newClientOrderId` at 36 characters, so keep the prefix short.
pub fn generate_client_order_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().as_simple())
}

/// Trade direction carried by a signal and stored on a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// Case-insensitive parse of `BUY` / `SELL`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    /// Side of the order that opens a position in this direction.
    pub fn entry_side(&self) -> OrderSide {
        match self {
            Self::Buy => OrderSide::Buy,
            Self::Sell => OrderSide::Sell,
        }
    }

    /// Side of the orders that close it (TP and SL legs).
    pub fn exit_side(&self) -> OrderSide {
        self.entry_side().opposite()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn from_binance_str(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn as_binance_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Futures order types used by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    TakeProfitMarket,
}

impl OrderType {
    pub fn from_binance_str(s: &str) -> Option<Self> {
        match s {
            "MARKET" => Some(Self::Market),
            "LIMIT" => Some(Self::Limit),
            "STOP_MARKET" => Some(Self::StopMarket),
            "TAKE_PROFIT_MARKET" => Some(Self::TakeProfitMarket),
            _ => None,
        }
    }

    pub fn as_binance_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopMarket => "STOP_MARKET",
            Self::TakeProfitMarket => "TAKE_PROFIT_MARKET",
        }
    }

    /// True for the close-position trigger orders used as TP/SL legs.
    pub fn is_protective(&self) -> bool {
        matches!(self, Self::StopMarket | Self::TakeProfitMarket)
    }
}

/// Which protective leg an order is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectiveKind {
    TakeProfit,
    StopLoss,
}

impl ProtectiveKind {
    pub fn order_type(&self) -> OrderType {
        match self {
            Self::TakeProfit => OrderType::TakeProfitMarket,
            Self::StopLoss => OrderType::StopMarket,
        }
    }
}

impl fmt::Display for ProtectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TakeProfit => f.write_str("TP"),
            Self::StopLoss => f.write_str("SL"),
        }
    }
}

/// Order status as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    /// Canceled by self-trade prevention.
    ExpiredInMatch,
    /// Conditional order fired. Treated like a fill for TP/SL legs.
    Triggered,
}

impl OrderStatus {
    pub fn from_binance_str(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "PARTIALLY_FILLED" => Some(Self::PartiallyFilled),
            "FILLED" => Some(Self::Filled),
            "CANCELED" => Some(Self::Canceled),
            "REJECTED" => Some(Self::Rejected),
            "EXPIRED" => Some(Self::Expired),
            "EXPIRED_IN_MATCH" => Some(Self::ExpiredInMatch),
            "TRIGGERED" => Some(Self::Triggered),
            _ => None,
        }
    }

    pub fn as_binance_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::ExpiredInMatch => "EXPIRED_IN_MATCH",
            Self::Triggered => "TRIGGERED",
        }
    }

    /// A protective leg in this status has closed the position.
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled | Self::Triggered)
    }

    /// The order is dead without executing.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Rejected | Self::Expired | Self::ExpiredInMatch
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_binance_str())
    }
}
