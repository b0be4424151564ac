//! Binance futures response types.

use execution_core::SymbolFilters;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fallbacks when a symbol lacks a LOT_SIZE / PRICE_FILTER entry.
const DEFAULT_STEP_SIZE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);
const DEFAULT_TICK_SIZE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Response from GET /fapi/v1/time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: i64,
}

/// Response from POST /fapi/v1/leverage.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverageResponse {
    pub symbol: String,
    pub leverage: u32,
}

/// Order as returned by POST, GET and DELETE /fapi/v1/order and /fapi/v1/openOrders.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: String,
    #[serde(default, deserialize_with = "deserialize_decimal_from_str")]
    pub avg_price: Decimal,
    #[serde(default, deserialize_with = "deserialize_decimal_from_str")]
    pub orig_qty: Decimal,
    #[serde(default, deserialize_with = "deserialize_decimal_from_str")]
    pub executed_qty: Decimal,
    #[serde(default, deserialize_with = "deserialize_decimal_from_str")]
    pub stop_price: Decimal,
    #[serde(default)]
    pub close_position: bool,
    #[serde(default)]
    pub update_time: i64,
}

/// Response from GET /fapi/v1/ticker/price.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPriceResponse {
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_decimal_from_str")]
    pub price: Decimal,
}

/// Response from GET /fapi/v1/exchangeInfo (only the parts the bot reads).
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfoResponse {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// Symbol filter entries, keyed by `filterType`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER")]
    Price {
        #[serde(rename = "tickSize", deserialize_with = "deserialize_decimal_from_str")]
        tick_size: Decimal,
    },
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        #[serde(rename = "stepSize", deserialize_with = "deserialize_decimal_from_str")]
        step_size: Decimal,
    },
    #[serde(other)]
    Other,
}

impl SymbolInfo {
    /// Step and tick size, with defaults for missing filters.
    pub fn filters(&self) -> SymbolFilters {
        let mut filters = SymbolFilters {
            step_size: DEFAULT_STEP_SIZE,
            tick_size: DEFAULT_TICK_SIZE,
        };
        for filter in &self.filters {
            match filter {
                SymbolFilter::Price { tick_size } => filters.tick_size = *tick_size,
                SymbolFilter::LotSize { step_size } => filters.step_size = *step_size,
                SymbolFilter::Other => {}
            }
        }
        filters
    }
}

/// Entry of GET /fapi/v2/positionRisk.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRiskEntry {
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_decimal_from_str")]
    pub position_amt: Decimal,
    #[serde(default, deserialize_with = "deserialize_decimal_from_str")]
    pub entry_price: Decimal,
    #[serde(default)]
    pub position_side: String,
}

/// Entry of GET /fapi/v2/balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceEntry {
    pub asset: String,
    #[serde(deserialize_with = "deserialize_decimal_from_str")]
    pub balance: Decimal,
    #[serde(default, deserialize_with = "deserialize_decimal_from_str")]
    pub available_balance: Decimal,
    #[serde(default, deserialize_with = "deserialize_decimal_from_str")]
    pub cross_un_pnl: Decimal,
}

/// Binance sends decimals as JSON strings.
fn deserialize_decimal_from_str<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<Decimal>().map_err(serde::de::Error::custom)
}
