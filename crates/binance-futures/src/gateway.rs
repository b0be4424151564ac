//! `ExchangeGateway` implementation for the futures client.

use crate::client::BinanceFuturesClient;
use crate::responses::OrderResponse;
use async_trait::async_trait;
use execution_core::{
    ExchangeGateway, GatewayError, OpenOrder, OrderSide, OrderSnapshot, OrderStatus, OrderType,
    ProtectiveKind, SymbolFilters,
};
use rust_decimal::Decimal;

fn parse_order_id(order_id: &str) -> Result<i64, GatewayError> {
    order_id
        .parse()
        .map_err(|_| GatewayError::Parse(format!("invalid order id '{}'", order_id)))
}

fn parse_status(status: &str) -> Result<OrderStatus, GatewayError> {
    OrderStatus::from_binance_str(status)
        .ok_or_else(|| GatewayError::Parse(format!("unknown order status '{}'", status)))
}

impl TryFrom<&OrderResponse> for OrderSnapshot {
    type Error = GatewayError;

    fn try_from(order: &OrderResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            status: parse_status(&order.status)?,
            avg_price: order.avg_price,
            executed_qty: order.executed_qty,
        })
    }
}

impl TryFrom<OrderResponse> for OpenOrder {
    type Error = GatewayError;

    fn try_from(order: OrderResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            status: parse_status(&order.status)?,
            side: OrderSide::from_binance_str(&order.side)
                .ok_or_else(|| GatewayError::Parse(format!("unknown side '{}'", order.side)))?,
            order_type: OrderType::from_binance_str(&order.order_type),
            order_id: order.order_id.to_string(),
            symbol: order.symbol,
            stop_price: order.stop_price,
        })
    }
}

#[async_trait]
impl ExchangeGateway for BinanceFuturesClient {
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), GatewayError> {
        BinanceFuturesClient::set_leverage(self, symbol, leverage).await?;
        Ok(())
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<String, GatewayError> {
        let response = self.place_market_order(symbol, side, quantity).await?;
        Ok(response.order_id.to_string())
    }

    async fn get_order_status(
        &self,
        symbol: &str,
        order_id: &str,
    ) -> Result<OrderSnapshot, GatewayError> {
        let response = self.query_order(symbol, parse_order_id(order_id)?).await?;
        OrderSnapshot::try_from(&response)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), GatewayError> {
        BinanceFuturesClient::cancel_order(self, symbol, parse_order_id(order_id)?).await?;
        Ok(())
    }

    async fn submit_close_position_order(
        &self,
        symbol: &str,
        side: OrderSide,
        kind: ProtectiveKind,
        stop_price: Decimal,
    ) -> Result<String, GatewayError> {
        let response = self
            .place_close_position_order(symbol, side, kind.order_type(), stop_price)
            .await?;
        Ok(response.order_id.to_string())
    }

    async fn get_ticker_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        Ok(self.ticker_price(symbol).await?)
    }

    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters, GatewayError> {
        Ok(self.symbol_filters(symbol).await?)
    }

    async fn list_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, GatewayError> {
        self.open_orders(symbol)
            .await?
            .into_iter()
            .map(OpenOrder::try_from)
            .collect()
    }

    async fn get_position_amount(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        Ok(self.position_amount(symbol).await?)
    }
}
