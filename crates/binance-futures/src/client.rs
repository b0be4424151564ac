//! Binance futures REST client.

use crate::error::BinanceFuturesError;
use crate::responses::{
    BalanceEntry, ExchangeInfoResponse, LeverageResponse, OrderResponse, PositionRiskEntry,
    ServerTimeResponse, TickerPriceResponse,
};
use auth::{ApiCredentials, RequestSigner};
use common::BinanceEnvironment;
use dashmap::DashMap;
use execution_core::{generate_client_order_id, OrderSide, OrderType, SymbolFilters};
use rest_client::{Method, RestClient, DEFAULT_TIMEOUT};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicI64, Ordering};

/// Prefix for `newClientOrderId`.
const CLIENT_ORDER_PREFIX: &str = "lb";

/// Binance USDⓈ-M futures client with request signing.
pub struct BinanceFuturesClient {
    client: RestClient,
    signer: RequestSigner,
    environment: BinanceEnvironment,
    /// Local clock minus server clock.
    time_offset_ms: AtomicI64,
    filters: DashMap<String, SymbolFilters>,
}

impl BinanceFuturesClient {
    pub fn new(
        credentials: ApiCredentials,
        environment: BinanceEnvironment,
    ) -> Result<Self, BinanceFuturesError> {
        let client = RestClient::new(environment.rest_base_url(), DEFAULT_TIMEOUT)?;

        Ok(Self {
            client,
            signer: RequestSigner::new(credentials),
            environment,
            time_offset_ms: AtomicI64::new(0),
            filters: DashMap::new(),
        })
    }

    pub fn environment(&self) -> BinanceEnvironment {
        self.environment
    }

    /// Estimated server time in milliseconds.
    pub fn server_timestamp_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() - self.time_offset_ms.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Time Synchronization
    // ========================================================================

    /// Measure the clock offset against the server.
    ///
    /// Call on startup; signed requests are rejected (-1021) when the local
    /// clock drifts outside `recvWindow`.
    pub async fn sync_time(&self) -> Result<(), BinanceFuturesError> {
        let before = std::time::Instant::now();
        let response: ServerTimeResponse = self.public("/fapi/v1/time", None).await?;
        let rtt = before.elapsed().as_millis() as i64;

        let local_time = chrono::Utc::now().timestamp_millis();
        let offset = local_time - (response.server_time + rtt / 2);
        self.time_offset_ms.store(offset, Ordering::Relaxed);

        tracing::info!(
            server_time = response.server_time,
            offset_ms = offset,
            rtt_ms = rtt,
            "Time synchronized with Binance futures"
        );
        Ok(())
    }

    // ========================================================================
    // Market Data
    // ========================================================================

    /// GET /fapi/v1/ticker/price
    pub async fn ticker_price(&self, symbol: &str) -> Result<Decimal, BinanceFuturesError> {
        let query = format!("symbol={}", symbol);
        let response: TickerPriceResponse =
            self.public("/fapi/v1/ticker/price", Some(&query)).await?;
        Ok(response.price)
    }

    /// Lot and tick size for `symbol`, cached after the first lookup.
    ///
    /// GET /fapi/v1/exchangeInfo (fetched once, all symbols cached).
    pub async fn symbol_filters(&self, symbol: &str) -> Result<SymbolFilters, BinanceFuturesError> {
        if let Some(filters) = self.filters.get(symbol) {
            return Ok(*filters);
        }

        let info: ExchangeInfoResponse = self.public("/fapi/v1/exchangeInfo", None).await?;
        for entry in &info.symbols {
            self.filters.insert(entry.symbol.clone(), entry.filters());
        }
        tracing::debug!(symbols = info.symbols.len(), "Exchange info cached");

        self.filters
            .get(symbol)
            .map(|f| *f)
            .ok_or_else(|| BinanceFuturesError::UnknownSymbol(symbol.to_string()))
    }

    // ========================================================================
    // Account
    // ========================================================================

    /// POST /fapi/v1/leverage
    pub async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
    ) -> Result<LeverageResponse, BinanceFuturesError> {
        let response: LeverageResponse = self
            .signed(
                Method::POST,
                "/fapi/v1/leverage",
                &[("symbol", symbol.to_string()), ("leverage", leverage.to_string())],
            )
            .await?;

        tracing::debug!(symbol = %symbol, leverage = response.leverage, "Leverage set");
        Ok(response)
    }

    /// Net position size for `symbol` (sum over position sides).
    ///
    /// GET /fapi/v2/positionRisk
    pub async fn position_amount(&self, symbol: &str) -> Result<Decimal, BinanceFuturesError> {
        let entries: Vec<PositionRiskEntry> = self
            .signed(
                Method::GET,
                "/fapi/v2/positionRisk",
                &[("symbol", symbol.to_string())],
            )
            .await?;

        Ok(entries
            .iter()
            .filter(|e| e.symbol == symbol)
            .map(|e| e.position_amt)
            .sum())
    }

    /// GET /fapi/v2/balance
    pub async fn balances(&self) -> Result<Vec<BalanceEntry>, BinanceFuturesError> {
        self.signed(Method::GET, "/fapi/v2/balance", &[]).await
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// POST /fapi/v1/order (MARKET)
    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
    ) -> Result<OrderResponse, BinanceFuturesError> {
        let client_order_id = generate_client_order_id(CLIENT_ORDER_PREFIX);

        tracing::info!(
            symbol = %symbol,
            side = side.as_binance_str(),
            quantity = %quantity,
            client_order_id = %client_order_id,
            "Placing market order"
        );

        let response: OrderResponse = self
            .signed(
                Method::POST,
                "/fapi/v1/order",
                &[
                    ("symbol", symbol.to_string()),
                    ("side", side.as_binance_str().to_string()),
                    ("type", OrderType::Market.as_binance_str().to_string()),
                    ("quantity", quantity.normalize().to_string()),
                    ("newClientOrderId", client_order_id),
                    ("newOrderRespType", "RESULT".to_string()),
                ],
            )
            .await?;

        tracing::info!(
            symbol = %symbol,
            order_id = response.order_id,
            status = %response.status,
            "Market order placed"
        );
        Ok(response)
    }

    /// POST /fapi/v1/order with `closePosition=true`.
    ///
    /// `order_type` must be STOP_MARKET or TAKE_PROFIT_MARKET.
    pub async fn place_close_position_order(
        &self,
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        stop_price: Decimal,
    ) -> Result<OrderResponse, BinanceFuturesError> {
        if !order_type.is_protective() {
            return Err(BinanceFuturesError::Parse(format!(
                "{} cannot close a position",
                order_type.as_binance_str()
            )));
        }

        let response: OrderResponse = self
            .signed(
                Method::POST,
                "/fapi/v1/order",
                &[
                    ("symbol", symbol.to_string()),
                    ("side", side.as_binance_str().to_string()),
                    ("type", order_type.as_binance_str().to_string()),
                    ("stopPrice", stop_price.normalize().to_string()),
                    ("closePosition", "true".to_string()),
                    ("timeInForce", "GTC".to_string()),
                    (
                        "newClientOrderId",
                        generate_client_order_id(CLIENT_ORDER_PREFIX),
                    ),
                ],
            )
            .await?;

        tracing::info!(
            symbol = %symbol,
            order_type = order_type.as_binance_str(),
            stop_price = %stop_price,
            order_id = response.order_id,
            "Close-position order placed"
        );
        Ok(response)
    }

    /// GET /fapi/v1/order
    pub async fn query_order(
        &self,
        symbol: &str,
        order_id: i64,
    ) -> Result<OrderResponse, BinanceFuturesError> {
        self.signed(
            Method::GET,
            "/fapi/v1/order",
            &[("symbol", symbol.to_string()), ("orderId", order_id.to_string())],
        )
        .await
    }

    /// DELETE /fapi/v1/order
    pub async fn cancel_order(
        &self,
        symbol: &str,
        order_id: i64,
    ) -> Result<OrderResponse, BinanceFuturesError> {
        let response: OrderResponse = self
            .signed(
                Method::DELETE,
                "/fapi/v1/order",
                &[("symbol", symbol.to_string()), ("orderId", order_id.to_string())],
            )
            .await?;

        tracing::info!(
            symbol = %symbol,
            order_id = response.order_id,
            status = %response.status,
            "Order canceled"
        );
        Ok(response)
    }

    /// GET /fapi/v1/openOrders
    pub async fn open_orders(&self, symbol: &str) -> Result<Vec<OrderResponse>, BinanceFuturesError> {
        self.signed(
            Method::GET,
            "/fapi/v1/openOrders",
            &[("symbol", symbol.to_string())],
        )
        .await
    }

    // ========================================================================
    // Transport
    // ========================================================================

    async fn public<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&str>,
    ) -> Result<T, BinanceFuturesError> {
        self.client
            .get(path, query)
            .await
            .map_err(BinanceFuturesError::from_rest)
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, BinanceFuturesError> {
        let query = self
            .signer
            .signed_query(params, self.server_timestamp_ms())?;
        let headers = [("X-MBX-APIKEY", self.signer.api_key())];

        self.client
            .send(method, path, Some(&query), &headers)
            .await
            .map_err(BinanceFuturesError::from_rest)
    }
}

impl std::fmt::Debug for BinanceFuturesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceFuturesClient")
            .field("environment", &self.environment)
            .field("base_url", &self.client.base_url())
            .field("api_key", &self.signer.api_key())
            .field(
                "time_offset_ms",
                &self.time_offset_ms.load(Ordering::Relaxed),
            )
            .finish()
    }
}
