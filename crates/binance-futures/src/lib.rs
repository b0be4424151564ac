//! Binance USDⓈ-M futures REST client.
//!
//! - **Time synchronization**: signed requests use the server clock estimate
//! - **Orders**: market entries and close-position TP/SL trigger orders
//! - **Symbol metadata**: lot/tick filters cached per symbol after the first lookup
//! - **Account**: live position size and wallet balances
//!
//! `BinanceFuturesClient` implements `execution_core::ExchangeGateway`, which is
//! the only surface the position engine talks to.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::ApiCredentials;
//! use binance_futures::BinanceFuturesClient;
//! use common::BinanceEnvironment;
//!
//! let client = BinanceFuturesClient::new(ApiCredentials::from_env()?, BinanceEnvironment::Testnet)?;
//! client.sync_time().await?;
//! let price = client.ticker_price("ETHUSDC").await?;
//! ```

mod client;
mod error;
mod gateway;
mod responses;

pub use client::BinanceFuturesClient;
pub use error::BinanceFuturesError;
pub use responses::{
    BalanceEntry, ExchangeInfoResponse, LeverageResponse, OrderResponse, PositionRiskEntry,
    ServerTimeResponse, SymbolFilter, SymbolInfo, TickerPriceResponse,
};
