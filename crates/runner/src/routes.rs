//! HTTP surface: the signal webhook plus read-only and admin endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use execution_core::ladder::{price_precision, quantity_precision};
use execution_core::{OrderSide, OrderStatus, OrderType};
use position_engine::{InboundSignal, SignalResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use state_store::HistoryStats;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Assemble the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(banner).post(webhook))
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .route("/state", get(current_state))
        .route("/reset", delete(reset_state))
        .route("/history", get(history))
        .route("/history/stats", get(history_stats))
        .route("/history/export", get(export_history))
        .route("/balance", get(balance))
        .route("/orders", get(open_orders))
        .route("/check/{symbol}", get(check_position))
        .route("/precision/{symbol}", get(precision))
        .route("/levels", get(levels))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Signals
// ============================================================================

async fn webhook(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InboundSignal>, JsonRejection>,
) -> Result<Json<SignalResponse>, ApiError> {
    let Json(signal) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "malformed webhook payload");
        ApiError::BadRequest(rejection.body_text())
    })?;

    info!(
        symbol = ?signal.symbol,
        signal = ?signal.signal,
        price = ?signal.price,
        time = ?signal.time,
        "webhook received"
    );

    let outcome = state.router.handle(signal).await?;
    Ok(Json(outcome.to_response()))
}

// ============================================================================
// Status
// ============================================================================

async fn banner(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "Ladder bot running, position monitor active",
        "environment": state.client.environment().to_string(),
        "default_symbol": state.config.default_symbol,
        "poll_interval_secs": state.config.poll_interval.as_secs(),
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.engine.metrics().snapshot();
    Json(json!({
        "status": "ok",
        "health": snapshot.health_status(),
        "timestamp": Utc::now().to_rfc3339(),
        "metrics": snapshot,
    }))
}

async fn current_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<state_store::State>, ApiError> {
    Ok(Json(state.engine.store().load()?))
}

async fn reset_state(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.engine.store().reset()?;
    info!("state reset via API");
    Ok(Json(json!({ "status": "reset", "message": "state cleared" })))
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    limit: usize,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let records = state.engine.ledger().history(Some(query.limit))?;
    Ok(Json(json!({ "count": records.len(), "history": records })))
}

async fn history_stats(State(state): State<Arc<AppState>>) -> Result<Json<HistoryStats>, ApiError> {
    Ok(Json(state.engine.ledger().stats()?))
}

async fn export_history(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let bytes = match tokio::fs::read(&state.config.history_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("no trade history yet".to_string()));
        }
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"trading_history.csv\"",
            ),
        ],
        bytes,
    ))
}

// ============================================================================
// Exchange lookups
// ============================================================================

async fn balance(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let asset = &state.config.balance_asset;
    let entry = state
        .client
        .balances()
        .await?
        .into_iter()
        .find(|b| &b.asset == asset);

    Ok(Json(json!({ "asset": asset, "balance": entry })))
}

#[derive(Debug, Deserialize)]
struct OrdersQuery {
    symbol: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderView {
    order_id: String,
    side: OrderSide,
    order_type: Option<OrderType>,
    status: OrderStatus,
    stop_price: Decimal,
}

async fn open_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Value>, ApiError> {
    let symbol = query
        .symbol
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.config.default_symbol.clone());

    let orders: Vec<OrderView> = state
        .engine
        .gateway()
        .list_open_orders(&symbol)
        .await?
        .into_iter()
        .map(|o| OrderView {
            order_id: o.order_id,
            side: o.side,
            order_type: o.order_type,
            status: o.status,
            stop_price: o.stop_price,
        })
        .collect();

    Ok(Json(json!({ "symbol": symbol, "open_orders": orders })))
}

async fn check_position(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let symbol = symbol.trim().to_uppercase();
    let snapshot = state.engine.store().load()?;

    let Some(position) = snapshot.position(&symbol) else {
        return Ok(Json(json!({ "symbol": symbol, "status": "NO_POSITION" })));
    };

    if !position.is_active {
        return Ok(Json(json!({
            "symbol": symbol,
            "status": "POSITION_CLOSED",
            "pending_reinforcement": position.pending_reinforcement,
            "next_level": position.next_level,
        })));
    }

    let current_price = state.engine.gateway().get_ticker_price(&symbol).await?;

    Ok(Json(json!({
        "symbol": symbol,
        "status": "POSITION_ACTIVE",
        "signal": position.signal,
        "current_price": current_price,
        "level": position.current_level,
        "entry_price": position.entry_price,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

async fn precision(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let symbol = symbol.trim().to_uppercase();
    let filters = state.engine.gateway().get_symbol_filters(&symbol).await?;

    Ok(Json(json!({
        "symbol": symbol,
        "price_precision": price_precision(filters.tick_size),
        "quantity_precision": quantity_precision(filters.step_size),
        "step_size": filters.step_size,
        "tick_size": filters.tick_size,
    })))
}

async fn levels(State(state): State<Arc<AppState>>) -> Json<Value> {
    let ladder = state.engine.ladder();
    Json(json!({
        "strategy": "progressive reinforcement after stop-loss, automatic monitoring",
        "levels": ladder,
        "total_levels": ladder.max_level(),
        "total_capital": ladder.total_capital(),
    }))
}
