use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use binance_futures::BinanceFuturesError;
use execution_core::GatewayError;
use position_engine::{EngineError, SignalResponse};
use state_store::{LedgerError, StoreError};
use thiserror::Error;
use tracing::error;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Exchange(#[from] GatewayError),

    #[error(transparent)]
    Binance(#[from] BinanceFuturesError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Engine(e) => match e {
                EngineError::InvalidSignal(_) | EngineError::InvalidQuantity(_) => {
                    StatusCode::BAD_REQUEST
                }
                EngineError::SymbolBusy(_) => StatusCode::TOO_MANY_REQUESTS,
                EngineError::OrderRejected { .. } | EngineError::Exchange(_) => {
                    StatusCode::BAD_GATEWAY
                }
                EngineError::Persistence(_)
                | EngineError::Ladder(_)
                | EngineError::InvalidState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Exchange(_) | Self::Binance(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Ledger(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }

        (status, Json(SignalResponse::error(self.to_string()))).into_response()
    }
}
