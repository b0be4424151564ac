//! Engine error types.

use execution_core::{GatewayError, LadderError, OrderStatus};
use state_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the signal path and the monitor.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed inbound signal.
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    /// The symbol's lock could not be taken in time.
    #[error("symbol {0} is busy")]
    SymbolBusy(String),

    /// Sizing produced a non-positive quantity.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// The entry order ended in a terminal non-fill state.
    #[error("order {order_id} for {symbol} ended {status}")]
    OrderRejected {
        symbol: String,
        order_id: String,
        status: OrderStatus,
    },

    /// Exchange call failed.
    #[error("exchange error: {0}")]
    Exchange(#[from] GatewayError),

    /// State file could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Ladder lookup failed.
    #[error("ladder error: {0}")]
    Ladder(LadderError),

    /// Persisted record does not allow the requested transition.
    #[error("invalid state for {symbol}: {reason}")]
    InvalidState { symbol: String, reason: String },
}

impl From<LadderError> for EngineError {
    fn from(err: LadderError) -> Self {
        match err {
            LadderError::InvalidQuantity(msg) => EngineError::InvalidQuantity(msg),
            other => EngineError::Ladder(other),
        }
    }
}

impl EngineError {
    /// Caused by the request rather than by the exchange or the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidSignal(_) | EngineError::InvalidQuantity(_)
        )
    }
}
