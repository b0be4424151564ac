//! Binance futures error types.

use auth::AuthError;
use execution_core::GatewayError;
use rest_client::RestError;
use thiserror::Error;

/// Errors returned by `BinanceFuturesClient`.
#[derive(Debug, Error)]
pub enum BinanceFuturesError {
    #[error("REST client error: {0}")]
    Rest(#[from] RestError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Error payload returned by the exchange.
    #[error("Binance API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

impl BinanceFuturesError {
    /// Turn a failed REST call into an API error when the body is Binance's
    /// `{"code": -2011, "msg": "..."}` payload.
    pub fn from_rest(err: RestError) -> Self {
        #[derive(serde::Deserialize)]
        struct ApiError {
            code: i64,
            msg: String,
        }

        match err.body().and_then(|b| serde_json::from_str::<ApiError>(b).ok()) {
            Some(api) => Self::Api {
                code: api.code,
                message: api.msg,
            },
            None => Self::Rest(err),
        }
    }

    /// Order unknown to the exchange (already filled, canceled or never existed).
    pub fn is_order_not_found(&self) -> bool {
        matches!(self, Self::Api { code: -2011 | -2013, .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rest(rest_err) => rest_err.is_retryable(),
            // internal error, disconnected, too many requests, backend timeout,
            // timestamp outside recvWindow
            Self::Api { code, .. } => matches!(code, -1000 | -1001 | -1003 | -1007 | -1021),
            _ => false,
        }
    }
}

impl From<BinanceFuturesError> for GatewayError {
    fn from(err: BinanceFuturesError) -> Self {
        if err.is_retryable() {
            return GatewayError::Transport(err.to_string());
        }
        match err {
            BinanceFuturesError::Api { code, message } => GatewayError::Api { code, message },
            BinanceFuturesError::UnknownSymbol(symbol) => GatewayError::UnknownSymbol(symbol),
            BinanceFuturesError::Parse(msg) => GatewayError::Parse(msg),
            BinanceFuturesError::Rest(RestError::Parse(msg)) => GatewayError::Parse(msg),
            BinanceFuturesError::Rest(RestError::HttpError { status, message }) => {
                GatewayError::Api {
                    code: i64::from(status),
                    message,
                }
            }
            other => GatewayError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rest_parses_api_payload() {
        let err = BinanceFuturesError::from_rest(RestError::HttpError {
            status: 400,
            message: r#"{"code":-2011,"msg":"Unknown order sent."}"#.into(),
        });

        assert!(matches!(err, BinanceFuturesError::Api { code: -2011, .. }));
        assert!(err.is_order_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_rest_keeps_non_api_bodies() {
        let err = BinanceFuturesError::from_rest(RestError::HttpError {
            status: 502,
            message: "<html>Bad Gateway</html>".into(),
        });

        assert!(matches!(err, BinanceFuturesError::Rest(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_gateway_error_mapping() {
        let transient: GatewayError = BinanceFuturesError::Api {
            code: -1021,
            message: "Timestamp outside recvWindow".into(),
        }
        .into();
        assert!(transient.is_retryable());

        let rejected: GatewayError = BinanceFuturesError::Api {
            code: -2019,
            message: "Margin is insufficient.".into(),
        }
        .into();
        assert!(matches!(rejected, GatewayError::Api { code: -2019, .. }));

        let unknown: GatewayError = BinanceFuturesError::UnknownSymbol("FOO".into()).into();
        assert!(matches!(unknown, GatewayError::UnknownSymbol(s) if s == "FOO"));
    }
}
