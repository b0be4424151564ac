//! REST client error types.

use thiserror::Error;

/// Errors that can occur during REST calls.
#[derive(Debug, Error)]
pub enum RestError {
    /// Non-2xx response. `message` is the raw body.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Request timed out.
    #[error("Request timeout")]
    Timeout,

    /// Network-level failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(String),

    /// 429 or 418 from the server.
    #[error("Rate limited ({status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("Request build error: {0}")]
    RequestBuild(String),
}

impl RestError {
    /// Transport-level failures that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RestError::Timeout | RestError::Connection(_) | RestError::RateLimited { .. } => true,
            RestError::HttpError { status, .. } => *status >= 500,
            RestError::Parse(_) | RestError::RequestBuild(_) => false,
        }
    }

    /// Response body of an HTTP error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            RestError::HttpError { message, .. } | RestError::RateLimited { message, .. } => {
                Some(message)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RestError::Timeout
        } else if err.is_decode() {
            RestError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            RestError::HttpError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RestError::Connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RestError::Timeout.is_retryable());
        assert!(RestError::HttpError {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!RestError::HttpError {
            status: 400,
            message: String::new()
        }
        .is_retryable());
        assert!(!RestError::Parse("bad".into()).is_retryable());
    }

    #[test]
    fn test_body_exposed_for_http_errors() {
        let err = RestError::HttpError {
            status: 400,
            message: r#"{"code":-1121,"msg":"Invalid symbol."}"#.into(),
        };
        assert!(err.body().unwrap().contains("-1121"));
        assert!(RestError::Timeout.body().is_none());
    }
}
