//! Generic REST client around reqwest.

use crate::error::RestError;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use reqwest::Method;

/// Default request timeout for exchange calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// REST client bound to one base URL.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    /// Create a client for `base_url` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RestError::RequestBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client with [`DEFAULT_TIMEOUT`].
    pub fn with_default_timeout(base_url: &str) -> Result<Self, RestError> {
        Self::new(base_url, DEFAULT_TIMEOUT)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and decode the JSON body.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - Request path (e.g. "/fapi/v1/order")
    /// * `query` - Query string without the leading '?'
    /// * `headers` - Extra headers (API key etc.)
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let url = self.build_url(path, query);
        tracing::debug!(method = %method, path = %path, "REST request");

        let mut request = self.client.request(method, &url);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.send().await?;
        Self::handle_response(response).await
    }

    /// Unauthenticated GET.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&str>,
    ) -> Result<T, RestError> {
        self.send(Method::GET, path, query, &[]).await
    }

    fn build_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_url, path, q),
            _ => format!("{}{}", self.base_url, path),
        }
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, RestError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                tracing::warn!(body = %body, error = %e, "Failed to parse response");
                RestError::Parse(e.to_string())
            });
        }

        // 418 is Binance's IP ban after ignoring 429s
        if status.as_u16() == 429 || status.as_u16() == 418 {
            return Err(RestError::RateLimited {
                status: status.as_u16(),
                message: body,
            });
        }

        Err(RestError::HttpError {
            status: status.as_u16(),
            message: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_no_query() {
        let client = RestClient::with_default_timeout("https://fapi.example.com").unwrap();
        assert_eq!(
            client.build_url("/fapi/v1/time", None),
            "https://fapi.example.com/fapi/v1/time"
        );
    }

    #[test]
    fn test_build_url_with_query() {
        let client = RestClient::with_default_timeout("https://fapi.example.com").unwrap();
        assert_eq!(
            client.build_url("/fapi/v1/order", Some("symbol=ETHUSDC&orderId=7")),
            "https://fapi.example.com/fapi/v1/order?symbol=ETHUSDC&orderId=7"
        );
    }

    #[test]
    fn test_build_url_strips_trailing_slash_and_empty_query() {
        let client = RestClient::with_default_timeout("https://fapi.example.com/").unwrap();
        assert_eq!(
            client.build_url("/fapi/v1/time", Some("")),
            "https://fapi.example.com/fapi/v1/time"
        );
    }
}
