//! Futures API key pair.

use crate::error::AuthError;
use secrecy::{ExposeSecret, SecretString};

/// Names accepted for the secret key, first match wins.
const SECRET_ENV_VARS: [&str; 2] = ["BINANCE_API_SECRET", "BINANCE_SECRET_KEY"];

/// API key (public) and secret (wrapped, redacted in `Debug`).
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    secret_key: SecretString,
}

impl ApiCredentials {
    /// Load credentials from the process environment (and `.env` if present).
    ///
    /// Reads `BINANCE_API_KEY` and `BINANCE_API_SECRET` (`BINANCE_SECRET_KEY`
    /// is accepted as an alias). Empty values count as missing.
    pub fn from_env() -> Result<Self, AuthError> {
        dotenvy::dotenv().ok();

        let api_key = non_empty_var("BINANCE_API_KEY")
            .ok_or_else(|| AuthError::MissingEnvVar("BINANCE_API_KEY".into()))?;

        let secret_key = SECRET_ENV_VARS
            .iter()
            .find_map(|name| non_empty_var(name))
            .ok_or_else(|| AuthError::MissingEnvVar(SECRET_ENV_VARS[0].into()))?;

        Ok(Self::new(api_key, secret_key))
    }

    /// Build credentials from explicit values.
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: SecretString::from(secret_key.into()),
        }
    }

    /// Public API key, sent as `X-MBX-APIKEY`.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Raw secret. Only for HMAC keying; never log it.
    pub(crate) fn expose_secret(&self) -> &str {
        self.secret_key.expose_secret()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}
