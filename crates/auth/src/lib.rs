//! API credentials and request signing for Binance futures.
//!
//! Secrets are held in `SecretString` so they never show up in `Debug`
//! output or logs, and signed endpoints get an HMAC-SHA256 signature over
//! the exact query string that is sent.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::{ApiCredentials, RequestSigner};
//!
//! let signer = RequestSigner::new(ApiCredentials::from_env()?);
//! let query = signer.signed_query(
//!     &[("symbol", "ETHUSDC".to_string()), ("leverage", "50".to_string())],
//!     timestamp_ms,
//! )?;
//! ```

mod credentials;
mod error;
mod signer;

pub use credentials::ApiCredentials;
pub use error::AuthError;
pub use signer::{RequestSigner, DEFAULT_RECV_WINDOW_MS};
