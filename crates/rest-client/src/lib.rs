//! Thin `reqwest` wrapper shared by the exchange clients.
//!
//! One `send` entry point per HTTP method, JSON bodies decoded into the
//! caller's type, and non-2xx responses surfaced as `RestError::HttpError`
//! with the raw body so exchange-specific error payloads can be parsed
//! further up.

mod client;
mod error;

pub use client::{Method, RestClient, DEFAULT_TIMEOUT};
pub use error::RestError;
