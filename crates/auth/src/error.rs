use thiserror::Error;

/// Errors raised while loading credentials or signing requests.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required environment variable is missing or empty.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// The secret could not be used as an HMAC key.
    #[error("Invalid secret key")]
    InvalidSecret,
}
