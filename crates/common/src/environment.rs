//! Binance futures environment configuration.
//!
//! The bot trades USDⓈ-M futures, so only the `fapi` REST hosts are relevant.

use std::fmt;
use std::str::FromStr;

/// Binance futures environment (production or testnet).
///
/// Defaults to testnet: pointing the bot at real money must be an explicit choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinanceEnvironment {
    /// Production futures API (real money).
    Production,
    /// Futures testnet.
    #[default]
    Testnet,
}

impl BinanceEnvironment {
    /// Futures REST API base URL.
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            Self::Production => "https://fapi.binance.com",
            Self::Testnet => "https://testnet.binancefuture.com",
        }
    }

    /// Returns true if this is the production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Load environment from `BINANCE_ENVIRONMENT`.
    ///
    /// Falls back to `USE_TESTNET=false` for production, otherwise testnet.
    pub fn from_env() -> Self {
        if let Some(env) = std::env::var("BINANCE_ENVIRONMENT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            return env;
        }

        match std::env::var("USE_TESTNET") {
            Ok(v) if v.trim().eq_ignore_ascii_case("false") => Self::Production,
            _ => Self::Testnet,
        }
    }
}

impl fmt::Display for BinanceEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for BinanceEnvironment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" | "mainnet" | "live" => Ok(Self::Production),
            "testnet" | "test" | "sandbox" => Ok(Self::Testnet),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

/// Error parsing environment string.
#[derive(Debug, Clone)]
pub struct ParseEnvironmentError(String);

impl fmt::Display for ParseEnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid environment '{}', expected 'production' or 'testnet'",
            self.0
        )
    }
}

impl std::error::Error for ParseEnvironmentError {}
