use std::path::PathBuf;
use std::time::Duration;

use position_engine::EngineConfig;

/// Runner configuration derived from environment variables.
///
/// Exchange credentials and the Binance environment are read separately by
/// `auth::ApiCredentials::from_env` and `common::BinanceEnvironment::from_env`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    pub bind: String,
    pub port: u16,
    pub poll_interval: Duration,
    pub state_file: PathBuf,
    pub history_path: PathBuf,
    /// Symbol used when a signal omits one.
    pub default_symbol: String,
    /// JSON ladder definition. `None` ⇒ built-in five-level ladder.
    pub ladder_file: Option<PathBuf>,
    /// Asset reported by `/balance`.
    pub balance_asset: String,
}

fn env_str(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u16(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u16) -> u16 {
    lookup(name)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    lookup(name)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> PathBuf {
    PathBuf::from(env_str(lookup, name, default))
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let poll_secs = env_u64(&lookup, "POLL_INTERVAL", 5).max(1);

        Self {
            bind: env_str(&lookup, "BIND", "0.0.0.0"),
            port: env_u16(&lookup, "PORT", 8000),
            poll_interval: Duration::from_secs(poll_secs),
            state_file: env_path(&lookup, "STATE_FILE_PATH", "state.json"),
            history_path: env_path(&lookup, "HISTORY_PATH", "trading_history.csv"),
            default_symbol: env_str(&lookup, "DEFAULT_SYMBOL", "ETHUSDC").to_uppercase(),
            ladder_file: lookup("LADDER_FILE")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            balance_asset: env_str(&lookup, "BALANCE_ASSET", "USDT").to_uppercase(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default().with_poll_interval(self.poll_interval)
    }
}
