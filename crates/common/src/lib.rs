//! Shared building blocks for the ladder bot crates.
//!
//! - [`BinanceEnvironment`]: futures REST endpoints for production and testnet
//! - [`init_logging`]: `tracing` subscriber bootstrap
//! - [`RetryPolicy`]: bounded retries with a fixed delay between attempts

mod environment;
mod logging;
mod retry;

pub use environment::{BinanceEnvironment, ParseEnvironmentError};
pub use logging::init_logging;
pub use retry::RetryPolicy;
