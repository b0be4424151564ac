//! Position lifecycle engine for the ladder bot.
//!
//! - **OrderExecutor**: entry order with bounded fill polling, then TP/SL legs with retry
//! - **PositionLifecycleEngine**: per-symbol state machine (open, close, reinforce)
//! - **PositionMonitor**: background loop detecting TP, SL and manual closes
//! - **SignalRouter**: webhook entry point (dedup, reinforce, ignore, open)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────────┐   ┌─────────────────┐
//! │ SignalRouter │──>│                  │──>│ OrderExecutor │──>│ ExchangeGateway │
//! └──────────────┘   │ PositionLifecycle│   └───────────────┘   └─────────────────┘
//! ┌──────────────┐   │ Engine           │   ┌───────────────┐   ┌─────────────────┐
//! │ PositionMon. │──>│                  │──>│  StateStore   │   │   TradeLedger   │
//! └──────────────┘   └──────────────────┘   └───────────────┘   └─────────────────┘
//! ```
//!
//! Both entry points hold the symbol's lock from the lock registry for the
//! whole transition.

mod config;
mod error;
mod executor;
mod lifecycle;
mod monitor;
mod router;

#[cfg(test)]
mod test_support;

pub use config::EngineConfig;
pub use error::EngineError;
pub use executor::OrderExecutor;
pub use lifecycle::{Evaluation, PositionLifecycleEngine, SharedEngine};
pub use monitor::{CycleReport, PositionMonitor};
pub use router::{
    IgnoreReason, InboundSignal, SignalDetails, SignalOutcome, SignalResponse, SignalRouter,
};
