//! Durable state for the position engine.
//!
//! - **StateStore**: the position table and the processed-signal table, kept in
//!   one JSON file written atomically (temp file, fsync, rename)
//! - **SymbolLockRegistry**: one async mutex per symbol, created on first use
//! - **TradeLedger**: append-only audit trail of opens and closes (CSV)

mod error;
mod ledger;
mod locks;
mod state;

pub use error::{LedgerError, StoreError};
pub use ledger::{
    format_duration, CsvLedger, HistoryStats, LedgerEntry, LedgerEvent, LedgerRecord,
    LedgerStatus, MemoryLedger, SharedLedger, TradeLedger,
};
pub use locks::{create_symbol_locks, SharedSymbolLocks, SymbolGuard, SymbolLockRegistry};
pub use state::{create_state_store, dedup_key, SharedStateStore, State, StateStore};
