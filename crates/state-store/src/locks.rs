//! Per-symbol mutual exclusion.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held while a symbol's position is being mutated. Released on drop.
pub type SymbolGuard = OwnedMutexGuard<()>;

/// Lazily created lock per trading symbol.
///
/// Signal handlers wait (bounded) for the lock; the monitor only tries it and
/// skips the symbol on contention.
#[derive(Debug, Default)]
pub struct SymbolLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Shared lock registry handle.
pub type SharedSymbolLocks = Arc<SymbolLockRegistry>;

/// Create a shared lock registry.
pub fn create_symbol_locks() -> SharedSymbolLocks {
    Arc::new(SymbolLockRegistry::new())
}

impl SymbolLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, symbol: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(symbol) {
            return lock.clone();
        }
        self.locks.entry(symbol.to_string()).or_default().clone()
    }

    /// Wait up to `timeout` for the symbol's lock.
    pub async fn acquire(&self, symbol: &str, timeout: Duration) -> Option<SymbolGuard> {
        let lock = self.lock_for(symbol);
        tokio::time::timeout(timeout, lock.lock_owned()).await.ok()
    }

    /// Take the lock only if it is free.
    pub fn try_acquire(&self, symbol: &str) -> Option<SymbolGuard> {
        self.lock_for(symbol).try_lock_owned().ok()
    }

    /// Number of symbols seen so far.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
