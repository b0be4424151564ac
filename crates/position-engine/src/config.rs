//! Engine timing configuration.

use std::time::Duration;

/// Timeouts, retry budgets and grace windows for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // === Entry ===
    /// Status polls before falling back to the ticker price.
    pub fill_poll_attempts: u32,
    /// Delay between status polls.
    pub fill_poll_interval: Duration,

    // === Protection ===
    /// Attempts per protective leg.
    pub protection_retries: u32,
    /// Fixed delay between attempts.
    pub protection_retry_delay: Duration,

    // === Monitor ===
    /// Positions younger than this are not evaluated.
    pub open_grace: Duration,
    /// Minimum age before a missing position counts as a manual close.
    pub manual_close_grace: Duration,
    /// Delay between monitor cycles.
    pub poll_interval: Duration,

    // === Signals ===
    /// How long a signal waits for its symbol's lock.
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fill_poll_attempts: 10,
            fill_poll_interval: Duration::from_secs(1),
            protection_retries: 3,
            protection_retry_delay: Duration::from_secs(1),
            open_grace: Duration::from_secs(30),
            manual_close_grace: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    pub fn with_fill_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.fill_poll_attempts = attempts;
        self.fill_poll_interval = interval;
        self
    }

    pub fn with_protection_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.protection_retries = retries;
        self.protection_retry_delay = delay;
        self
    }

    pub fn with_grace(mut self, open_grace: Duration, manual_close_grace: Duration) -> Self {
        self.open_grace = open_grace;
        self.manual_close_grace = manual_close_grace;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.fill_poll_attempts, 10);
        assert_eq!(config.protection_retries, 3);
        assert_eq!(config.open_grace, Duration::from_secs(30));
        assert_eq!(config.manual_close_grace, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.lock_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_fill_polling(2, Duration::ZERO)
            .with_poll_interval(Duration::from_secs(1));
        assert_eq!(config.fill_poll_attempts, 2);
        assert!(config.fill_poll_interval.is_zero());
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }
}
