//! Background loop driving the lifecycle engine for every active position.

use chrono::{DateTime, Utc};
use execution_core::CloseType;
use state_store::SharedSymbolLocks;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::lifecycle::{Evaluation, SharedEngine};

/// What one monitor cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Positions evaluated under their lock.
    pub checked: usize,
    /// Active positions still inside the open grace window.
    pub too_young: usize,
    /// Skipped because a signal handler held the lock.
    pub contended: usize,
    /// Closes detected, by symbol.
    pub closed: Vec<(String, CloseType)>,
    /// Evaluations that failed or were inconclusive.
    pub errors: usize,
}

/// Polls every active position at a fixed interval until shutdown.
pub struct PositionMonitor {
    engine: SharedEngine,
    locks: SharedSymbolLocks,
}

impl PositionMonitor {
    pub fn new(engine: SharedEngine, locks: SharedSymbolLocks) -> Self {
        Self { engine, locks }
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    ///
    /// Shutdown is only observed between cycles.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.engine.config().poll_interval;
        info!(poll_interval_ms = interval.as_millis() as u64, "starting position monitor");

        while !*shutdown.borrow() {
            let report = self.run_cycle(Utc::now()).await;
            if !report.closed.is_empty() || report.errors > 0 {
                info!(
                    checked = report.checked,
                    closed = report.closed.len(),
                    errors = report.errors,
                    "monitor cycle"
                );
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("shutdown channel closed");
                        break;
                    }
                }

                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("position monitor stopped");
    }

    /// One pass over the active positions.
    ///
    /// Per-symbol failures are logged and counted; they never abort the cycle.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let metrics = self.engine.metrics();
        let mut report = CycleReport::default();

        let state = match self.engine.store().load() {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "state load failed, skipping cycle");
                metrics.inc_monitor_errors();
                report.errors += 1;
                return report;
            }
        };

        let open_grace = self.engine.config().open_grace;

        for (symbol, position) in state.positions.iter().filter(|(_, p)| p.is_active) {
            let past_grace = position
                .age(now)
                .to_std()
                .map(|age| age >= open_grace)
                .unwrap_or(false);
            if !past_grace {
                report.too_young += 1;
                continue;
            }

            let Some(_guard) = self.locks.try_acquire(symbol) else {
                debug!(symbol = %symbol, "symbol locked, skipping this cycle");
                report.contended += 1;
                continue;
            };

            report.checked += 1;
            match self.engine.evaluate(symbol, now).await {
                Ok(Evaluation::Closed(close_type)) => {
                    report.closed.push((symbol.clone(), close_type));
                }
                Ok(Evaluation::Inconclusive) => {
                    metrics.inc_monitor_errors();
                    report.errors += 1;
                }
                Ok(Evaluation::Unchanged | Evaluation::NotActive) => {}
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "position evaluation failed");
                    metrics.inc_monitor_errors();
                    report.errors += 1;
                }
            }
        }

        metrics.inc_monitor_cycles();
        report
    }
}
