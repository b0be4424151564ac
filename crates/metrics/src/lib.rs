//! Engine counters and a health snapshot derived from monitor liveness.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default monitor cadence the health thresholds are scaled from.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Thread-safe metrics collector for the position engine.
#[derive(Debug)]
pub struct EngineMetrics {
    // Signal path
    signals_received: AtomicU64,
    duplicates: AtomicU64,
    ignored: AtomicU64,
    rejected: AtomicU64,

    // Lifecycle transitions
    positions_opened: AtomicU64,
    reinforcements: AtomicU64,
    take_profits: AtomicU64,
    stop_losses: AtomicU64,
    manual_closes: AtomicU64,

    // Monitor
    monitor_cycles: AtomicU64,
    monitor_errors: AtomicU64,

    poll_interval: Duration,
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_cycle_time: Option<Instant>,
    last_error_time: Option<Instant>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl EngineMetrics {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            signals_received: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            positions_opened: AtomicU64::new(0),
            reinforcements: AtomicU64::new(0),
            take_profits: AtomicU64::new(0),
            stop_losses: AtomicU64::new(0),
            manual_closes: AtomicU64::new(0),
            monitor_cycles: AtomicU64::new(0),
            monitor_errors: AtomicU64::new(0),
            poll_interval,
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_cycle_time: None,
                last_error_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_signals_received(&self) {
        self.signals_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    pub fn inc_positions_opened(&self) {
        self.positions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reinforcements(&self) {
        self.reinforcements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_take_profits(&self) {
        self.take_profits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stop_losses(&self) {
        self.stop_losses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_manual_closes(&self) {
        self.manual_closes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_monitor_cycles(&self) {
        self.monitor_cycles.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_cycle_time = Some(Instant::now());
    }

    pub fn inc_monitor_errors(&self) {
        self.monitor_errors.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_error_time = Some(Instant::now());
    }

    // --- Getter methods ---

    pub fn signals_received(&self) -> u64 {
        self.signals_received.load(Ordering::Relaxed)
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn positions_opened(&self) -> u64 {
        self.positions_opened.load(Ordering::Relaxed)
    }

    pub fn reinforcements(&self) -> u64 {
        self.reinforcements.load(Ordering::Relaxed)
    }

    pub fn take_profits(&self) -> u64 {
        self.take_profits.load(Ordering::Relaxed)
    }

    pub fn stop_losses(&self) -> u64 {
        self.stop_losses.load(Ordering::Relaxed)
    }

    pub fn manual_closes(&self) -> u64 {
        self.manual_closes.load(Ordering::Relaxed)
    }

    pub fn monitor_cycles(&self) -> u64 {
        self.monitor_cycles.load(Ordering::Relaxed)
    }

    pub fn monitor_errors(&self) -> u64 {
        self.monitor_errors.load(Ordering::Relaxed)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_cycle(&self) -> Option<f64> {
        self.inner
            .read()
            .last_cycle_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_error(&self) -> Option<f64> {
        self.inner
            .read()
            .last_error_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            signals_received: self.signals_received(),
            duplicates: self.duplicates(),
            ignored: self.ignored(),
            rejected: self.rejected(),
            positions_opened: self.positions_opened(),
            reinforcements: self.reinforcements(),
            take_profits: self.take_profits(),
            stop_losses: self.stop_losses(),
            manual_closes: self.manual_closes(),
            monitor_cycles: self.monitor_cycles(),
            monitor_errors: self.monitor_errors(),
            poll_interval_secs: self.poll_interval.as_secs_f64(),
            uptime_secs: self.uptime_secs(),
            secs_since_last_cycle: self.secs_since_last_cycle(),
            secs_since_last_error: self.secs_since_last_error(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub signals_received: u64,
    pub duplicates: u64,
    pub ignored: u64,
    pub rejected: u64,
    pub positions_opened: u64,
    pub reinforcements: u64,
    pub take_profits: u64,
    pub stop_losses: u64,
    pub manual_closes: u64,
    pub monitor_cycles: u64,
    pub monitor_errors: u64,
    pub poll_interval_secs: f64,
    pub uptime_secs: f64,
    pub secs_since_last_cycle: Option<f64>,
    pub secs_since_last_error: Option<f64>,
}

/// Health status of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Monitor is cycling on schedule.
    Healthy,
    /// Monitor has missed a few cycles.
    Degraded,
    /// Monitor looks stalled.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    /// Missed poll intervals before the monitor is considered stale.
    const STALE_CYCLES: f64 = 3.0;
    /// Missed poll intervals before the monitor is considered stalled.
    const UNHEALTHY_CYCLES: f64 = 6.0;

    /// Determine health from how long ago the monitor last completed a cycle.
    pub fn health_status(&self) -> HealthStatus {
        let stale = self.poll_interval_secs * Self::STALE_CYCLES;
        let unhealthy = self.poll_interval_secs * Self::UNHEALTHY_CYCLES;

        // Before the first cycle, judge by uptime
        let elapsed = self.secs_since_last_cycle.unwrap_or(self.uptime_secs);

        if elapsed > unhealthy {
            HealthStatus::Unhealthy
        } else if elapsed > stale {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Closed trades seen since start.
    pub fn closes(&self) -> u64 {
        self.take_profits + self.stop_losses + self.manual_closes
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Engine Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Signals received:    {}", self.signals_received)?;
        writeln!(f, "Duplicates:          {}", self.duplicates)?;
        writeln!(f, "Ignored:             {}", self.ignored)?;
        writeln!(f, "Rejected:            {}", self.rejected)?;
        writeln!(f, "Positions opened:    {}", self.positions_opened)?;
        writeln!(f, "Reinforcements:      {}", self.reinforcements)?;
        writeln!(f, "Take profits:        {}", self.take_profits)?;
        writeln!(f, "Stop losses:         {}", self.stop_losses)?;
        writeln!(f, "Manual closes:       {}", self.manual_closes)?;
        writeln!(f, "Monitor cycles:      {}", self.monitor_cycles)?;
        writeln!(f, "Monitor errors:      {}", self.monitor_errors)?;
        if let Some(secs) = self.secs_since_last_cycle {
            writeln!(f, "Since last cycle:    {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_error {
            writeln!(f, "Since last error:    {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<EngineMetrics>;

pub fn create_metrics(poll_interval: Duration) -> SharedMetrics {
    Arc::new(EngineMetrics::new(poll_interval))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(uptime_secs: f64, secs_since_last_cycle: Option<f64>) -> MetricsSnapshot {
        MetricsSnapshot {
            signals_received: 0,
            duplicates: 0,
            ignored: 0,
            rejected: 0,
            positions_opened: 0,
            reinforcements: 0,
            take_profits: 0,
            stop_losses: 0,
            manual_closes: 0,
            monitor_cycles: 0,
            monitor_errors: 0,
            poll_interval_secs: 5.0,
            uptime_secs,
            secs_since_last_cycle,
            secs_since_last_error: None,
        }
    }

    #[test]
    fn test_metrics_increment() {
        let metrics = EngineMetrics::default();

        metrics.inc_signals_received();
        metrics.inc_signals_received();
        metrics.inc_duplicates();
        metrics.inc_stop_losses();
        metrics.inc_take_profits();

        assert_eq!(metrics.signals_received(), 2);
        assert_eq!(metrics.duplicates(), 1);
        assert_eq!(metrics.stop_losses(), 1);
        assert_eq!(metrics.snapshot().closes(), 2);
    }

    #[test]
    fn test_monitor_cycle_time() {
        let metrics = EngineMetrics::default();
        assert!(metrics.secs_since_last_cycle().is_none());

        metrics.inc_monitor_cycles();

        let secs = metrics.secs_since_last_cycle();
        assert!(secs.is_some());
        assert!(secs.unwrap() < 1.0);
    }

    #[test]
    fn test_errors_record_time() {
        let metrics = create_metrics(Duration::from_secs(1));
        metrics.inc_monitor_errors();
        metrics.inc_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.monitor_errors, 1);
        assert_eq!(snapshot.rejected, 1);
        assert!(snapshot.secs_since_last_error.is_some());
        assert_eq!(snapshot.poll_interval_secs, 1.0);
    }

    #[test]
    fn test_health_status_healthy() {
        assert_eq!(snapshot(120.0, Some(4.0)).health_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_health_status_healthy_during_startup() {
        assert_eq!(snapshot(2.0, None).health_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_health_status_degraded_missed_cycles() {
        assert_eq!(snapshot(120.0, Some(20.0)).health_status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_health_status_unhealthy_stalled_monitor() {
        assert_eq!(snapshot(300.0, Some(45.0)).health_status(), HealthStatus::Unhealthy);
        // never cycled at all
        assert_eq!(snapshot(120.0, None).health_status(), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_health_status_boundary() {
        // exactly at the stale threshold is still healthy
        assert_eq!(snapshot(120.0, Some(15.0)).health_status(), HealthStatus::Healthy);
        assert_eq!(snapshot(120.0, Some(30.0)).health_status(), HealthStatus::Degraded);
    }

    #[test]
    fn test_display_contains_counters() {
        let metrics = EngineMetrics::default();
        metrics.inc_positions_opened();
        let text = metrics.snapshot().to_string();
        assert!(text.contains("=== Engine Metrics ==="));
        assert!(text.contains("Positions opened:    1"));
    }

    #[test]
    fn test_health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "HEALTHY");
        assert_eq!(HealthStatus::Unhealthy.to_string(), "UNHEALTHY");
    }
}
