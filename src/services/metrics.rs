use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

/// Process counters for the monitoring loop
pub struct MonitorMetrics {
    /// Completed ticks
    pub ticks: AtomicU64,
    /// Per-team fetch or derivation failures
    pub fetch_failures: AtomicU64,
    /// Rows appended to the store
    pub records_persisted: AtomicU64,
    /// Tick batches dropped by the store
    pub append_failures: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub notification_failures: AtomicU64,
    last_tick: RwLock<Option<DateTime<Utc>>>,
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            records_persisted: AtomicU64::new(0),
            append_failures: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notification_failures: AtomicU64::new(0),
            last_tick: RwLock::new(None),
        }
    }

    pub async fn record_tick(&self, at: DateTime<Utc>) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        *self.last_tick.write().await = Some(at);
    }

    pub async fn last_tick(&self) -> Option<DateTime<Utc>> {
        *self.last_tick.read().await
    }

    pub fn inc_fetch_failures(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_records_persisted(&self, count: usize) {
        self.records_persisted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn inc_append_failures(&self) {
        self.append_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notification_failures(&self) {
        self.notification_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Current metrics as a formatted string
    pub fn summary(&self) -> String {
        format!(
            "ticks={} fetch_failures={} records={} append_failures={} notifications={}/{}",
            self.ticks.load(Ordering::Relaxed),
            self.fetch_failures.load(Ordering::Relaxed),
            self.records_persisted.load(Ordering::Relaxed),
            self.append_failures.load(Ordering::Relaxed),
            self.notifications_sent.load(Ordering::Relaxed),
            self.notifications_sent.load(Ordering::Relaxed)
                + self.notification_failures.load(Ordering::Relaxed),
        )
    }

    /// Export metrics in Prometheus format
    pub fn prometheus(&self) -> String {
        format!(
            r#"# HELP scorewatch_ticks_total Completed polling ticks
# TYPE scorewatch_ticks_total counter
scorewatch_ticks_total {}

# HELP scorewatch_fetch_failures_total Per-team fetch failures
# TYPE scorewatch_fetch_failures_total counter
scorewatch_fetch_failures_total {}

# HELP scorewatch_records_persisted_total Derived records appended to the store
# TYPE scorewatch_records_persisted_total counter
scorewatch_records_persisted_total {}

# HELP scorewatch_append_failures_total Tick batches dropped by the store
# TYPE scorewatch_append_failures_total counter
scorewatch_append_failures_total {}

# HELP scorewatch_notifications_sent_total Notifications delivered
# TYPE scorewatch_notifications_sent_total counter
scorewatch_notifications_sent_total {}

# HELP scorewatch_notification_failures_total Notifications that failed to deliver
# TYPE scorewatch_notification_failures_total counter
scorewatch_notification_failures_total {}
"#,
            self.ticks.load(Ordering::Relaxed),
            self.fetch_failures.load(Ordering::Relaxed),
            self.records_persisted.load(Ordering::Relaxed),
            self.append_failures.load(Ordering::Relaxed),
            self.notifications_sent.load(Ordering::Relaxed),
            self.notification_failures.load(Ordering::Relaxed),
        )
    }

    /// Log periodic status
    pub fn log_status(&self) {
        info!("Monitor status: {}", self.summary());
    }
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_and_export() {
        let metrics = MonitorMetrics::new();
        assert!(metrics.last_tick().await.is_none());

        metrics.record_tick(Utc::now()).await;
        metrics.add_records_persisted(4);
        metrics.inc_notifications_sent();
        metrics.inc_notification_failures();

        assert!(metrics.last_tick().await.is_some());
        let text = metrics.prometheus();
        assert!(text.contains("scorewatch_ticks_total 1\n"));
        assert!(text.contains("scorewatch_records_persisted_total 4\n"));
        assert!(metrics.summary().contains("notifications=1/2"));
    }
}
