//! Polling scheduler
//!
//! Each tick fetches every target concurrently, derives records, appends the
//! whole tick as one batch and then evaluates alerts per team. Failures stay
//! local: a team whose fetch fails is skipped for that tick, a rejected batch
//! is dropped, a notification that cannot be delivered is only logged.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::adapters::ScoreboardSource;
use crate::analysis::{derive_records, down_services, DownService};
use crate::domain::{DerivedRecord, ServiceCatalog, Snapshot};
use crate::error::{MonitorError, Result};
use crate::persistence::MetricStore;
use crate::services::{HealthState, MonitorMetrics};
use crate::supervisor::{AlertBook, AlertDecision, Notifier};

/// What a single tick did
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub observed_at: Option<DateTime<Utc>>,
    /// Teams whose snapshot was fetched and derived
    pub fetched: Vec<String>,
    /// Teams skipped this tick, with the reason
    pub failed: Vec<(String, String)>,
    pub records_persisted: usize,
    pub append_error: Option<String>,
    /// Down services per team, for teams that were evaluated
    pub down: BTreeMap<String, Vec<String>>,
    pub notifications: usize,
}

/// Returned when the loop stops
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorOutcome {
    pub downtime: BTreeMap<String, u64>,
    pub services: Vec<String>,
    pub ticks: u64,
}

struct Observation {
    team: String,
    snapshot: Snapshot,
    records: Vec<DerivedRecord>,
    down: Vec<DownService>,
}

pub struct Monitor {
    targets: Vec<String>,
    catalog: ServiceCatalog,
    poll_interval: Duration,
    notify_on_start: bool,
    source: Arc<dyn ScoreboardSource>,
    notifier: Arc<dyn Notifier>,
    store: MetricStore,
    alerts: AlertBook,
    ticks: u64,
    metrics: Arc<MonitorMetrics>,
    health: Option<Arc<HealthState>>,
}

impl Monitor {
    pub fn new(
        targets: Vec<String>,
        catalog: ServiceCatalog,
        poll_interval: Duration,
        source: Arc<dyn ScoreboardSource>,
        notifier: Arc<dyn Notifier>,
        store: MetricStore,
    ) -> Result<Self> {
        if targets.is_empty() {
            return Err(MonitorError::InvalidConfig(
                "at least one target is required".to_string(),
            ));
        }
        if poll_interval.is_zero() {
            return Err(MonitorError::InvalidConfig(
                "poll interval must be positive".to_string(),
            ));
        }

        let alerts = AlertBook::new(&targets);

        Ok(Self {
            targets,
            catalog,
            poll_interval,
            notify_on_start: false,
            source,
            notifier,
            store,
            alerts,
            ticks: 0,
            metrics: Arc::new(MonitorMetrics::new()),
            health: None,
        })
    }

    pub fn with_notify_on_start(mut self, enabled: bool) -> Self {
        self.notify_on_start = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MonitorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn alerts(&self) -> &AlertBook {
        &self.alerts
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn metrics(&self) -> Arc<MonitorMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    pub fn outcome(&self) -> MonitorOutcome {
        MonitorOutcome {
            downtime: self.alerts.downtime_counts(),
            services: self.catalog.names(),
            ticks: self.ticks,
        }
    }

    /// Startup message confirming the notification channel works
    pub async fn send_check_notification(&self) -> bool {
        let message = format!(
            "Monitoring {} target(s): {}",
            self.targets.len(),
            self.targets.join(", ")
        );
        self.deliver("Check notification", &message).await
    }

    async fn deliver(&self, title: &str, message: &str) -> bool {
        match self.notifier.notify(title, message).await {
            Ok(()) => {
                info!("Notification sent via {}: {}", self.notifier.name(), title);
                self.metrics.inc_notifications_sent();
                true
            }
            Err(e) => {
                warn!("Notification '{}' failed: {}", title, e);
                self.metrics.inc_notification_failures();
                false
            }
        }
    }

    fn observe(&self, team: &str, fetched: Result<Snapshot>, at: DateTime<Utc>) -> Result<Observation> {
        let snapshot = fetched?;
        let records = derive_records(&snapshot, &self.catalog, at)?;
        let down = down_services(&snapshot, &self.catalog)?;

        for record in &records {
            debug!(
                "[{}] {} score={} sla={:.2}% flags=+{}/-{} down={}",
                team,
                record.service,
                record.score_service,
                record.sla_value,
                record.flags_submitted,
                record.flags_lost,
                record.is_down
            );
        }

        Ok(Observation {
            team: team.to_string(),
            snapshot,
            records,
            down,
        })
    }

    /// One fetch, derive, persist, evaluate cycle
    pub async fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let observed_at = Utc::now();
        info!("Tick #{} ({} targets)", self.ticks, self.targets.len());

        let mut report = TickReport {
            tick: self.ticks,
            observed_at: Some(observed_at),
            ..Default::default()
        };

        let source = &self.source;
        let fetches = self.targets.iter().map(|team| async move {
            (team.as_str(), source.snapshot(team).await)
        });
        let results = join_all(fetches).await;

        let mut observations = Vec::with_capacity(results.len());
        for (team, result) in results {
            match self.observe(team, result, observed_at) {
                Ok(observation) => {
                    report.fetched.push(team.to_string());
                    observations.push(observation);
                }
                Err(e) => {
                    warn!("[{}] skipped this tick: {}", team, e);
                    self.metrics.inc_fetch_failures();
                    report.failed.push((team.to_string(), e.to_string()));
                }
            }
        }

        let batch: Vec<DerivedRecord> = observations
            .iter()
            .flat_map(|o| o.records.iter().cloned())
            .collect();
        if !batch.is_empty() {
            match self.store.append(&batch).await {
                Ok(count) => {
                    report.records_persisted = count;
                    self.metrics.add_records_persisted(count);
                }
                Err(e) => {
                    warn!(
                        "Dropping {} records of tick #{}: {}",
                        batch.len(),
                        self.ticks,
                        e
                    );
                    self.metrics.inc_append_failures();
                    report.append_error = Some(e.to_string());
                }
            }
        }

        for observation in observations {
            if observation.snapshot.is_empty() {
                debug!("[{}] no rounds yet", observation.team);
                continue;
            }

            report.down.insert(
                observation.team.clone(),
                observation.down.iter().map(|d| d.name.clone()).collect(),
            );

            let decision = self
                .alerts
                .evaluate(&observation.team, &observation.down, observed_at);
            if let AlertDecision::Notify(alert) = decision {
                self.deliver(&alert.title, &alert.message).await;
                report.notifications += 1;
            }
        }

        self.metrics.record_tick(observed_at).await;
        if let Some(health) = &self.health {
            health.publish_alerts(&self.alerts).await;
            health.set_store_connected(self.store.ping().await);
        }

        info!(
            "Tick #{} done: {}/{} targets, {} records, {} notifications",
            report.tick,
            report.fetched.len(),
            self.targets.len(),
            report.records_persisted,
            report.notifications
        );
        report
    }

    /// Tick until `shutdown` fires (or its sender is dropped)
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> MonitorOutcome {
        info!(
            "Monitoring {:?} every {:?} ({} services)",
            self.targets,
            self.poll_interval,
            self.catalog.len()
        );

        if self.notify_on_start {
            self.send_check_notification().await;
        }

        loop {
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.recv() => {
                    info!("Shutdown requested, stopping after tick #{}", self.ticks);
                    break;
                }
            }
        }

        self.metrics.log_status();
        self.outcome()
    }
}

/// One row of a one-shot status check
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ServiceStatusRow {
    pub team: String,
    pub service: String,
    pub status: String,
    pub sla: String,
    pub score: i64,
    pub flags_submitted: i64,
    pub flags_lost: i64,
}

/// Fetch every target once and describe each service; nothing is persisted
pub async fn probe_targets(
    source: &dyn ScoreboardSource,
    targets: &[String],
    catalog: &ServiceCatalog,
) -> (Vec<ServiceStatusRow>, Vec<(String, MonitorError)>) {
    let observed_at = Utc::now();
    let results = join_all(targets.iter().map(|team| async move {
        let outcome = match source.snapshot(team).await {
            Ok(snapshot) => derive_records(&snapshot, catalog, observed_at)
                .and_then(|records| Ok((records, down_services(&snapshot, catalog)?))),
            Err(e) => Err(e),
        };
        (team.clone(), outcome)
    }))
    .await;

    let mut rows = Vec::new();
    let mut failures = Vec::new();
    for (team, outcome) in results {
        match outcome {
            Ok((records, down)) => {
                for record in records {
                    let status = down
                        .iter()
                        .find(|d| d.name == record.service)
                        .map(|d| format!("DOWN {}", d.describe()))
                        .unwrap_or_else(|| "UP".to_string());
                    rows.push(ServiceStatusRow {
                        team: team.clone(),
                        service: record.service,
                        status,
                        sla: format!("{:.2}%", record.sla_value),
                        score: record.score_service,
                        flags_submitted: record.flags_submitted,
                        flags_lost: record.flags_lost,
                    });
                }
            }
            Err(e) => failures.push((team, e)),
        }
    }

    (rows, failures)
}
