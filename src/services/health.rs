//! Status HTTP server
//!
//! Liveness probe, JSON status of the monitor and a Prometheus metrics
//! endpoint. The server only reads shared state published by the monitor.

use crate::services::MonitorMetrics;
use crate::supervisor::{AlertBook, AlertPhase};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Health status for a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    fn gauge(&self) -> i32 {
        match self {
            HealthStatus::Healthy => 1,
            HealthStatus::Degraded => 0,
            HealthStatus::Unhealthy => -1,
        }
    }
}

/// Component health check result
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Alert view of one monitored team
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamStatus {
    pub phase: AlertPhase,
    pub downtime_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub ticks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick: Option<DateTime<Utc>>,
    pub components: Vec<ComponentHealth>,
    pub teams: BTreeMap<String, TeamStatus>,
}

/// Shared state for the status server
pub struct HealthState {
    pub started_at: DateTime<Utc>,
    pub store_connected: AtomicBool,
    pub metrics: Option<Arc<MonitorMetrics>>,
    teams: RwLock<BTreeMap<String, TeamStatus>>,
    /// No completed tick for this long means the loop is stuck
    pub tick_staleness_threshold: Duration,
}

impl HealthState {
    pub fn new(tick_staleness_threshold: Duration) -> Self {
        Self {
            started_at: Utc::now(),
            store_connected: AtomicBool::new(false),
            metrics: None,
            teams: RwLock::new(BTreeMap::new()),
            tick_staleness_threshold,
        }
    }

    pub fn with_metrics(mut self, m: Arc<MonitorMetrics>) -> Self {
        self.metrics = Some(m);
        self
    }

    pub fn set_store_connected(&self, connected: bool) {
        self.store_connected.store(connected, Ordering::SeqCst);
    }

    /// Copy the current alert phases; called by the monitor after each tick
    pub async fn publish_alerts(&self, book: &AlertBook) {
        let snapshot = book
            .states()
            .iter()
            .map(|(team, state)| {
                (
                    team.clone(),
                    TeamStatus {
                        phase: state.phase(),
                        downtime_count: state.downtime_count,
                    },
                )
            })
            .collect();
        *self.teams.write().await = snapshot;
    }

    pub async fn teams(&self) -> BTreeMap<String, TeamStatus> {
        self.teams.read().await.clone()
    }

    fn tick_is_stale(&self, last_tick: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let reference = last_tick.unwrap_or(self.started_at);
        let elapsed = (now - reference).to_std().unwrap_or_default();
        elapsed > self.tick_staleness_threshold
    }

    pub async fn get_health(&self) -> HealthResponse {
        let now = Utc::now();
        let mut components = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let (ticks, last_tick) = match self.metrics {
            Some(ref m) => (m.ticks.load(Ordering::Relaxed), m.last_tick().await),
            None => (0, None),
        };

        // Polling loop
        let loop_status = if self.tick_is_stale(last_tick, now) {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        };
        if loop_status != HealthStatus::Healthy {
            overall_status = loop_status;
        }
        components.push(ComponentHealth {
            name: "poll_loop".to_string(),
            status: loop_status,
            message: (loop_status != HealthStatus::Healthy)
                .then(|| "No tick completed recently".to_string()),
        });

        // Metric store, best effort
        let store_connected = self.store_connected.load(Ordering::SeqCst);
        let store_status = if store_connected {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        if !store_connected && overall_status == HealthStatus::Healthy {
            overall_status = HealthStatus::Degraded;
        }
        components.push(ComponentHealth {
            name: "metric_store".to_string(),
            status: store_status,
            message: (!store_connected).then(|| "Disconnected".to_string()),
        });

        // Monitored targets
        let teams = self.teams().await;
        let down: Vec<&str> = teams
            .iter()
            .filter(|(_, s)| s.phase == AlertPhase::DownNotified)
            .map(|(team, _)| team.as_str())
            .collect();
        let targets_status = if down.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        if targets_status == HealthStatus::Degraded && overall_status == HealthStatus::Healthy {
            overall_status = HealthStatus::Degraded;
        }
        components.push(ComponentHealth {
            name: "targets".to_string(),
            status: targets_status,
            message: (!down.is_empty()).then(|| format!("Services down for: {}", down.join(", "))),
        });

        HealthResponse {
            status: overall_status,
            timestamp: now,
            uptime_seconds: (now - self.started_at).num_seconds().max(0) as u64,
            ticks,
            last_tick,
            components,
            teams,
        }
    }

    /// Prometheus text for `/metrics`
    pub async fn render_metrics(&self) -> String {
        let health = self.get_health().await;

        let mut text = format!(
            r#"# HELP scorewatch_up Health status (1=healthy, 0=degraded, -1=unhealthy)
# TYPE scorewatch_up gauge
scorewatch_up {}

# HELP scorewatch_uptime_seconds Uptime in seconds
# TYPE scorewatch_uptime_seconds counter
scorewatch_uptime_seconds {}

"#,
            health.status.gauge(),
            health.uptime_seconds,
        );

        if let Some(ref m) = self.metrics {
            text.push_str(&m.prometheus());
            text.push('\n');
        }

        text.push_str("# HELP scorewatch_team_down Team has services down (1) or all up (0)\n");
        text.push_str("# TYPE scorewatch_team_down gauge\n");
        for (team, status) in &health.teams {
            text.push_str(&format!(
                "scorewatch_team_down{{team=\"{}\"}} {}\n",
                escape_label(team),
                (status.phase == AlertPhase::DownNotified) as u8
            ));
        }
        text.push_str("\n# HELP scorewatch_team_downtime_total Down observations per team\n");
        text.push_str("# TYPE scorewatch_team_downtime_total counter\n");
        for (team, status) in &health.teams {
            text.push_str(&format!(
                "scorewatch_team_downtime_total{{team=\"{}\"}} {}\n",
                escape_label(team),
                status.downtime_count
            ));
        }

        text
    }
}

/// Prometheus label value escaping (backslash, double quote, newline)
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Status server
pub struct HealthServer {
    state: Arc<HealthState>,
    port: u16,
}

impl HealthServer {
    pub fn new(state: Arc<HealthState>, port: u16) -> Self {
        Self { state, port }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(Arc::clone(&self.state))
    }

    /// Start the status server
    pub async fn run(&self) -> crate::Result<()> {
        let app = self.router();

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting status server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    pub fn state(&self) -> Arc<HealthState> {
        Arc::clone(&self.state)
    }
}

async fn health_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.get_health().await;
    let status_code = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        state.render_metrics().await,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DownService;

    fn state() -> HealthState {
        HealthState::new(Duration::from_secs(60)).with_metrics(Arc::new(MonitorMetrics::new()))
    }

    #[tokio::test]
    async fn test_fresh_state_is_degraded_without_store() {
        let health = state().get_health().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.ticks, 0);
    }

    #[tokio::test]
    async fn test_healthy_after_tick() {
        let state = state();
        state.set_store_connected(true);
        if let Some(m) = &state.metrics {
            m.record_tick(Utc::now()).await;
        }
        let health = state.get_health().await;
        assert!(health.status.is_healthy());
        assert_eq!(health.ticks, 1);
    }

    #[tokio::test]
    async fn test_stale_loop_is_unhealthy() {
        let state = HealthState::new(Duration::from_secs(0));
        state.set_store_connected(true);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(state.get_health().await.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_published_alerts_show_in_status_and_metrics() {
        let state = state();
        state.set_store_connected(true);
        if let Some(m) = &state.metrics {
            m.record_tick(Utc::now()).await;
        }

        let mut book = AlertBook::new(&["acme", "globex"]);
        let down = vec![DownService {
            index: 0,
            name: "svc-1".to_string(),
            causes: Vec::new(),
        }];
        book.evaluate("acme", &down, Utc::now());
        state.publish_alerts(&book).await;

        let health = state.get_health().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.teams["acme"].phase, AlertPhase::DownNotified);
        assert_eq!(health.teams["acme"].downtime_count, 1);

        let text = state.render_metrics().await;
        assert!(text.contains("scorewatch_team_down{team=\"acme\"} 1"));
        assert!(text.contains("scorewatch_team_down{team=\"globex\"} 0"));
        assert!(text.contains("scorewatch_ticks_total 1"));
    }

    #[test]
    fn test_escape_label() {
        assert_eq!(escape_label("Università di Salerno"), "Università di Salerno");
        assert_eq!(escape_label(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_label("x\ny"), "x\\ny");
    }

    #[tokio::test]
    async fn test_team_labels_are_escaped() {
        let state = state();
        let book = AlertBook::new(&["the \"quoted\" team"]);
        state.publish_alerts(&book).await;

        let text = state.render_metrics().await;
        assert!(text.contains(r#"scorewatch_team_down{team="the \"quoted\" team"} 0"#));
        assert!(text.contains(r#"scorewatch_team_downtime_total{team="the \"quoted\" team"} 0"#));
    }
}
