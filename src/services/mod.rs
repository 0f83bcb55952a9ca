pub mod health;
pub mod metrics;
pub mod monitor;

pub use health::{HealthServer, HealthState, HealthStatus, TeamStatus};
pub use metrics::MonitorMetrics;
pub use monitor::{probe_targets, Monitor, MonitorOutcome, ServiceStatusRow, TickReport};
