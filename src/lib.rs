pub mod adapters;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod services;
pub mod supervisor;

pub use adapters::{ScoreboardClient, ScoreboardSource, WebhookNotifier};
pub use config::AppConfig;
pub use error::{MonitorError, Result};
pub use persistence::MetricStore;
pub use services::{Monitor, MonitorMetrics, MonitorOutcome, TickReport};
pub use supervisor::{AlertBook, AlertDecision, AlertPhase, AlertState, Notifier};
