//! Alerting for Monitored Teams
//!
//! This module decides when a human is told about a fault:
//! - Alert state machine with edge-triggered notifications per team
//! - Notifier capability and its log/fan-out implementations

pub mod alert_state;
pub mod notifier;

pub use alert_state::{Alert, AlertBook, AlertDecision, AlertPhase, AlertState};
pub use notifier::{FanoutNotifier, LogNotifier, Notifier};
