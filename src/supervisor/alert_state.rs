//! Edge-triggered alert state per monitored team
//!
//! A team is either `ALL_UP` or `DOWN_NOTIFIED`. Only the transition into
//! `DOWN_NOTIFIED` produces an alert; staying down is silent but still counted.
//! One alert per team per transition, listing every service down at that poll.
//! The downtime counter grows by one per down service per poll.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::analysis::DownService;

/// Alert phase of one team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertPhase {
    AllUp,
    DownNotified,
}

impl AlertPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPhase::AllUp => "ALL_UP",
            AlertPhase::DownNotified => "DOWN_NOTIFIED",
        }
    }
}

impl std::fmt::Display for AlertPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-team alert bookkeeping, process lifetime only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertState {
    /// Latch: a notification went out for the current down period
    pub notified: bool,
    /// Down observations, one per (poll, down service)
    pub downtime_count: u64,
}

impl AlertState {
    pub fn phase(&self) -> AlertPhase {
        if self.notified {
            AlertPhase::DownNotified
        } else {
            AlertPhase::AllUp
        }
    }
}

/// Notification payload for a newly down team
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub team: String,
    pub title: String,
    pub message: String,
    pub services: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn services_down(team: &str, down: &[DownService], timestamp: DateTime<Utc>) -> Self {
        let described: Vec<String> = down.iter().map(|d| d.describe()).collect();
        let message = format!(
            "{} down for target {}: {} | {}",
            if down.len() == 1 { "Service" } else { "Services" },
            team,
            described.join(", "),
            timestamp.format("%H:%M:%S")
        );

        Self {
            team: team.to_string(),
            title: format!("Alert: {}", team),
            message,
            services: down.iter().map(|d| d.name.clone()).collect(),
            timestamp,
        }
    }
}

/// Outcome of evaluating one poll for one team
#[derive(Debug, Clone, PartialEq)]
pub enum AlertDecision {
    /// ALL_UP -> DOWN_NOTIFIED: deliver this alert
    Notify(Alert),
    /// DOWN_NOTIFIED -> DOWN_NOTIFIED: debounced
    StillDown { services: usize },
    /// DOWN_NOTIFIED -> ALL_UP
    Recovered,
    /// ALL_UP -> ALL_UP
    AllUp,
}

impl AlertDecision {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            AlertDecision::Notify(alert) => Some(alert),
            _ => None,
        }
    }
}

/// Owned mapping from team to alert state; teams never share state
#[derive(Debug, Clone, Default)]
pub struct AlertBook {
    states: BTreeMap<String, AlertState>,
}

impl AlertBook {
    /// One `ALL_UP` state per configured target
    pub fn new<S: AsRef<str>>(targets: &[S]) -> Self {
        Self {
            states: targets
                .iter()
                .map(|t| (t.as_ref().to_string(), AlertState::default()))
                .collect(),
        }
    }

    /// Apply the latest poll's down services for a team
    pub fn evaluate(
        &mut self,
        team: &str,
        down: &[DownService],
        observed_at: DateTime<Utc>,
    ) -> AlertDecision {
        let state = self.states.entry(team.to_string()).or_default();

        if down.is_empty() {
            return if state.notified {
                state.notified = false;
                info!("[{}] All services are UP again", team);
                AlertDecision::Recovered
            } else {
                debug!("[{}] All services are UP", team);
                AlertDecision::AllUp
            };
        }

        state.downtime_count += down.len() as u64;

        let names: Vec<String> = down.iter().map(|d| d.describe()).collect();
        warn!(
            "[{}] Services down: {} (downtime observations: {})",
            team,
            names.join(", "),
            state.downtime_count
        );

        if state.notified {
            return AlertDecision::StillDown {
                services: down.len(),
            };
        }

        state.notified = true;
        AlertDecision::Notify(Alert::services_down(team, down, observed_at))
    }

    pub fn state(&self, team: &str) -> Option<&AlertState> {
        self.states.get(team)
    }

    pub fn phase(&self, team: &str) -> AlertPhase {
        self.states
            .get(team)
            .map(|s| s.phase())
            .unwrap_or(AlertPhase::AllUp)
    }

    pub fn downtime_counts(&self) -> BTreeMap<String, u64> {
        self.states
            .iter()
            .map(|(team, state)| (team.clone(), state.downtime_count))
            .collect()
    }

    pub fn states(&self) -> &BTreeMap<String, AlertState> {
        &self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CheckStatus;

    fn down(names: &[&str]) -> Vec<DownService> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| DownService {
                index,
                name: name.to_string(),
                causes: vec![CheckStatus::Offline],
            })
            .collect()
    }

    #[test]
    fn test_initial_state_is_all_up() {
        let book = AlertBook::new(&["acme", "globex"]);
        assert_eq!(book.phase("acme"), AlertPhase::AllUp);
        assert_eq!(book.state("globex"), Some(&AlertState::default()));
        assert_eq!(book.downtime_counts().len(), 2);
    }

    #[test]
    fn test_debounce_sends_once_and_counts_every_poll() {
        let mut book = AlertBook::new(&["acme"]);
        let now = Utc::now();

        let mut notifications = 0;
        for _ in 0..5 {
            if book.evaluate("acme", &down(&["svc-1"]), now).alert().is_some() {
                notifications += 1;
            }
        }

        assert_eq!(notifications, 1);
        assert_eq!(book.state("acme").unwrap().downtime_count, 5);
        assert_eq!(book.phase("acme"), AlertPhase::DownNotified);
    }

    #[test]
    fn test_downtime_counts_each_down_service() {
        let mut book = AlertBook::new(&["acme"]);
        let now = Utc::now();
        for _ in 0..3 {
            book.evaluate("acme", &down(&["svc-1", "svc-2"]), now);
        }
        assert_eq!(book.state("acme").unwrap().downtime_count, 6);
    }

    #[test]
    fn test_down_up_down_notifies_twice() {
        let mut book = AlertBook::new(&["acme"]);
        let now = Utc::now();

        let first = book.evaluate("acme", &down(&["svc-1"]), now);
        assert!(first.alert().is_some());
        assert_eq!(book.evaluate("acme", &[], now), AlertDecision::Recovered);
        assert_eq!(book.phase("acme"), AlertPhase::AllUp);
        let second = book.evaluate("acme", &down(&["svc-1"]), now);
        assert!(second.alert().is_some());
        assert_eq!(book.state("acme").unwrap().downtime_count, 2);
    }

    #[test]
    fn test_alert_batches_services() {
        let mut book = AlertBook::new(&["acme"]);
        let decision = book.evaluate("acme", &down(&["svc-1", "svc-2"]), Utc::now());
        let alert = decision.alert().unwrap();
        assert_eq!(alert.services, vec!["svc-1", "svc-2"]);
        assert!(alert.message.contains("svc-1 (OFFLINE), svc-2 (OFFLINE)"));
        assert!(alert.message.contains("target acme"));
        assert_eq!(alert.title, "Alert: acme");
    }

    #[test]
    fn test_teams_do_not_share_state() {
        let mut book = AlertBook::new(&["acme", "globex"]);
        let now = Utc::now();
        book.evaluate("acme", &down(&["svc-1"]), now);
        assert_eq!(book.phase("globex"), AlertPhase::AllUp);
        assert!(book
            .evaluate("globex", &down(&["svc-1"]), now)
            .alert()
            .is_some());
        assert_eq!(book.evaluate("globex", &[], now), AlertDecision::Recovered);
        assert_eq!(book.phase("acme"), AlertPhase::DownNotified);
    }

    #[test]
    fn test_all_up_stays_silent() {
        let mut book = AlertBook::new(&["acme"]);
        assert_eq!(book.evaluate("acme", &[], Utc::now()), AlertDecision::AllUp);
        assert_eq!(book.state("acme").unwrap().downtime_count, 0);
    }
}
