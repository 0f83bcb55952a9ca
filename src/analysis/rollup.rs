//! Per-team aggregates over the metric store, read after a monitoring run.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::domain::{Column, RecordFilter, RecordRow};
use crate::persistence::MetricStore;

/// Aggregates for one (team, service)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceRollup {
    pub service: String,
    /// Latest running total
    pub flags_submitted: Option<i64>,
    /// Latest running total
    pub flags_lost: Option<i64>,
    pub min_sla: Option<f64>,
    pub max_score: Option<i64>,
    pub min_score: Option<i64>,
    pub samples: usize,
}

impl ServiceRollup {
    pub fn from_rows(service: &str, rows: &[RecordRow]) -> Self {
        let latest = rows.last();

        Self {
            service: service.to_string(),
            flags_submitted: latest.and_then(|r| r.flags_submitted),
            flags_lost: latest.and_then(|r| r.flags_lost),
            min_sla: rows
                .iter()
                .filter_map(|r| r.sla_value)
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v)))),
            max_score: rows.iter().filter_map(|r| r.score_service).max(),
            min_score: rows.iter().filter_map(|r| r.score_service).min(),
            samples: rows.len(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.samples > 0
    }
}

/// Aggregates for one team
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamRollup {
    pub team: String,
    pub max_team_score: Option<i64>,
    pub min_team_score: Option<i64>,
    pub services: Vec<ServiceRollup>,
    pub downtime_count: u64,
}

impl TeamRollup {
    pub fn has_data(&self) -> bool {
        self.max_team_score.is_some() || self.services.iter().any(|s| s.has_data())
    }

    pub fn total_flags_submitted(&self) -> i64 {
        self.services.iter().filter_map(|s| s.flags_submitted).sum()
    }

    pub fn total_flags_lost(&self) -> i64 {
        self.services.iter().filter_map(|s| s.flags_lost).sum()
    }

    /// Lowest SLA across services, if any service has data
    pub fn worst_sla(&self) -> Option<(&str, f64)> {
        self.services
            .iter()
            .filter_map(|s| s.min_sla.map(|v| (s.service.as_str(), v)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Builds [`TeamRollup`]s from a [`MetricStore`]
pub struct RollupReporter<'a> {
    store: &'a MetricStore,
}

impl<'a> RollupReporter<'a> {
    pub fn new(store: &'a MetricStore) -> Self {
        Self { store }
    }

    /// Roll up one team. Missing rows yield empty aggregates, never an error.
    pub async fn team(&self, team: &str, services: &[String], downtime_count: u64) -> TeamRollup {
        let team_rows = self
            .store
            .query_or_empty(&RecordFilter::for_team(team), &[Column::ScoreTeam])
            .await;

        let services: Vec<String> = if services.is_empty() {
            self.store.services_for(team).await.unwrap_or_else(|e| {
                warn!("[{}] could not list recorded services: {}", team, e);
                Vec::new()
            })
        } else {
            services.to_vec()
        };

        let mut service_rollups = Vec::with_capacity(services.len());
        for service in &services {
            let rows = self
                .store
                .query_or_empty(
                    &RecordFilter::for_team_service(team, service),
                    &[
                        Column::ScoreService,
                        Column::FlagsSubmitted,
                        Column::FlagsLost,
                        Column::SlaValue,
                    ],
                )
                .await;
            service_rollups.push(ServiceRollup::from_rows(service, &rows));
        }

        let rollup = TeamRollup {
            team: team.to_string(),
            max_team_score: team_rows.iter().filter_map(|r| r.score_team).max(),
            min_team_score: team_rows.iter().filter_map(|r| r.score_team).min(),
            services: service_rollups,
            downtime_count,
        };
        debug!(
            "[{}] rollup built from {} team rows",
            team,
            team_rows.len()
        );
        rollup
    }

    /// Down observations recorded in the store, for reports built after the run
    pub async fn downtime_from_store(&self, teams: &[String]) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for team in teams {
            let rows = self
                .store
                .query_or_empty(&RecordFilter::for_team(team), &[Column::IsDown])
                .await;
            let down = rows.iter().filter(|r| r.is_down == Some(true)).count() as u64;
            counts.insert(team.clone(), down);
        }
        counts
    }

    /// Roll up every team in `downtime` plus every team present in the store
    pub async fn all(
        &self,
        downtime: &BTreeMap<String, u64>,
        services: &[String],
    ) -> Vec<TeamRollup> {
        let mut teams: BTreeSet<String> = downtime.keys().cloned().collect();
        match self.store.teams().await {
            Ok(stored) => teams.extend(stored),
            Err(e) => warn!("Could not list recorded teams: {}", e),
        }

        let mut rollups = Vec::with_capacity(teams.len());
        for team in &teams {
            let count = downtime.get(team).copied().unwrap_or(0);
            rollups.push(self.team(team, services, count).await);
        }
        rollups
    }
}
