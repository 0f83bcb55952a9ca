//! Metric derivation from a scoreboard snapshot.
//!
//! Every function here is pure: same snapshot in, same metrics out. SLA is
//! recomputed from round 0 on each call, so replayed or rewritten rounds never
//! leave stale state behind.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CheckStatus, DerivedRecord, Round, ServiceCatalog, ServiceRound, Snapshot};
use crate::error::{MonitorError, Result};

/// Latest-round figures for one service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceMetrics {
    pub score_service: i64,
    pub flags_submitted: i64,
    pub flags_lost: i64,
}

/// A service observed down in the latest round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownService {
    pub index: usize,
    pub name: String,
    pub causes: Vec<CheckStatus>,
}

impl DownService {
    pub fn describe(&self) -> String {
        if self.causes.is_empty() {
            return self.name.clone();
        }
        let causes: Vec<String> = self.causes.iter().map(|c| c.to_string()).collect();
        format!("{} ({})", self.name, causes.join(", "))
    }
}

/// A service is down when any of its checks did not pass
pub fn derive_down(service_round: &ServiceRound) -> bool {
    service_round.checks.iter().any(|c| !c.passed())
}

/// A round counts toward SLA when every check passed (vacuously true with no checks)
pub fn round_passed(service_round: &ServiceRound) -> bool {
    service_round.checks.iter().all(|c| c.passed())
}

fn service_at(round: &Round, index: usize) -> Option<&ServiceRound> {
    round.services.get(index)
}

/// Score and flag totals of one service at the latest round
pub fn derive_service_metrics(snapshot: &Snapshot, index: usize) -> Option<ServiceMetrics> {
    let service = service_at(snapshot.latest()?, index)?;
    Some(ServiceMetrics {
        score_service: service.score,
        flags_submitted: service.stolen,
        flags_lost: service.lost,
    })
}

/// Cumulative SLA per round: `100 * passed_rounds[0..=r] / (r + 1)`
pub fn sla_series(snapshot: &Snapshot, index: usize) -> Option<Vec<f64>> {
    let mut passed = 0u64;
    let mut series = Vec::with_capacity(snapshot.rounds.len());

    for (r, round) in snapshot.rounds.iter().enumerate() {
        if round_passed(service_at(round, index)?) {
            passed += 1;
        }
        series.push(passed as f64 / (r as u64 + 1) as f64 * 100.0);
    }

    Some(series)
}

/// SLA of one service at the latest round
pub fn derive_sla(snapshot: &Snapshot, index: usize) -> Option<f64> {
    sla_series(snapshot, index)?.last().copied()
}

/// Score of one service per round
pub fn score_series(snapshot: &Snapshot, index: usize) -> Option<Vec<i64>> {
    snapshot
        .rounds
        .iter()
        .map(|round| service_at(round, index).map(|s| s.score))
        .collect()
}

/// Sum of the monitored services' scores per round
pub fn team_score_series(snapshot: &Snapshot, catalog: &ServiceCatalog) -> Option<Vec<i64>> {
    snapshot
        .rounds
        .iter()
        .map(|round| {
            catalog
                .iter()
                .map(|(index, _)| service_at(round, index).map(|s| s.score))
                .sum::<Option<i64>>()
        })
        .collect()
}

/// Team rank per round
pub fn rank_series(snapshot: &Snapshot) -> Vec<u32> {
    snapshot.rounds.iter().map(|r| r.rank).collect()
}

/// Every round must list each configured service index
fn ensure_services(snapshot: &Snapshot, catalog: &ServiceCatalog) -> Result<()> {
    for (r, round) in snapshot.rounds.iter().enumerate() {
        if round.services.len() <= catalog.max_index() {
            return Err(MonitorError::SourceUnavailable(format!(
                "team {}: round {} lists {} services, configuration expects index {}",
                snapshot.team,
                r,
                round.services.len(),
                catalog.max_index()
            )));
        }
    }
    Ok(())
}

/// Flatten a snapshot into one record per configured service
pub fn derive_records(
    snapshot: &Snapshot,
    catalog: &ServiceCatalog,
    timestamp: DateTime<Utc>,
) -> Result<Vec<DerivedRecord>> {
    ensure_services(snapshot, catalog)?;

    let Some(latest) = snapshot.latest() else {
        return Ok(Vec::new());
    };

    let score_team = team_score_series(snapshot, catalog)
        .and_then(|s| s.last().copied())
        .unwrap_or_default();

    let mut records = Vec::with_capacity(catalog.len());
    for (index, name) in catalog.iter() {
        let (Some(metrics), Some(sla_value), Some(service)) = (
            derive_service_metrics(snapshot, index),
            derive_sla(snapshot, index),
            service_at(latest, index),
        ) else {
            continue;
        };

        records.push(DerivedRecord {
            team: snapshot.team.clone(),
            service: name.to_string(),
            score_team,
            score_service: metrics.score_service,
            flags_submitted: metrics.flags_submitted,
            flags_lost: metrics.flags_lost,
            sla_value,
            is_down: derive_down(service),
            timestamp,
        });
    }

    Ok(records)
}

/// Configured services that are down in the latest round
pub fn down_services(snapshot: &Snapshot, catalog: &ServiceCatalog) -> Result<Vec<DownService>> {
    ensure_services(snapshot, catalog)?;

    let Some(latest) = snapshot.latest() else {
        return Ok(Vec::new());
    };

    Ok(catalog
        .iter()
        .filter_map(|(index, name)| {
            let service = service_at(latest, index)?;
            derive_down(service).then(|| DownService {
                index,
                name: name.to_string(),
                causes: service.failure_causes(),
            })
        })
        .collect())
}
