use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Flattened metric row for one (team, service) at one poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    pub team: String,
    pub service: String,
    pub score_team: i64,
    pub score_service: i64,
    pub flags_submitted: i64,
    pub flags_lost: i64,
    /// Cumulative pass rate in percent, 0..=100
    pub sla_value: f64,
    pub is_down: bool,
    pub timestamp: DateTime<Utc>,
}

impl DerivedRecord {
    /// Check the row invariants the store relies on
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.team.trim().is_empty() {
            return Err("team must not be empty".to_string());
        }
        if self.service.trim().is_empty() {
            return Err(format!("team {}: service must not be empty", self.team));
        }
        if !self.sla_value.is_finite() || !(0.0..=100.0).contains(&self.sla_value) {
            return Err(format!(
                "{}/{}: sla_value {} outside [0, 100]",
                self.team, self.service, self.sla_value
            ));
        }
        if self.flags_submitted < 0 || self.flags_lost < 0 {
            return Err(format!(
                "{}/{}: negative flag counters ({}, {})",
                self.team, self.service, self.flags_submitted, self.flags_lost
            ));
        }
        Ok(())
    }
}

/// Columns of the time-series schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Team,
    Service,
    ScoreTeam,
    ScoreService,
    FlagsSubmitted,
    FlagsLost,
    SlaValue,
    IsDown,
    Timestamp,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::Team,
        Column::Service,
        Column::ScoreTeam,
        Column::ScoreService,
        Column::FlagsSubmitted,
        Column::FlagsLost,
        Column::SlaValue,
        Column::IsDown,
        Column::Timestamp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Team => "team",
            Column::Service => "service",
            Column::ScoreTeam => "score_team",
            Column::ScoreService => "score_service",
            Column::FlagsSubmitted => "flags_submitted",
            Column::FlagsLost => "flags_lost",
            Column::SlaValue => "sla_value",
            Column::IsDown => "is_down",
            Column::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == raw.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown column '{}'", raw))
    }
}

/// Row selection for store queries; `None` matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub team: Option<String>,
    pub service: Option<String>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_team(team: &str) -> Self {
        Self {
            team: Some(team.to_string()),
            service: None,
        }
    }

    pub fn for_team_service(team: &str, service: &str) -> Self {
        Self {
            team: Some(team.to_string()),
            service: Some(service.to_string()),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "team={} service={}",
            self.team.as_deref().unwrap_or("*"),
            self.service.as_deref().unwrap_or("*")
        )
    }
}

/// Projection of a stored record. Only requested columns are populated;
/// the timestamp is always present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordRow {
    pub timestamp: DateTime<Utc>,
    pub team: Option<String>,
    pub service: Option<String>,
    pub score_team: Option<i64>,
    pub score_service: Option<i64>,
    pub flags_submitted: Option<i64>,
    pub flags_lost: Option<i64>,
    pub sla_value: Option<f64>,
    pub is_down: Option<bool>,
}

impl RecordRow {
    /// Rebuild the full record when every column was requested
    pub fn into_record(self) -> Option<DerivedRecord> {
        Some(DerivedRecord {
            team: self.team?,
            service: self.service?,
            score_team: self.score_team?,
            score_service: self.score_service?,
            flags_submitted: self.flags_submitted?,
            flags_lost: self.flags_lost?,
            sla_value: self.sla_value?,
            is_down: self.is_down?,
            timestamp: self.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DerivedRecord {
        DerivedRecord {
            team: "acme".to_string(),
            service: "svc-1".to_string(),
            score_team: 5000,
            score_service: 2500,
            flags_submitted: 4,
            flags_lost: 1,
            sla_value: 83.33,
            is_down: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(record().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_sla() {
        let mut r = record();
        r.sla_value = 100.5;
        assert!(r.validate().is_err());
        r.sla_value = f64::NAN;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_service() {
        let mut r = record();
        r.service = " ".to_string();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_column_parse() {
        assert_eq!("sla_value".parse::<Column>().unwrap(), Column::SlaValue);
        assert_eq!(" IS_DOWN ".parse::<Column>().unwrap(), Column::IsDown);
        assert!("rank".parse::<Column>().is_err());
    }

    #[test]
    fn test_partial_row_is_not_a_record() {
        let row = RecordRow {
            timestamp: Utc::now(),
            sla_value: Some(50.0),
            ..Default::default()
        };
        assert!(row.into_record().is_none());
    }
}
