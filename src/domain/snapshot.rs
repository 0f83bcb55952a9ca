use serde::{Deserialize, Serialize};

use super::scoreboard::{TeamChart, TeamTable};
use crate::error::{MonitorError, Result};

/// Exit code a checker reports when the service behaved correctly
pub const PASS_EXIT_CODE: i32 = 101;

/// Decoded checker exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Corrupt,
    Mumble,
    Offline,
    CheckerError,
    Other(i32),
}

impl CheckStatus {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            PASS_EXIT_CODE => CheckStatus::Ok,
            102 => CheckStatus::Corrupt,
            103 => CheckStatus::Mumble,
            104 => CheckStatus::Offline,
            110 => CheckStatus::CheckerError,
            other => CheckStatus::Other(other),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CheckStatus::Ok)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CheckStatus::Ok => PASS_EXIT_CODE,
            CheckStatus::Corrupt => 102,
            CheckStatus::Mumble => 103,
            CheckStatus::Offline => 104,
            CheckStatus::CheckerError => 110,
            CheckStatus::Other(code) => *code,
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "OK"),
            CheckStatus::Corrupt => write!(f, "CORRUPT"),
            CheckStatus::Mumble => write!(f, "MUMBLE"),
            CheckStatus::Offline => write!(f, "OFFLINE"),
            CheckStatus::CheckerError => write!(f, "CHECKER_ERROR"),
            CheckStatus::Other(code) => write!(f, "EXIT_{}", code),
        }
    }
}

/// One checker invocation against a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub exit_code: i32,
    pub stdout: String,
    pub action: String,
}

impl CheckResult {
    pub fn status(&self) -> CheckStatus {
        CheckStatus::from_exit_code(self.exit_code)
    }

    pub fn passed(&self) -> bool {
        self.exit_code == PASS_EXIT_CODE
    }
}

/// One service's state in one round, as seen by one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRound {
    pub name: String,
    pub checks: Vec<CheckResult>,
    /// Flags this team stole with the service (running total)
    pub stolen: i64,
    /// Flags this team lost on the service (running total)
    pub lost: i64,
    /// Service score at the end of the round
    pub score: i64,
}

impl ServiceRound {
    /// Statuses of the checks that did not pass, in check order
    pub fn failure_causes(&self) -> Vec<CheckStatus> {
        self.checks
            .iter()
            .filter(|c| !c.passed())
            .map(|c| c.status())
            .collect()
    }
}

/// One scored checking cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub rank: u32,
    pub services: Vec<ServiceRound>,
}

/// One poll's result for one team. Only derived metrics outlive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub team: String,
    pub rounds: Vec<Round>,
}

impl Snapshot {
    /// Merge a team table and a team chart into a validated snapshot.
    ///
    /// The table provides checks, flags and rank per round; the chart provides
    /// the per-service score series. Any disagreement between the two is a
    /// malformed payload.
    pub fn assemble(team: &str, table: TeamTable, chart: TeamChart) -> Result<Self> {
        let mut rounds = Vec::with_capacity(table.rounds.len());

        for (index, table_round) in table.rounds.into_iter().enumerate() {
            if table_round.services.len() != chart.services.len() {
                return Err(MonitorError::SourceUnavailable(format!(
                    "team {}: round {} lists {} services but the chart lists {}",
                    team,
                    index,
                    table_round.services.len(),
                    chart.services.len()
                )));
            }

            let mut services = Vec::with_capacity(table_round.services.len());
            for (table_service, chart_service) in
                table_round.services.into_iter().zip(chart.services.iter())
            {
                if table_service.name != chart_service.name {
                    return Err(MonitorError::SourceUnavailable(format!(
                        "team {}: round {} service order mismatch ({} vs {})",
                        team, index, table_service.name, chart_service.name
                    )));
                }

                let score = chart_service.score.get(index).copied().ok_or_else(|| {
                    MonitorError::SourceUnavailable(format!(
                        "team {}: chart has no score for service {} at round {}",
                        team, chart_service.name, index
                    ))
                })?;

                services.push(ServiceRound {
                    name: table_service.name,
                    checks: table_service.checks,
                    stolen: table_service.stolen,
                    lost: table_service.lost,
                    score,
                });
            }

            rounds.push(Round {
                rank: table_round.rank,
                services,
            });
        }

        Ok(Self {
            team: team.to_string(),
            rounds,
        })
    }

    pub fn latest(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Latest round index (0-based), if any round was played
    pub fn current_round(&self) -> Option<usize> {
        self.rounds.len().checked_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scoreboard::{ChartService, TableRound, TableService};

    fn check(code: i32) -> CheckResult {
        CheckResult {
            exit_code: code,
            stdout: String::new(),
            action: "CHECK_SLA".to_string(),
        }
    }

    fn table(rounds: usize) -> TeamTable {
        TeamTable {
            team_name: "acme".to_string(),
            rounds: (0..rounds)
                .map(|r| TableRound {
                    rank: r as u32 + 1,
                    services: vec![
                        TableService {
                            name: "svc-1".to_string(),
                            checks: vec![check(101)],
                            stolen: r as i64,
                            lost: 0,
                        },
                        TableService {
                            name: "svc-2".to_string(),
                            checks: vec![check(104)],
                            stolen: 0,
                            lost: r as i64 * 2,
                        },
                    ],
                })
                .collect(),
        }
    }

    fn chart(len: usize) -> TeamChart {
        TeamChart {
            rounds: len.saturating_sub(1) as u32,
            services: vec![
                ChartService {
                    name: "svc-1".to_string(),
                    score: (0..len as i64).map(|s| 1000 + s).collect(),
                },
                ChartService {
                    name: "svc-2".to_string(),
                    score: (0..len as i64).map(|s| 900 - s).collect(),
                },
            ],
        }
    }

    #[test]
    fn test_check_status_decoding() {
        assert_eq!(CheckStatus::from_exit_code(101), CheckStatus::Ok);
        assert_eq!(CheckStatus::from_exit_code(104), CheckStatus::Offline);
        assert_eq!(CheckStatus::from_exit_code(7), CheckStatus::Other(7));
        assert_eq!(CheckStatus::Other(7).exit_code(), 7);
        assert_eq!(CheckStatus::Mumble.to_string(), "MUMBLE");
        assert!(check(101).passed());
        assert!(!check(102).passed());
    }

    #[test]
    fn test_assemble_merges_scores() {
        let snapshot = Snapshot::assemble("acme", table(3), chart(3)).unwrap();
        assert_eq!(snapshot.rounds.len(), 3);
        assert_eq!(snapshot.current_round(), Some(2));
        let latest = snapshot.latest().unwrap();
        assert_eq!(latest.rank, 3);
        assert_eq!(latest.services[0].score, 1002);
        assert_eq!(latest.services[1].score, 898);
        assert_eq!(latest.services[1].lost, 4);
        assert_eq!(
            latest.services[1].failure_causes(),
            vec![CheckStatus::Offline]
        );
    }

    #[test]
    fn test_assemble_rejects_short_chart() {
        let err = Snapshot::assemble("acme", table(3), chart(2)).unwrap_err();
        assert!(matches!(err, MonitorError::SourceUnavailable(_)));
    }

    #[test]
    fn test_assemble_rejects_service_mismatch() {
        let mut c = chart(2);
        c.services.pop();
        let err = Snapshot::assemble("acme", table(2), c).unwrap_err();
        assert!(matches!(err, MonitorError::SourceUnavailable(_)));
    }

    #[test]
    fn test_assemble_empty_table() {
        let snapshot = Snapshot::assemble("acme", table(0), chart(0)).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.current_round(), None);
    }
}
