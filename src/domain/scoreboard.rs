//! Wire types of the competition scoreboard API.
//!
//! These mirror the JSON payloads field for field. Nothing here carries a
//! serde default: a missing field fails decoding and the poll for that team
//! is reported as unavailable.

use serde::{Deserialize, Serialize};

use super::snapshot::CheckResult;

/// `GET /api/scoreboard/team/table/{team}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTable {
    pub team_name: String,
    pub rounds: Vec<TableRound>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRound {
    #[serde(alias = "position")]
    pub rank: u32,
    pub services: Vec<TableService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableService {
    #[serde(rename = "shortname", alias = "name")]
    pub name: String,
    pub checks: Vec<CheckResult>,
    pub stolen: i64,
    pub lost: i64,
}

/// `GET /api/scoreboard/team/chart/{team}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamChart {
    /// Index of the latest round; score series hold `rounds + 1` points
    pub rounds: u32,
    pub services: Vec<ChartService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartService {
    #[serde(rename = "shortname", alias = "name")]
    pub name: String,
    pub score: Vec<i64>,
}

/// `GET /api/scoreboard/table/{round}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalTable {
    pub round: u32,
    pub teams: Vec<GlobalTeamEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalTeamEntry {
    pub team_name: String,
    #[serde(alias = "position")]
    pub rank: u32,
    pub score: i64,
}

impl GlobalTable {
    /// Teams ordered by rank (best first)
    pub fn standings(&self) -> Vec<&GlobalTeamEntry> {
        let mut teams: Vec<&GlobalTeamEntry> = self.teams.iter().collect();
        teams.sort_by_key(|t| t.rank);
        teams
    }
}

/// `GET /api/scoreboard/chart/{round}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalChart {
    pub round: u32,
    pub teams: Vec<GlobalChartTeam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalChartTeam {
    pub team_name: String,
    pub score: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_table_decoding() {
        let body = serde_json::json!({
            "teamName": "unisa",
            "rounds": [{
                "position": 4,
                "services": [{
                    "shortname": "CTFe-1",
                    "checks": [{"exitCode": 101, "stdout": "", "action": "CHECK_SLA"}],
                    "stolen": 3,
                    "lost": 1
                }]
            }]
        });

        let table: TeamTable = serde_json::from_value(body).unwrap();
        assert_eq!(table.team_name, "unisa");
        assert_eq!(table.rounds[0].rank, 4);
        assert_eq!(table.rounds[0].services[0].name, "CTFe-1");
        assert_eq!(table.rounds[0].services[0].checks[0].exit_code, 101);
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let body = serde_json::json!({
            "teamName": "unisa",
            "rounds": [{
                "rank": 1,
                "services": [{
                    "shortname": "CTFe-1",
                    "checks": [],
                    "stolen": 0
                }]
            }]
        });

        assert!(serde_json::from_value::<TeamTable>(body).is_err());
    }

    #[test]
    fn test_global_standings_sorted() {
        let table = GlobalTable {
            round: 12,
            teams: vec![
                GlobalTeamEntry {
                    team_name: "b".into(),
                    rank: 2,
                    score: 10,
                },
                GlobalTeamEntry {
                    team_name: "a".into(),
                    rank: 1,
                    score: 20,
                },
            ],
        };
        let names: Vec<_> = table.standings().iter().map(|t| t.team_name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
