//! Scoreboard JSON API adapter.
//!
//! The monitor only depends on [`ScoreboardSource`]; [`ScoreboardClient`] is
//! the HTTP implementation for the competition API. Every failure (transport,
//! non-2xx status, payload that does not fit the schema) surfaces as
//! [`MonitorError::SourceUnavailable`].

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::domain::{GlobalChart, GlobalTable, Snapshot, TeamChart, TeamTable};
use crate::error::{MonitorError, Result};

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Read access to competition state
#[async_trait]
pub trait ScoreboardSource: Send + Sync {
    /// Every round observed so far for one team
    async fn team_table(&self, team: &str) -> Result<TeamTable>;

    /// Per-service score series for one team
    async fn team_chart(&self, team: &str) -> Result<TeamChart>;

    /// All teams at one round
    async fn global_table(&self, round: u32) -> Result<GlobalTable>;

    /// All teams' score series up to one round
    async fn global_chart(&self, round: u32) -> Result<GlobalChart>;

    /// Table and chart for one team, merged and validated
    async fn snapshot(&self, team: &str) -> Result<Snapshot> {
        let (table, chart) = tokio::try_join!(self.team_table(team), self.team_chart(team))?;
        Snapshot::assemble(team, table, chart)
    }
}

/// HTTP client for the scoreboard API
#[derive(Clone)]
pub struct ScoreboardClient {
    http: Client,
    base_url: Url,
}

impl ScoreboardClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url.trim()).map_err(|e| {
            MonitorError::InvalidConfig(format!("invalid scoreboard url '{}': {}", base_url, e))
        })?;

        // Url::join replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent("scorewatch/0.1")
            .build()
            .map_err(|e| {
                MonitorError::InvalidConfig(format!("failed to build scoreboard client: {}", e))
            })?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/api/scoreboard/{segments...}` with each segment percent-encoded
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let encoded: Vec<String> = segments
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        let path = format!("api/scoreboard/{}", encoded.join("/"));

        self.base_url
            .join(&path)
            .map_err(|e| MonitorError::SourceUnavailable(format!("bad endpoint {}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        debug!("GET {}", url);

        let response = self.http.get(url).send().await.map_err(|e| {
            MonitorError::SourceUnavailable(format!("{} request failed: {}", what, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::SourceUnavailable(format!(
                "{} | status: {} | body: {}",
                what,
                status,
                truncate(&body, MAX_ERROR_BODY_CHARS)
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            MonitorError::SourceUnavailable(format!("{} body read failed: {}", what, e))
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            MonitorError::SourceUnavailable(format!("{} malformed payload: {}", what, e))
        })
    }
}

#[async_trait]
impl ScoreboardSource for ScoreboardClient {
    async fn team_table(&self, team: &str) -> Result<TeamTable> {
        let url = self.endpoint(&["team", "table", team])?;
        self.get_json(url, &format!("team table for {}", team)).await
    }

    async fn team_chart(&self, team: &str) -> Result<TeamChart> {
        let url = self.endpoint(&["team", "chart", team])?;
        self.get_json(url, &format!("team chart for {}", team)).await
    }

    async fn global_table(&self, round: u32) -> Result<GlobalTable> {
        let url = self.endpoint(&["table", &round.to_string()])?;
        self.get_json(url, &format!("global table for round {}", round))
            .await
    }

    async fn global_chart(&self, round: u32) -> Result<GlobalChart> {
        let url = self.endpoint(&["chart", &round.to_string()])?;
        self.get_json(url, &format!("global chart for round {}", round))
            .await
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_team_names() {
        let client =
            ScoreboardClient::new("http://ad.cyberchallenge.it", Duration::from_secs(5)).unwrap();
        let url = client
            .endpoint(&["team", "table", "Università degli Studi di Salerno"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://ad.cyberchallenge.it/api/scoreboard/team/table/Universit%C3%A0%20degli%20Studi%20di%20Salerno"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client =
            ScoreboardClient::new("http://10.10.0.1/ctf", Duration::from_secs(5)).unwrap();
        let url = client.endpoint(&["table", "42"]).unwrap();
        assert_eq!(url.as_str(), "http://10.10.0.1/ctf/api/scoreboard/table/42");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let err = ScoreboardClient::new("not a url", Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
