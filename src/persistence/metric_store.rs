//! Time-series store for derived scoreboard metrics
//!
//! One row per (team, service, poll), backed by SQLite. Appends are atomic per
//! batch and queries return rows in timestamp order. Timestamps are stored as
//! fixed-width RFC 3339 text (nanosecond precision, `Z` suffix) so that text
//! order equals chronological order and values round-trip exactly.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::{Column, DerivedRecord, RecordFilter, RecordRow};
use crate::error::{MonitorError, Result};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS derived_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        team TEXT NOT NULL,
        service TEXT NOT NULL,
        score_team INTEGER NOT NULL,
        score_service INTEGER NOT NULL,
        flags_submitted INTEGER NOT NULL,
        flags_lost INTEGER NOT NULL,
        sla_value REAL NOT NULL CHECK (sla_value >= 0 AND sla_value <= 100),
        is_down INTEGER NOT NULL,
        timestamp TEXT NOT NULL
    )
"#;

const CREATE_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_derived_records_team_service_ts
    ON derived_records (team, service, timestamp)
"#;

/// Append-only store of [`DerivedRecord`] rows
#[derive(Clone)]
pub struct MetricStore {
    pool: SqlitePool,
    transient: bool,
}

impl MetricStore {
    /// Open (or create) a database file
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            transient: false,
        };
        store.init_schema().await?;

        info!("Opened metric store at {}", path.display());
        Ok(store)
    }

    /// Store that lives only as long as the process
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // An in-memory database belongs to a single connection, so the pool
        // must hold exactly one and never recycle it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            transient: true,
        };
        store.init_schema().await?;

        debug!("Opened transient in-memory metric store");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Append a batch atomically. A single invalid record rejects the batch.
    pub async fn append(&self, records: &[DerivedRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        for record in records {
            record.validate().map_err(|reason| {
                MonitorError::Persistence(format!(
                    "batch of {} records rejected: {}",
                    records.len(),
                    reason
                ))
            })?;
        }

        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO derived_records (
                    team, service, score_team, score_service,
                    flags_submitted, flags_lost, sla_value, is_down, timestamp
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&record.team)
            .bind(&record.service)
            .bind(record.score_team)
            .bind(record.score_service)
            .bind(record.flags_submitted)
            .bind(record.flags_lost)
            .bind(record.sla_value)
            .bind(record.is_down)
            .bind(encode_timestamp(&record.timestamp))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Appended {} records", records.len());
        Ok(records.len())
    }

    /// Fetch the requested columns of matching rows, oldest first.
    ///
    /// Returns [`MonitorError::NotFound`] when nothing matches.
    pub async fn query(&self, filter: &RecordFilter, columns: &[Column]) -> Result<Vec<RecordRow>> {
        let mut selected: Vec<Column> = columns
            .iter()
            .copied()
            .filter(|c| *c != Column::Timestamp)
            .collect();
        selected.sort();
        selected.dedup();

        let mut projection = vec![Column::Timestamp.as_str()];
        projection.extend(selected.iter().map(|c| c.as_str()));

        let sql = format!(
            r#"
            SELECT {}
            FROM derived_records
            WHERE (?1 IS NULL OR team = ?1) AND (?2 IS NULL OR service = ?2)
            ORDER BY timestamp ASC, id ASC
            "#,
            projection.join(", ")
        );

        let rows = sqlx::query(&sql)
            .bind(filter.team.as_deref())
            .bind(filter.service.as_deref())
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Err(MonitorError::NotFound(filter.describe()));
        }

        debug!("Fetched {} rows for {}", rows.len(), filter.describe());
        rows.iter().map(|row| decode_row(row, &selected)).collect()
    }

    /// Like [`query`](Self::query), but "no data" and store failures become an
    /// empty result. Failures are logged.
    pub async fn query_or_empty(&self, filter: &RecordFilter, columns: &[Column]) -> Vec<RecordRow> {
        match self.query(filter, columns).await {
            Ok(rows) => rows,
            Err(e) if e.is_not_found() => {
                debug!("No data yet for {}", filter.describe());
                Vec::new()
            }
            Err(e) => {
                warn!("Metric query failed for {}: {}", filter.describe(), e);
                Vec::new()
            }
        }
    }

    /// Teams that have at least one row
    pub async fn teams(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT team FROM derived_records ORDER BY team ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("team").map_err(MonitorError::from))
            .collect()
    }

    /// Services recorded for a team, in first-seen order
    pub async fn services_for(&self, team: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT service, MIN(id) AS first_id
            FROM derived_records
            WHERE team = ?1
            GROUP BY service
            ORDER BY first_id ASC
            "#,
        )
        .bind(team)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("service").map_err(MonitorError::from))
            .collect()
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM derived_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    /// Drop every persisted record
    pub async fn reset(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM derived_records")
            .execute(&self.pool)
            .await?;
        info!("Metric store reset ({} rows dropped)", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Cheap liveness probe
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MonitorError::Persistence(format!("bad timestamp '{}': {}", raw, e)))
}

fn decode_row(row: &SqliteRow, columns: &[Column]) -> Result<RecordRow> {
    let raw_ts: String = row.try_get(Column::Timestamp.as_str())?;
    let mut out = RecordRow {
        timestamp: decode_timestamp(&raw_ts)?,
        ..Default::default()
    };

    for column in columns {
        let name = column.as_str();
        match column {
            Column::Team => out.team = Some(row.try_get(name)?),
            Column::Service => out.service = Some(row.try_get(name)?),
            Column::ScoreTeam => out.score_team = Some(row.try_get(name)?),
            Column::ScoreService => out.score_service = Some(row.try_get(name)?),
            Column::FlagsSubmitted => out.flags_submitted = Some(row.try_get(name)?),
            Column::FlagsLost => out.flags_lost = Some(row.try_get(name)?),
            Column::SlaValue => out.sla_value = Some(row.try_get(name)?),
            Column::IsDown => out.is_down = Some(row.try_get(name)?),
            Column::Timestamp => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_encoding_is_fixed_width() {
        let a = Utc::now();
        let b = a + chrono::Duration::milliseconds(1500);
        let (ea, eb) = (encode_timestamp(&a), encode_timestamp(&b));
        assert_eq!(ea.len(), eb.len());
        assert!(ea < eb);
        assert_eq!(decode_timestamp(&ea).unwrap(), a);
    }

    #[test]
    fn test_bad_timestamp_is_persistence_error() {
        let err = decode_timestamp("yesterday").unwrap_err();
        assert!(err.is_persistence());
    }
}
