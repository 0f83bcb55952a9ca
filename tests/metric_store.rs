use chrono::{Duration, TimeZone, Utc};
use scorewatch::domain::{Column, DerivedRecord, RecordFilter};
use scorewatch::persistence::MetricStore;

fn record(team: &str, service: &str, offset_secs: i64, sla: f64) -> DerivedRecord {
    let base = Utc.with_ymd_and_hms(2024, 6, 5, 10, 0, 0).unwrap();
    DerivedRecord {
        team: team.to_string(),
        service: service.to_string(),
        score_team: 4200,
        score_service: 1337,
        flags_submitted: 12,
        flags_lost: 3,
        sla_value: sla,
        is_down: false,
        timestamp: base + Duration::seconds(offset_secs) + Duration::nanoseconds(123_456_789),
    }
}

#[tokio::test]
async fn all_columns_reproduce_the_record() {
    let store = MetricStore::in_memory().await.unwrap();
    let mut original = record("acme", "svc-1", 0, 500.0 / 6.0);
    original.is_down = true;
    store.append(std::slice::from_ref(&original)).await.unwrap();

    let rows = store
        .query(&RecordFilter::for_team("acme"), &Column::ALL)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let restored = rows[0].clone().into_record().unwrap();
    assert_eq!(restored, original);
}

#[tokio::test]
async fn one_bad_record_rejects_the_whole_batch() {
    let store = MetricStore::in_memory().await.unwrap();
    let batch = vec![
        record("acme", "svc-1", 0, 100.0),
        record("acme", "svc-2", 0, 140.0),
        record("acme", "svc-3", 0, 90.0),
    ];

    let err = store.append(&batch).await.unwrap_err();
    assert!(err.is_persistence());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_store_reports_no_data() {
    let store = MetricStore::in_memory().await.unwrap();
    let filter = RecordFilter::for_team("acme");

    let err = store.query(&filter, &[Column::SlaValue]).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!err.is_fatal());

    let rows = store.query_or_empty(&filter, &[Column::SlaValue]).await;
    assert!(rows.is_empty());
}

#[tokio::test]
async fn query_orders_by_timestamp_and_projects_columns() {
    let store = MetricStore::in_memory().await.unwrap();
    store
        .append(&[
            record("acme", "svc-1", 20, 80.0),
            record("globex", "svc-1", 5, 70.0),
        ])
        .await
        .unwrap();
    store
        .append(&[
            record("acme", "svc-1", 10, 90.0),
            record("acme", "svc-2", 15, 60.0),
        ])
        .await
        .unwrap();

    let rows = store
        .query(
            &RecordFilter::for_team_service("acme", "svc-1"),
            &[Column::SlaValue],
        )
        .await
        .unwrap();
    let sla: Vec<f64> = rows.iter().map(|r| r.sla_value.unwrap()).collect();
    assert_eq!(sla, vec![90.0, 80.0]);
    assert!(rows.iter().all(|r| r.team.is_none() && r.score_team.is_none()));
    assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let all = store
        .query(&RecordFilter::all(), &[Column::Team])
        .await
        .unwrap();
    let teams: Vec<&str> = all.iter().map(|r| r.team.as_deref().unwrap()).collect();
    assert_eq!(teams, vec!["globex", "acme", "acme", "acme"]);

    assert_eq!(store.teams().await.unwrap(), vec!["acme", "globex"]);
    assert_eq!(
        store.services_for("acme").await.unwrap(),
        vec!["svc-1", "svc-2"]
    );
}

#[tokio::test]
async fn reset_drops_everything() {
    let store = MetricStore::in_memory().await.unwrap();
    assert!(store.is_transient());
    store
        .append(&[record("acme", "svc-1", 0, 100.0), record("acme", "svc-2", 0, 100.0)])
        .await
        .unwrap();

    assert_eq!(store.reset().await.unwrap(), 2);
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(store
        .query_or_empty(&RecordFilter::all(), &[Column::SlaValue])
        .await
        .is_empty());
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let path = std::env::temp_dir().join(format!("scorewatch-store-{}.sqlite3", std::process::id()));
    let _ = std::fs::remove_file(&path);

    {
        let store = MetricStore::open(&path).await.unwrap();
        assert!(!store.is_transient());
        store.append(&[record("acme", "svc-1", 0, 75.5)]).await.unwrap();
        store.close().await;
    }

    let store = MetricStore::open(&path).await.unwrap();
    let rows = store
        .query(&RecordFilter::for_team("acme"), &[Column::SlaValue])
        .await
        .unwrap();
    assert_eq!(rows[0].sla_value, Some(75.5));
    store.close().await;
    let _ = std::fs::remove_file(&path);
}
