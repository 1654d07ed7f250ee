use crate::fixtures::*;
use chrono::{Duration as ChronoDuration, Utc};
use phc_sync::config::{DestinationOpts, SourceOpts, SslMode, SyncOpts};
use phc_sync::jobs::{execute, Job};
use phc_sync_postgresql_sink::DestinationSink;
use std::time::Duration;
use sync_core::RowCoercer;

#[tokio::test]
async fn test_failed_table_does_not_stop_the_job() {
    let mut source = phc_source();
    source.fail_on("ft");
    let mut h = Harness::new(source);
    h.sink.fail_on("fo").await;

    let summary = h.run(Job::IncrementalYear).await;

    assert!(!summary.success());
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.marker(), "__ETL_DONE__ success=false");
    assert_eq!(summary.failed_tables(), vec!["ft", "fo"]);
    assert!(summary
        .get("ft")
        .unwrap()
        .error
        .as_deref()
        .unwrap()
        .contains("Injected read failure"));

    // Tables after the failure still ran.
    assert_eq!(h.sink.row_count("fi").await, 1);
    assert!(summary.get("fi").unwrap().success);
    // A failed table keeps its previous watermark.
    assert_eq!(h.watermark("ft").await, None);
}

#[tokio::test]
async fn test_recently_synced_clients_are_skipped() {
    let mut h = Harness::new(phc_source());
    let an_hour_ago = (Utc::now() - ChronoDuration::hours(1)).naive_utc();
    h.watermarks.seed("cl", date(2025, 1, 1), an_hour_ago).await;

    let summary = h.run(Job::FastBoBi).await;
    let cl = summary.get("cl").unwrap();
    assert!(cl.success && cl.skipped);
    assert_eq!(h.sink.row_count("cl").await, 0);
    assert!(summary.success());

    // Six hours for today jobs: an hour ago is still recent.
    let summary = h.run(Job::TodayBoBi).await;
    assert!(summary.get("cl").unwrap().skipped);

    // The clients-only job always refreshes.
    let summary = h.run(Job::FastClients).await;
    assert!(!summary.get("cl").unwrap().skipped);
    assert_eq!(h.sink.row_count("cl").await, 2);
}

#[tokio::test]
async fn test_stale_clients_are_refreshed() {
    let mut h = Harness::new(phc_source());
    let long_ago = (Utc::now() - ChronoDuration::hours(30)).naive_utc();
    h.watermarks.seed("cl", date(2025, 1, 1), long_ago).await;

    let summary = h.run(Job::IncrementalYear).await;
    assert!(!summary.get("cl").unwrap().skipped);
    assert_eq!(h.sink.row_count("cl").await, 2);
}

#[tokio::test]
async fn test_skip_window_override() {
    let mut h = Harness::new(phc_source());
    let long_ago = (Utc::now() - ChronoDuration::hours(30)).naive_utc();
    h.watermarks.seed("cl", date(2025, 1, 1), long_ago).await;
    h.opts.skip_window = Some(Duration::from_secs(48 * 3600));

    let summary = h.run(Job::FastClients).await;
    assert!(summary.get("cl").unwrap().skipped);
}

#[tokio::test]
async fn test_full_reload_rebuilds_tables() {
    let mut h = Harness::new(phc_source());
    h.run(Job::IncrementalYear).await;

    // A row the source no longer has.
    let fo = h.registry.get("fo").unwrap();
    let mut stray = RowCoercer::for_table(&h.registry, fo).coerce_row(&[]);
    stray[0] = text("GONE");
    h.sink.upsert(fo, &[stray]).await.unwrap();
    assert_eq!(h.sink.row_count("fo").await, 2);

    let summary = h.run(Job::Full).await;
    assert!(summary.success(), "{summary:?}");
    assert_eq!(h.keys("fo", "document_id").await, vec![text("S1")]);
    assert_eq!(h.keys("bo", "document_id").await, vec![text("B1"), text("B2")]);
    assert_eq!(summary.get("bo").unwrap().query_start, Some(date(2025, 1, 1)));
    assert_eq!(h.watermark("bo").await, Some(date(2025, 6, 14)));
    // Customers are reloaded too, recency skip does not apply.
    assert_eq!(h.sink.row_count("cl").await, 2);
}

#[tokio::test]
async fn test_annual_snapshot_archives_closed_years() {
    let mut source = phc_source();
    source
        .insert("bo", work_order("B23", date(2023, 3, 1), 70))
        .insert("bo", work_order("B22", date(2022, 12, 31), 60))
        .insert("fi", invoice_line("I0", "F0", 15));
    let mut h = Harness::new(source);

    for _ in 0..2 {
        let summary = h.run(Job::AnnualSnapshot { years: 2 }).await;
        assert!(summary.success(), "{summary:?}");
        assert_eq!(summary.get("bo").unwrap().query_start, Some(date(2023, 1, 1)));
    }

    assert_eq!(
        h.keys("2years_bo", "document_id").await,
        vec![text("B0"), text("B23")]
    );
    assert_eq!(h.keys("2years_ft", "invoice_id").await, vec![text("F0")]);
    assert_eq!(h.keys("2years_fi", "line_item_id").await, vec![text("I0")]);

    // Live tables and watermarks are untouched.
    assert!(!h.sink.has_table("bo").await);
    assert_eq!(h.watermark("bo").await, None);
}

#[tokio::test]
async fn test_zero_year_snapshot_is_empty() {
    let mut h = Harness::new(phc_source());
    let summary = h.run(Job::AnnualSnapshot { years: 0 }).await;
    assert!(summary.success(), "{summary:?}");
    assert_eq!(h.sink.row_count("0years_bo").await, 0);
}

#[tokio::test]
async fn test_unknown_table_is_reported() {
    let mut h = Harness::new(phc_source());
    let summary = h.run(Job::Table("zz".into())).await;
    assert!(!summary.success());
    assert!(summary
        .get("zz")
        .unwrap()
        .error
        .as_deref()
        .unwrap()
        .contains("Table not found: zz"));
}

#[tokio::test]
async fn test_missing_configuration_aborts_run() {
    let destination = DestinationOpts {
        pg_host: None,
        pg_db: None,
        pg_user: None,
        pg_password: None,
        pg_port: 5432,
        pg_sslmode: SslMode::Require,
    };
    let summary = execute(
        &Job::FastAll,
        &SourceOpts::default(),
        &destination,
        &SyncOpts::default(),
    )
    .await;

    assert!(!summary.success());
    assert!(summary.results.is_empty());
    assert_eq!(summary.exit_code(), 1);
    assert!(summary.error.unwrap().contains("MSSQL_DIRECT_CONNECTION"));
}

#[tokio::test]
async fn test_summary_serializes_per_table() {
    let mut h = Harness::new(phc_source());
    let summary = h.run(Job::FastClients).await;
    let json: serde_json::Value = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["job"], "fast-clients");
    assert_eq!(json["run_date"], "2025-06-15");
    assert_eq!(json["results"][0]["table"], "cl");
    assert_eq!(json["results"][0]["success"], true);
    assert_eq!(json["results"][0]["rows_processed"], 2);
    assert!(json["results"][0].get("skipped").is_none());
}
