use crate::fixtures::*;
use phc_sync::jobs::Job;
use phc_sync::purge::purge_expired;
use phc_sync_postgresql_sink::DestinationSink;
use sync_core::{ColumnValue, RowCoercer};

/// Load everything while 2024 is still the current year, then run again in 2025.
async fn synced_across_new_year(job: Job) -> Harness {
    let mut h = Harness::new(phc_source());
    let summary = h.run_on(Job::IncrementalYear, date(2024, 12, 31)).await;
    assert!(summary.success(), "{summary:?}");
    assert_eq!(h.keys("bo", "document_id").await, vec![text("B0"), text("B1"), text("B2")]);
    assert_eq!(h.sink.row_count("bi").await, 3);

    let summary = h.run(job).await;
    assert!(summary.success(), "{summary:?}");
    h
}

#[tokio::test]
async fn test_incremental_run_purges_last_year() {
    let h = synced_across_new_year(Job::IncrementalYear).await;

    assert_eq!(h.keys("bo", "document_id").await, vec![text("B1"), text("B2")]);
    assert_eq!(h.keys("ft", "invoice_id").await, vec![text("F1"), text("F2")]);
    assert_eq!(h.keys("fo", "document_id").await, vec![text("S1")]);
    for value in h.sink.column("bo", "document_date").await {
        assert!(value.as_date().unwrap() >= date(2025, 1, 1));
    }
}

#[tokio::test]
async fn test_children_follow_parent_window() {
    let h = synced_across_new_year(Job::IncrementalYear).await;
    // L0 belongs to B0, dated 2024-12-30.
    assert_eq!(h.keys("bi", "line_id").await, vec![text("L1"), text("L2")]);
}

#[tokio::test]
async fn test_parent_purge_takes_children_first() {
    // Only bo runs; its lines must not be left behind as orphans.
    let h = synced_across_new_year(Job::Table("bo".into())).await;
    assert_eq!(h.keys("bo", "document_id").await, vec![text("B1"), text("B2")]);
    assert_eq!(h.keys("bi", "line_id").await, vec![text("L1"), text("L2")]);
}

#[tokio::test]
async fn test_today_runs_do_not_purge() {
    let h = synced_across_new_year(Job::TodayAll).await;
    assert_eq!(h.sink.row_count("bo").await, 3);
    assert_eq!(h.sink.row_count("bi").await, 3);
}

#[tokio::test]
async fn test_purge_creates_missing_child_table() {
    let mut h = Harness::new(phc_source());
    h.run(Job::Table("ft".into())).await;
    assert!(h.sink.has_table("fi").await);
    assert_eq!(h.sink.row_count("fi").await, 0);
}

#[tokio::test]
async fn test_purge_keeps_undated_rows() {
    let h = Harness::new(phc_source());
    let fo = h.registry.get("fo").unwrap();
    h.sink.ensure_table(fo).await.unwrap();

    let coercer = RowCoercer::for_table(&h.registry, fo);
    let mut undated = coercer.coerce_row(&[]);
    undated[0] = text("U1");
    let mut old = coercer.coerce_row(&[]);
    old[0] = text("O1");
    old[2] = ColumnValue::Date(Some(date(2024, 2, 1)));
    h.sink.upsert(fo, &[undated, old]).await.unwrap();

    let deleted = purge_expired(&h.sink, &h.registry, fo, date(2025, 1, 1)).await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(h.keys("fo", "document_id").await, vec![text("U1")]);
}

#[tokio::test]
async fn test_archive_leaves_out_cancelled_invoices() {
    let mut source = phc_source();
    source
        .insert("ft", invoice("F8", 98, date(2024, 3, 1), true))
        .insert("fi", invoice_line("I8", "F8", 30))
        .insert("fi", invoice_line("I0", "F0", 15));
    let mut h = Harness::new(source);

    let summary = h.run(Job::AnnualSnapshot { years: 2 }).await;
    assert!(summary.success(), "{summary:?}");
    assert_eq!(h.keys("2years_ft", "invoice_id").await, vec![text("F0")]);
    assert_eq!(h.keys("2years_fi", "line_item_id").await, vec![text("I0")]);

    // The live table still carries cancelled invoices.
    h.run(Job::Table("ft".into())).await;
    assert_eq!(h.keys("ft", "invoice_id").await, vec![text("F1"), text("F2")]);
}
