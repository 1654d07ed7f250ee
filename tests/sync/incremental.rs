use crate::fixtures::*;
use phc_sync::jobs::Job;
use phc_sync_mssql_source::DateScope;
use sync_core::SourceValue;

fn set(h: &mut Harness, table: &str, key_column: &str, key: &str, column: &str, value: SourceValue) {
    let found = h
        .source
        .records_mut(table)
        .iter_mut()
        .find(|r| r.get(key_column) == Some(&SourceValue::from(key)))
        .unwrap();
    found.insert(column.to_string(), value);
}

#[tokio::test]
async fn test_first_run_loads_current_year() {
    let mut h = Harness::new(phc_source());
    let summary = h.run(Job::IncrementalYear).await;

    assert!(summary.success(), "{summary:?}");
    assert_eq!(summary.marker(), "__ETL_DONE__ success=true");
    assert_eq!(summary.exit_code(), 0);

    assert_eq!(h.keys("bo", "document_id").await, vec![text("B1"), text("B2")]);
    assert_eq!(h.keys("bi", "line_id").await, vec![text("L1"), text("L2")]);
    assert_eq!(h.keys("ft", "invoice_id").await, vec![text("F1"), text("F2")]);
    assert_eq!(h.keys("fi", "line_item_id").await, vec![text("I1")]);
    assert_eq!(h.keys("fo", "document_id").await, vec![text("S1")]);
    assert_eq!(h.sink.row_count("cl").await, 2);

    let bo = summary.get("bo").unwrap();
    assert_eq!(bo.rows_processed, 2);
    assert_eq!(bo.query_start, Some(date(2025, 1, 1)));
    assert_eq!(bo.watermark, Some(date(2025, 6, 14)));
}

#[tokio::test]
async fn test_watermarks_follow_max_date() {
    let mut h = Harness::new(phc_source());
    h.run(Job::IncrementalYear).await;

    assert_eq!(h.watermark("bo").await, Some(date(2025, 6, 14)));
    // Child tables track their parent's date.
    assert_eq!(h.watermark("bi").await, Some(date(2025, 6, 14)));
    assert_eq!(h.watermark("ft").await, Some(date(2025, 6, 13)));
    assert_eq!(h.watermark("fi").await, Some(date(2025, 6, 12)));
    assert_eq!(h.watermark("fo").await, Some(date(2025, 5, 20)));
    // Full-scan tables keep the default but record the sync.
    assert_eq!(h.watermark("cl").await, Some(date(2025, 1, 1)));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let mut h = Harness::new(phc_source());
    h.run(Job::IncrementalYear).await;
    let mut first = Vec::new();
    for table in ["cl", "bo", "bi", "ft", "fi", "fo"] {
        first.push(h.sink.rows(table).await);
    }

    let summary = h.run(Job::IncrementalYear).await;
    assert!(summary.success());
    for (i, table) in ["cl", "bo", "bi", "ft", "fi", "fo"].into_iter().enumerate() {
        assert_eq!(h.sink.rows(table).await, first[i], "{table} changed on rerun");
    }
}

#[tokio::test]
async fn test_watermark_never_moves_backwards() {
    let mut h = Harness::new(phc_source());
    h.run(Job::Table("bo".into())).await;
    assert_eq!(h.watermark("bo").await, Some(date(2025, 6, 14)));

    h.source
        .records_mut("bo")
        .retain(|r| r.get("bostamp") != Some(&SourceValue::from("B2")));
    let summary = h.run(Job::Table("bo".into())).await;

    assert!(summary.success());
    assert_eq!(h.watermark("bo").await, Some(date(2025, 6, 14)));
    // The row already loaded stays in the destination.
    assert_eq!(h.sink.row_count("bo").await, 2);
}

#[tokio::test]
async fn test_overlap_rereads_recent_rows() {
    let mut h = Harness::new(phc_source());
    h.run(Job::Table("bo".into())).await;

    // B2 (2025-06-14) is inside the 3-day overlap, B1 (2025-06-10) is not.
    set(&mut h, "bo", "bostamp", "B2", "ebo_2tvall", SourceValue::from(999));
    set(&mut h, "bo", "bostamp", "B1", "ebo_2tvall", SourceValue::from(1));
    let summary = h.run(Job::Table("bo".into())).await;

    let bo = summary.get("bo").unwrap();
    assert_eq!(bo.query_start, Some(date(2025, 6, 11)));
    assert_eq!(bo.rows_processed, 1);
    assert_eq!(
        h.sink.lookup("bo", &text("B2"), "total_value").await,
        Some(numeric(999))
    );
    assert_eq!(
        h.sink.lookup("bo", &text("B1"), "total_value").await,
        Some(numeric(250))
    );
    assert_eq!(h.sink.row_count("bo").await, 2);
    assert_eq!(
        h.source.queries().last().unwrap().scope,
        DateScope::since(date(2025, 6, 11))
    );
}

#[tokio::test]
async fn test_late_rows_inside_overlap_are_picked_up() {
    let mut h = Harness::new(phc_source());
    h.run(Job::Table("ft".into())).await;

    h.source.insert("ft", invoice("F3", 103, date(2025, 6, 11), false));
    h.source.insert("ft", invoice("F4", 104, date(2025, 6, 1), false));
    h.run(Job::Table("ft".into())).await;

    assert_eq!(
        h.keys("ft", "invoice_id").await,
        vec![text("F1"), text("F2"), text("F3")]
    );
    assert_eq!(h.watermark("ft").await, Some(date(2025, 6, 13)));
}

#[tokio::test]
async fn test_today_mode_reads_run_date_only() {
    let mut source = phc_source();
    source.insert("bo", work_order("B3", run_date(), 10));
    let mut h = Harness::new(source);

    let summary = h.run(Job::TodayBoBi).await;
    assert!(summary.success(), "{summary:?}");
    assert_eq!(h.keys("bo", "document_id").await, vec![text("B3")]);
    assert_eq!(summary.get("bo").unwrap().query_start, Some(run_date()));
    assert_eq!(h.watermark("bo").await, Some(run_date()));
    assert_eq!(h.sink.row_count("cl").await, 2);
}

#[tokio::test]
async fn test_small_batches_load_everything() {
    let mut source = phc_source();
    for i in 0..25 {
        source.insert("fo", supplier_document(&format!("X{i:02}"), date(2025, 3, 1)));
    }
    let mut h = Harness::new(source);
    h.opts.batch_size = 4;

    let summary = h.run(Job::Table("fo".into())).await;
    assert_eq!(summary.get("fo").unwrap().rows_processed, 26);
    assert_eq!(h.sink.row_count("fo").await, 26);
}
