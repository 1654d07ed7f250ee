use crate::fixtures::*;
use phc_sync::jobs::Job;
use phc_sync::tables::{DEFAULT_COST_CENTER, DEFAULT_SALESPERSON};
use phc_sync::testing::{record, MemorySource};
use sync_core::{ColumnValue, SourceValue};

#[tokio::test]
async fn test_sentinel_defaults() {
    let mut source = phc_source();
    source.insert("cl", customer(3, "Tipografia", Some("   ")));
    let mut h = Harness::new(source);
    h.run(Job::FastBoBi).await;

    for (no, expected) in [(1, "ANA"), (2, DEFAULT_SALESPERSON), (3, DEFAULT_SALESPERSON)] {
        assert_eq!(
            h.sink
                .lookup("cl", &ColumnValue::Integer(Some(no)), "salesperson")
                .await,
            Some(text(expected)),
            "customer {no}"
        );
    }

    assert_eq!(
        h.sink.lookup("bi", &text("L1"), "cost_center").await,
        Some(text("Offset"))
    );
    assert_eq!(
        h.sink.lookup("bi", &text("L2"), "cost_center").await,
        Some(text(DEFAULT_COST_CENTER))
    );
}

#[tokio::test]
async fn test_legacy_dotted_dates() {
    let mut source = phc_source();
    source
        .records_mut("bo")
        .iter_mut()
        .for_each(|r| match r.get("bostamp").and_then(SourceValue::to_text).as_deref() {
            Some("B1") => {
                r.insert("ultfact".into(), SourceValue::from("05.03.2025"));
            }
            Some("B2") => {
                r.insert("ultfact".into(), SourceValue::from("not a date"));
            }
            _ => {}
        });
    let mut h = Harness::new(source);
    let summary = h.run(Job::Table("bo".into())).await;

    assert!(summary.success());
    assert_eq!(
        h.sink.lookup("bo", &text("B1"), "last_delivery_date").await,
        Some(day(date(2025, 3, 5)))
    );
    assert_eq!(
        h.sink.lookup("bo", &text("B2"), "last_delivery_date").await,
        Some(ColumnValue::Date(None))
    );
}

#[tokio::test]
async fn test_loose_source_values() {
    let mut source = MemorySource::new();
    source.insert(
        "ft",
        record([
            ("ftstamp", SourceValue::from(" F9 ")),
            ("fno", SourceValue::from("77")),
            ("no", SourceValue::from("not a number")),
            ("fdata", SourceValue::from("2025-04-01 00:00:00")),
            ("ettiliq", SourceValue::from("1.5e2")),
            ("anulado", SourceValue::from("N")),
        ]),
    );
    let mut h = Harness::new(source);
    let summary = h.run(Job::Table("ft".into())).await;
    assert!(summary.success(), "{summary:?}");

    let rows = h.sink.rows("ft").await;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row[0], text("F9"));
    assert_eq!(row[1], ColumnValue::Integer(Some(77)));
    assert_eq!(row[2], ColumnValue::Integer(None));
    assert_eq!(row[3], day(date(2025, 4, 1)));
    assert_eq!(row[5], numeric(150));
    assert_eq!(row[6], ColumnValue::Boolean(Some(false)));
    assert_eq!(h.watermark("ft").await, Some(date(2025, 4, 1)));
}

#[tokio::test]
async fn test_repeated_key_keeps_last_row() {
    let mut source = phc_source();
    source.insert("bo", work_order("B1", date(2025, 6, 10), 300));
    let mut h = Harness::new(source);
    let summary = h.run(Job::Table("bo".into())).await;

    assert!(summary.success());
    assert_eq!(h.sink.row_count("bo").await, 2);
    assert_eq!(
        h.sink.lookup("bo", &text("B1"), "total_value").await,
        Some(numeric(300))
    );
}

#[tokio::test]
async fn test_rows_without_key_are_dropped() {
    let mut source = phc_source();
    let mut keyless = work_order("B9", date(2025, 6, 1), 5);
    keyless.insert("bostamp".into(), SourceValue::from("  "));
    source.insert("bo", keyless);
    let mut h = Harness::new(source);
    let summary = h.run(Job::Table("bo".into())).await;

    assert!(summary.success());
    assert_eq!(h.keys("bo", "document_id").await, vec![text("B1"), text("B2")]);
}
