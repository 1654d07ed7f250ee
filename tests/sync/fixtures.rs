//! Shared PHC fixtures.

use chrono::NaiveDate;
use phc_sync::config::SyncOpts;
use phc_sync::jobs::{run_job, Job};
use phc_sync::sync::SyncSession;
use phc_sync::tables::phc_registry;
use phc_sync::testing::{record, MemorySink, MemorySource, Record};
use rust_decimal::Decimal;
use sync_core::{ColumnValue, RunSummary, SchemaRegistry, SourceValue, SyncWindow};
use watermark::MemoryWatermarkStore;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Run date used by every test: retention boundary 2025-01-01.
pub fn run_date() -> NaiveDate {
    date(2025, 6, 15)
}

pub fn text(value: &str) -> ColumnValue {
    ColumnValue::text(value)
}

pub fn numeric(value: i64) -> ColumnValue {
    ColumnValue::Numeric(Some(Decimal::from(value)))
}

pub fn day(value: NaiveDate) -> ColumnValue {
    ColumnValue::Date(Some(value))
}

pub fn customer(no: i64, name: &str, salesperson: Option<&str>) -> Record {
    record([
        ("no", SourceValue::from(no)),
        ("nome", SourceValue::from(name)),
        ("local", SourceValue::from("Lisboa")),
        ("inactivo", SourceValue::from(false)),
        ("vendnm", SourceValue::from(salesperson)),
    ])
}

pub fn work_order(stamp: &str, dated: NaiveDate, total: i64) -> Record {
    record([
        ("bostamp", SourceValue::from(stamp)),
        ("obrano", SourceValue::from(format!("OB-{stamp}"))),
        ("nmdos", SourceValue::from("Orçamento")),
        ("no", SourceValue::from(1)),
        ("dataobra", SourceValue::from(dated)),
        ("ebo_2tvall", SourceValue::from(Decimal::from(total))),
    ])
}

pub fn work_order_line(stamp: &str, order: &str, qtt: i64, cost_center: Option<&str>) -> Record {
    record([
        ("bistamp", SourceValue::from(stamp)),
        ("bostamp", SourceValue::from(order)),
        ("design", SourceValue::from("Impressão A3")),
        ("qtt", SourceValue::from(qtt)),
        ("ccusto", SourceValue::from(cost_center)),
    ])
}

pub fn invoice(stamp: &str, number: i64, dated: NaiveDate, cancelled: bool) -> Record {
    record([
        ("ftstamp", SourceValue::from(stamp)),
        ("fno", SourceValue::from(number)),
        ("no", SourceValue::from(1)),
        ("fdata", SourceValue::from(dated)),
        ("nmdoc", SourceValue::from("Factura")),
        ("ettiliq", SourceValue::from(100.5)),
        ("anulado", SourceValue::from(cancelled)),
    ])
}

pub fn invoice_line(stamp: &str, invoice: &str, net: i64) -> Record {
    record([
        ("fistamp", SourceValue::from(stamp)),
        ("ftstamp", SourceValue::from(invoice)),
        ("fno", SourceValue::from(1)),
        ("etiliquido", SourceValue::from(net)),
    ])
}

pub fn supplier_document(stamp: &str, dated: NaiveDate) -> Record {
    record([
        ("fostamp", SourceValue::from(stamp)),
        ("pdata", SourceValue::from(dated)),
        ("etotal", SourceValue::from("12.30")),
        ("tipo", SourceValue::from("FO")),
    ])
}

/// A small PHC database: one row of each table inside the current year and
/// a few older ones that must stay out of the destination.
pub fn phc_source() -> MemorySource {
    let mut source = MemorySource::new();
    source
        .insert("cl", customer(1, "Gráfica Lda", Some("ANA")))
        .insert("cl", customer(2, "Papelaria", None))
        .insert("bo", work_order("B1", date(2025, 6, 10), 250))
        .insert("bo", work_order("B2", date(2025, 6, 14), 90))
        .insert("bo", work_order("B0", date(2024, 12, 30), 40))
        .insert("bi", work_order_line("L1", "B1", 2, Some("Offset")))
        .insert("bi", work_order_line("L2", "B2", 1, None))
        .insert("bi", work_order_line("L3", "B1", 0, Some("Offset")))
        .insert("bi", work_order_line("L0", "B0", 5, None))
        .insert("ft", invoice("F1", 101, date(2025, 6, 12), false))
        .insert("ft", invoice("F2", 102, date(2025, 6, 13), true))
        .insert("ft", invoice("F0", 99, date(2024, 11, 2), false))
        .insert("fi", invoice_line("I1", "F1", 80))
        .insert("fi", invoice_line("I2", "F2", 20))
        .insert("fi", invoice_line("I3", "F1", 0))
        .insert("fo", supplier_document("S1", date(2025, 5, 20)))
        .insert("fo", supplier_document("S0", date(2024, 5, 20)));
    source
}

pub struct Harness {
    pub source: MemorySource,
    pub sink: MemorySink,
    pub watermarks: MemoryWatermarkStore,
    pub registry: SchemaRegistry,
    pub opts: SyncOpts,
}

impl Harness {
    pub fn new(source: MemorySource) -> Self {
        Self {
            source,
            sink: MemorySink::new(),
            watermarks: MemoryWatermarkStore::new(),
            registry: phc_registry().unwrap(),
            opts: SyncOpts::default(),
        }
    }

    pub async fn run(&mut self, job: Job) -> RunSummary {
        self.run_on(job, run_date()).await
    }

    pub async fn run_on(&mut self, job: Job, on: NaiveDate) -> RunSummary {
        let mut session = SyncSession::new(
            &mut self.source,
            &self.sink,
            &self.watermarks,
            &self.registry,
            SyncWindow::starting(on),
            self.opts.batch_size,
        );
        run_job(&mut session, &job, &self.opts).await
    }

    pub async fn watermark(&self, table: &str) -> Option<NaiveDate> {
        self.watermarks
            .snapshot()
            .await
            .get(table)
            .map(|stored| stored.watermark)
    }

    pub async fn keys(&self, table: &str, column: &str) -> Vec<ColumnValue> {
        let mut keys = self.sink.column(table, column).await;
        keys.sort_by_key(|value| format!("{value:?}"));
        keys
    }
}
