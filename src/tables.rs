//! Built-in PHC table registry.
//!
//! | Table | Contents | Selection |
//! |-------|----------|-----------|
//! | `cl` | customers | whole table |
//! | `bo` | work orders and budgets | `dataobra` |
//! | `bi` | work order lines | parent `bo.dataobra` |
//! | `ft` | invoices and credit notes | `fdata`, archives skip cancelled |
//! | `fi` | invoice lines | parent `ft.fdata`, parent not cancelled |
//! | `fo` | supplier documents | `pdata` |

use sync_core::{
    CoercionOverride, ColumnOverride, ColumnSpec, ExtractionStrategy, ParentLink, Predicate,
    RowFilter, SchemaError, SchemaRegistry, SemanticType, TableSyncSpec,
};

use SemanticType::{Boolean, Date, Integer, Numeric, Text};

/// Salesperson recorded when PHC leaves it blank.
pub const DEFAULT_SALESPERSON: &str = "IMACX";

/// Cost center recorded when a document line has none.
pub const DEFAULT_COST_CENTER: &str = "ID-Impressão Digital";

fn col(source: &str, ty: SemanticType, destination: &str) -> ColumnSpec {
    ColumnSpec::new(source, ty).mapped(destination)
}

fn direct(column: &str) -> ExtractionStrategy {
    ExtractionStrategy::DirectDateFilter {
        column: column.to_string(),
    }
}

fn customers() -> TableSyncSpec {
    TableSyncSpec::new("cl", "All Customers", ExtractionStrategy::FullScan)
        .column(col("no", Integer, "customer_id").not_null())
        .column(col("nome", Text, "customer_name"))
        .column(col("morada", Text, "address"))
        .column(col("local", Text, "city"))
        .column(col("codpost", Text, "postal_code"))
        .column(col("inactivo", Boolean, "is_inactive"))
        .column(col("vendnm", Text, "salesperson"))
        .primary_key("customer_id")
        .skip_when_recent()
}

fn work_orders() -> TableSyncSpec {
    TableSyncSpec::new("bo", "Work Orders/Budgets", direct("dataobra"))
        .column(col("bostamp", Text, "document_id").not_null())
        .column(col("obrano", Text, "document_number").not_null())
        .column(col("nmdos", Text, "document_type"))
        .column(col("no", Integer, "customer_id"))
        .column(col("dataobra", Date, "document_date"))
        // PHC swaps these two labels.
        .column(col("obranome", Text, "observacoes"))
        .column(col("obs", Text, "nome_trabalho"))
        .column(col("origem", Text, "origin"))
        .column(col("ebo_2tvall", Numeric, "total_value"))
        .column(col("ultfact", Date, "last_delivery_date"))
        .column(col("ousrinis", Text, "created_by"))
        .primary_key("document_id")
        .retention("document_date")
}

fn work_order_lines() -> TableSyncSpec {
    TableSyncSpec::new(
        "bi",
        "Document Lines",
        ExtractionStrategy::ParentJoinFilter(ParentLink {
            table: "bo".into(),
            key: "bostamp".into(),
            date_column: "dataobra".into(),
            filter: RowFilter::default(),
        }),
    )
    .column(col("bistamp", Text, "line_id").not_null())
    .column(col("bostamp", Text, "document_id").not_null())
    .column(col("design", Text, "description"))
    .column(col("qtt", Numeric, "quantity"))
    .column(col("ettdeb", Numeric, "line_total"))
    .column(col("pu", Numeric, "unit_price"))
    .column(col("ref", Text, "item_reference"))
    .column(col("ccusto", Text, "cost_center"))
    .primary_key("line_id")
    .filter(Predicate::NonZero {
        column: "qtt".into(),
    })
}

fn invoices() -> TableSyncSpec {
    TableSyncSpec::new("ft", "Invoices/Credit Notes", direct("fdata"))
        .column(col("ftstamp", Text, "invoice_id").not_null())
        .column(col("fno", Integer, "invoice_number").not_null())
        .column(col("no", Integer, "customer_id"))
        .column(col("fdata", Date, "invoice_date"))
        .column(col("nmdoc", Text, "document_type"))
        // Net of VAT, negative on credit notes.
        .column(col("ettiliq", Numeric, "net_value"))
        .column(col("anulado", Boolean, "is_cancelled"))
        .column(col("vendnm", Text, "salesperson_name"))
        .column(col("nome", Text, "customer_name"))
        .column(col("ousrinis", Text, "created_by"))
        .primary_key("invoice_id")
        .retention("invoice_date")
        // Cancelled invoices stay live but are not archived.
        .archive_filter(Predicate::NotFlagged {
            column: "anulado".into(),
        })
}

fn invoice_lines() -> TableSyncSpec {
    TableSyncSpec::new(
        "fi",
        "Invoice Lines",
        ExtractionStrategy::ParentJoinFilter(ParentLink {
            table: "ft".into(),
            key: "ftstamp".into(),
            date_column: "fdata".into(),
            filter: RowFilter::new().and(Predicate::NotFlagged {
                column: "anulado".into(),
            }),
        }),
    )
    .column(col("fistamp", Text, "line_item_id").not_null())
    .column(col("ftstamp", Text, "invoice_id").not_null())
    .column(col("fno", Integer, "document_number"))
    .column(col("ficcusto", Text, "cost_center"))
    .column(col("fivendnm", Text, "salesperson_name"))
    .column(col("etiliquido", Numeric, "net_liquid_value"))
    .primary_key("line_item_id")
    .filter(Predicate::NonZero {
        column: "etiliquido".into(),
    })
}

fn supplier_documents() -> TableSyncSpec {
    TableSyncSpec::new("fo", "Supplier Documents", direct("pdata"))
        .column(col("fostamp", Text, "document_id").not_null())
        .column(col("aivamv9", Text, "internal_document_number"))
        .column(col("pdata", Date, "document_date"))
        .column(col("ettiliq", Numeric, "net_liquid_value"))
        .column(col("nome", Text, "customer_name"))
        .column(col("adoc", Text, "document_number"))
        .column(col("tipo", Text, "document_type"))
        .column(col("etotal", Numeric, "total_value"))
        .primary_key("document_id")
        .retention("document_date")
}

fn overrides() -> Vec<CoercionOverride> {
    vec![
        CoercionOverride::new(
            "cl",
            "vendnm",
            ColumnOverride::DefaultText {
                value: DEFAULT_SALESPERSON.into(),
            },
        ),
        CoercionOverride::new(
            "bi",
            "ccusto",
            ColumnOverride::DefaultText {
                value: DEFAULT_COST_CENTER.into(),
            },
        ),
        // Free-text DD.MM.YYYY in older PHC installs.
        CoercionOverride::new("bo", "ultfact", ColumnOverride::DottedDate),
    ]
}

/// The PHC registry: cl, bo, bi, ft, fi, fo in sync order.
pub fn phc_registry() -> Result<SchemaRegistry, SchemaError> {
    SchemaRegistry::new(
        vec![
            customers(),
            work_orders(),
            work_order_lines(),
            invoices(),
            invoice_lines(),
            supplier_documents(),
        ],
        overrides(),
    )
}
