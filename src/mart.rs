//! Data mart construction: fixed projections of the four transformed entity
//! tables and the inner-join chain
//! order lines ⋈ order headers ⋈ customers ⋈ items.

use log::{info, warn};
use serde::Serialize;

use crate::{error::Result, frame::Table};

pub const ORDER_LINE_COLUMNS: &[&str] = &[
    "order_id",
    "item_id",
    "ship_date",
    "promise_date",
    "ordered_quantity",
];
pub const CUSTOMER_COLUMNS: &[&str] = &[
    "customer_id",
    "customer_number",
    "customer_name",
    "address",
    "city",
    "country_code",
    "postal_code",
];
pub const ITEM_COLUMNS: &[&str] = &["item_id", "item_description", "item_status"];
pub const ORDER_HEADER_COLUMNS: &[&str] = &[
    "order_id",
    "order_number",
    "order_date",
    "currency",
    "customer_id",
];

pub const MART_TABLE_NAME: &str = "data_mart";

/// Rows lost at one join step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinStep {
    pub key: String,
    pub input_rows: usize,
    pub output_rows: usize,
    pub dropped_rows: usize,
    pub null_keys: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MartReport {
    pub order_lines: usize,
    pub mart_rows: usize,
    pub steps: Vec<JoinStep>,
}

/// The four transformed entity tables the mart is built from.
#[derive(Debug, Clone, Copy)]
pub struct MartInputs<'a> {
    pub items: &'a Table,
    pub customers: &'a Table,
    pub order_headers: &'a Table,
    pub order_lines: &'a Table,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MartBuilder;

impl MartBuilder {
    pub fn build(&self, inputs: MartInputs<'_>) -> Result<(Table, MartReport)> {
        let lines = inputs.order_lines.select(ORDER_LINE_COLUMNS)?;
        let headers = inputs.order_headers.select(ORDER_HEADER_COLUMNS)?;
        let customers = inputs.customers.select(CUSTOMER_COLUMNS)?;
        let items = inputs.items.select(ITEM_COLUMNS)?;

        let mut report = MartReport {
            order_lines: lines.row_count(),
            ..MartReport::default()
        };

        let mut current = lines;
        for (right, key) in [
            (&headers, "order_id"),
            (&customers, "customer_id"),
            (&items, "item_id"),
        ] {
            let (joined, stats) = current.inner_join(right, key)?;
            if stats.unmatched_left > 0 {
                warn!(
                    "Join on '{key}' with '{}' dropped {} row(s) ({} with a null key)",
                    right.name(),
                    stats.unmatched_left,
                    stats.null_keys
                );
            }
            report.steps.push(JoinStep {
                key: key.to_string(),
                input_rows: stats.left_rows,
                output_rows: stats.output_rows,
                dropped_rows: stats.unmatched_left,
                null_keys: stats.null_keys,
            });
            current = joined;
        }

        let mart = current.with_name(MART_TABLE_NAME);
        report.mart_rows = mart.row_count();
        info!(
            "Data mart built: {} row(s) from {} order line(s), {} column(s)",
            report.mart_rows,
            report.order_lines,
            mart.column_count()
        );
        Ok((mart, report))
    }
}
