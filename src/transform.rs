//! Per-entity cleaning applied after the snapshot union.
//!
//! Three steps, in order:
//!
//! 1. exact-row deduplication (first occurrence wins);
//! 2. date normalization of the resolved date columns;
//! 3. a stable ascending sort on the first column, nulls first.
//!
//! Normalization can make distinct rows equal (`1/2/2024` and `01/02/2024`,
//! or two unparseable values that both become null), so rows are deduplicated
//! once more after step 2. The input table is never modified and cells that
//! already hold a date are left alone: applying the transform to its own
//! output changes nothing.

use itertools::Itertools;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    config::{DatePolicy, EntityConfig, PipelineConfig},
    data::{DEFAULT_DATE_FORMAT, Value, parse_date},
    error::{MartError, Result},
    frame::Table,
};

/// Which columns of a table hold dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateColumns {
    /// Columns whose lowercased name contains `date`.
    ByName,
    Explicit(Vec<String>),
}

impl DateColumns {
    pub fn from_entity(entity: &EntityConfig) -> Self {
        match &entity.date_columns {
            Some(columns) => DateColumns::Explicit(columns.clone()),
            None => DateColumns::ByName,
        }
    }

    pub fn resolve(&self, table: &Table) -> Result<Vec<usize>> {
        match self {
            DateColumns::ByName => Ok(table
                .columns()
                .iter()
                .positions(|name| name.to_lowercase().contains("date"))
                .collect()),
            DateColumns::Explicit(names) => names
                .iter()
                .map(|name| table.require_column(name))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    pub date_columns: Vec<String>,
    pub dates_nulled: usize,
}

#[derive(Debug, Clone)]
pub struct Transformer {
    date_columns: DateColumns,
    date_format: String,
    policy: DatePolicy,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(DateColumns::ByName, DEFAULT_DATE_FORMAT, DatePolicy::NullOnFailure)
    }
}

impl Transformer {
    pub fn new(date_columns: DateColumns, date_format: impl Into<String>, policy: DatePolicy) -> Self {
        Self {
            date_columns,
            date_format: date_format.into(),
            policy,
        }
    }

    pub fn for_entity(config: &PipelineConfig, entity: &EntityConfig) -> Self {
        Self::new(
            DateColumns::from_entity(entity),
            config.date_format.clone(),
            config.date_policy,
        )
    }

    pub fn apply(&self, table: &Table) -> Result<(Table, TransformReport)> {
        if table.column_count() == 0 {
            return Err(MartError::ColumnAccess {
                table: table.name().to_string(),
            });
        }

        let mut cleaned = table.distinct();
        let mut report = TransformReport {
            input_rows: table.row_count(),
            ..TransformReport::default()
        };

        let date_indices = self.date_columns.resolve(&cleaned)?;
        for idx in &date_indices {
            let column = cleaned.columns()[*idx].clone();
            let nulled = self.normalize_dates(&mut cleaned, *idx, &column)?;
            if nulled > 0 {
                warn!(
                    "'{}': {nulled} value(s) in '{column}' did not match '{}' and were nulled",
                    cleaned.name(),
                    self.date_format
                );
            }
            report.dates_nulled += nulled;
            report.date_columns.push(column);
        }
        if !date_indices.is_empty() {
            cleaned = cleaned.distinct();
        }
        report.duplicates_removed = table.row_count() - cleaned.row_count();

        cleaned.sort_by_column(0)?;
        debug!(
            "Transformed '{}': {} -> {} row(s), date columns [{}]",
            cleaned.name(),
            report.input_rows,
            cleaned.row_count(),
            report.date_columns.join(", ")
        );
        Ok((cleaned, report))
    }

    fn normalize_dates(&self, table: &mut Table, idx: usize, column: &str) -> Result<usize> {
        let name = table.name().to_string();
        let mut nulled = 0usize;
        for (row_idx, row) in table.rows_mut().iter_mut().enumerate() {
            let Some(Value::String(raw)) = &row[idx] else {
                continue;
            };
            match parse_date(raw, &self.date_format) {
                Some(date) => row[idx] = Some(Value::Date(date)),
                None if self.policy == DatePolicy::FailFast => {
                    return Err(MartError::DateParse {
                        table: name,
                        column: column.to_string(),
                        row: row_idx + 1,
                        value: raw.clone(),
                        format: self.date_format.clone(),
                    });
                }
                None => {
                    row[idx] = None;
                    nulled += 1;
                }
            }
        }
        Ok(nulled)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::data::parse_cell;

    fn orders(rows: &[[&str; 3]]) -> Table {
        Table::from_rows(
            "order_headers",
            vec!["order_id".into(), "Order_Date".into(), "currency".into()],
            rows.iter()
                .map(|r| r.iter().map(|v| parse_cell(v)).collect())
                .collect(),
        )
    }

    #[test]
    fn apply_dedups_parses_dates_and_sorts() {
        let input = orders(&[
            ["101", "1/2/2024", "EUR"],
            ["100", "12/31/2023", "USD"],
            ["101", "1/2/2024", "EUR"],
        ]);
        let (output, report) = Transformer::default().apply(&input).unwrap();
        assert_eq!(output.row_count(), 2);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.date_columns, vec!["Order_Date".to_string()]);
        assert_eq!(output.rows()[0][0], parse_cell("100"));
        assert_eq!(
            output.rows()[0][1],
            Some(Value::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()))
        );
        assert_eq!(input.row_count(), 3);
    }

    #[test]
    fn apply_nulls_non_conforming_dates_by_default() {
        let input = orders(&[["1", "2024-01-02", "EUR"], ["2", "", "EUR"]]);
        let (output, report) = Transformer::default().apply(&input).unwrap();
        assert_eq!(report.dates_nulled, 1);
        assert_eq!(output.rows()[0][1], None);
        assert_eq!(output.rows()[1][1], None);
    }

    #[test]
    fn apply_fails_fast_when_configured() {
        let input = orders(&[["1", "not a date", "EUR"]]);
        let transformer =
            Transformer::new(DateColumns::ByName, DEFAULT_DATE_FORMAT, DatePolicy::FailFast);
        let err = transformer.apply(&input).unwrap_err();
        assert!(matches!(err, MartError::DateParse { row: 1, .. }));
    }

    #[test]
    fn explicit_date_columns_override_name_matching() {
        let input = orders(&[["1", "1/2/2024", "EUR"]]);
        let transformer = Transformer::new(
            DateColumns::Explicit(Vec::new()),
            DEFAULT_DATE_FORMAT,
            DatePolicy::NullOnFailure,
        );
        let (output, report) = transformer.apply(&input).unwrap();
        assert!(report.date_columns.is_empty());
        assert_eq!(output.rows()[0][1], parse_cell("1/2/2024"));

        let missing = Transformer::new(
            DateColumns::Explicit(vec!["ship_date".to_string()]),
            DEFAULT_DATE_FORMAT,
            DatePolicy::NullOnFailure,
        );
        assert!(matches!(
            missing.apply(&input),
            Err(MartError::MissingColumn { .. })
        ));
    }

    #[test]
    fn apply_is_idempotent() {
        let input = orders(&[
            ["2", "3/4/2024", "EUR"],
            ["1", "bad", "USD"],
            ["2", "3/4/2024", "EUR"],
        ]);
        let transformer = Transformer::default();
        let (once, _) = transformer.apply(&input).unwrap();
        let (twice, report) = transformer.apply(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(report.duplicates_removed, 0);
        assert_eq!(report.dates_nulled, 0);
    }

    #[test]
    fn rows_equal_after_normalization_collapse() {
        let input = orders(&[
            ["1", "1/2/2024", "EUR"],
            ["1", "01/02/2024", "EUR"],
            ["2", "bad", "EUR"],
            ["2", "worse", "EUR"],
        ]);
        let (output, report) = Transformer::default().apply(&input).unwrap();
        assert_eq!(output.row_count(), 2);
        assert_eq!(report.duplicates_removed, 2);
        assert_eq!(report.dates_nulled, 2);
    }

    #[test]
    fn apply_rejects_tables_without_columns() {
        let empty = Table::new("nothing", Vec::new());
        assert!(matches!(
            Transformer::default().apply(&empty),
            Err(MartError::ColumnAccess { .. })
        ));
    }
}
