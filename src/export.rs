//! Optional persistence of the terminal tables.
//!
//! A [`TableSink`] writes one table under a file stem. The CSV sink is always
//! available; the Parquet sink is compiled with the `parquet` feature.

use std::{
    fs,
    path::{Path, PathBuf},
};

use csv::QuoteStyle;
use log::info;

use crate::{
    config::{ExportConfig, ExportFormat},
    data::render_cell,
    error::{MartError, Result},
    frame::Table,
    io_utils,
};

pub const MART_EXPORT_STEM: &str = "dataMart";

pub trait TableSink {
    /// Writes `table` as `{stem}.{ext}` and returns the written path.
    fn write(&self, stem: &str, table: &Table) -> Result<PathBuf>;
}

/// Writes headered CSV files into a directory.
#[derive(Debug, Clone)]
pub struct CsvSink {
    dir: PathBuf,
    delimiter: u8,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            dir: dir.into(),
            delimiter,
        }
    }
}

impl TableSink for CsvSink {
    fn write(&self, stem: &str, table: &Table) -> Result<PathBuf> {
        let path = self.dir.join(format!("{stem}.csv"));
        write_csv(&path, table, self.delimiter)?;
        Ok(path)
    }
}

/// Writes `table` to `path` as CSV. Dates use the canonical `YYYY-MM-DD`
/// rendering and nulls are written as empty fields.
pub fn write_csv(path: &Path, table: &Table, delimiter: u8) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, delimiter, QuoteStyle::Necessary)?;
    writer
        .write_record(table.columns())
        .map_err(|err| MartError::csv(path, err))?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|cell| render_cell(cell.as_ref())))
            .map_err(|err| MartError::csv(path, err))?;
    }
    writer.flush().map_err(|err| MartError::io(path, err))
}

#[cfg(feature = "parquet")]
pub use parquet_sink::ParquetSink;

#[cfg(feature = "parquet")]
mod parquet_sink {
    use std::{fs::File, path::PathBuf, sync::Arc};

    use arrow::{
        array::{ArrayRef, Date32Array, StringArray},
        datatypes::{DataType, Field, Schema},
        record_batch::RecordBatch,
    };
    use chrono::NaiveDate;
    use parquet::arrow::ArrowWriter;

    use super::TableSink;
    use crate::{
        data::Value,
        error::{MartError, Result},
        frame::Table,
    };

    /// Writes one Parquet file per table. A column holding only dates and
    /// nulls becomes `Date32`; every other column is written as UTF-8.
    #[derive(Debug, Clone)]
    pub struct ParquetSink {
        dir: PathBuf,
    }

    impl ParquetSink {
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self { dir: dir.into() }
        }
    }

    impl TableSink for ParquetSink {
        fn write(&self, stem: &str, table: &Table) -> Result<PathBuf> {
            let path = self.dir.join(format!("{stem}.parquet"));
            let export_err = |reason: String| MartError::Export {
                path: path.clone(),
                reason,
            };

            let mut fields = Vec::with_capacity(table.column_count());
            let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.column_count());
            for (idx, name) in table.columns().iter().enumerate() {
                let is_date_column = table.column_values(idx).any(|v| v.is_some())
                    && table
                        .column_values(idx)
                        .all(|v| v.is_none_or(|value| value.as_date().is_some()));
                if is_date_column {
                    fields.push(Field::new(name.as_str(), DataType::Date32, true));
                    let days = table
                        .column_values(idx)
                        .map(|v| v.and_then(Value::as_date).map(days_since_epoch))
                        .collect::<Vec<Option<i32>>>();
                    arrays.push(Arc::new(Date32Array::from(days)));
                } else {
                    fields.push(Field::new(name.as_str(), DataType::Utf8, true));
                    let values = table
                        .column_values(idx)
                        .map(|v| v.map(Value::as_display))
                        .collect::<Vec<Option<String>>>();
                    arrays.push(Arc::new(StringArray::from(values)));
                }
            }

            let schema = Arc::new(Schema::new(fields));
            let batch = RecordBatch::try_new(schema.clone(), arrays)
                .map_err(|err| export_err(err.to_string()))?;
            let file = File::create(&path).map_err(|err| MartError::io(&path, err))?;
            let mut writer = ArrowWriter::try_new(file, schema, None)
                .map_err(|err| export_err(err.to_string()))?;
            writer
                .write(&batch)
                .map_err(|err| export_err(err.to_string()))?;
            writer.close().map_err(|err| export_err(err.to_string()))?;
            Ok(path)
        }
    }

    fn days_since_epoch(date: NaiveDate) -> i32 {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        (date - epoch).num_days() as i32
    }
}

/// Builds the sink selected by `config`.
pub fn sink_for(config: &ExportConfig, delimiter: u8) -> Result<Box<dyn TableSink>> {
    match config.format {
        ExportFormat::Csv => Ok(Box::new(CsvSink::new(&config.path, delimiter))),
        #[cfg(feature = "parquet")]
        ExportFormat::Parquet => Ok(Box::new(ParquetSink::new(&config.path))),
        #[cfg(not(feature = "parquet"))]
        ExportFormat::Parquet => Err(MartError::Config(
            "Parquet export requires the `parquet` feature".to_string(),
        )),
    }
}

/// Writes every `(stem, table)` pair through the configured sink, creating
/// the output directory first.
pub fn export_tables(config: &ExportConfig, delimiter: u8, tables: &[(&str, &Table)]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&config.path).map_err(|err| MartError::io(&config.path, err))?;
    let sink = sink_for(config, delimiter)?;
    let mut written = Vec::with_capacity(tables.len());
    for (stem, table) in tables {
        let path = sink.write(stem, table)?;
        info!("Exported {} row(s) of '{}' to {:?}", table.row_count(), table.name(), path);
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::data::{Value, parse_cell};

    #[test]
    fn write_csv_renders_dates_and_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::from_rows(
            "orders",
            vec!["order_id".into(), "order_date".into()],
            vec![
                vec![parse_cell("1"), Some(Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()))],
                vec![parse_cell("2"), None],
            ],
        );
        let path = CsvSink::new(dir.path(), b',').write("orderHeader", &table).unwrap();
        assert_eq!(path.file_name().unwrap(), "orderHeader.csv");
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents, "order_id,order_date\n1,2024-01-02\n2,\n");
    }

    #[test]
    fn export_tables_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExportConfig {
            enabled: true,
            format: ExportFormat::Csv,
            path: dir.path().join("out"),
        };
        let table = Table::from_rows("items", vec!["item_id".into()], vec![vec![parse_cell("1")]]);
        let written = export_tables(&config, b',', &[("items", &table)]).unwrap();
        assert_eq!(written, vec![dir.path().join("out").join("items.csv")]);
        assert!(written[0].is_file());
    }
}
