//! Error taxonomy for the pipeline stages.
//!
//! Library code returns [`MartError`]; the command-line layer wraps it with
//! `anyhow` context before reporting.

use std::path::PathBuf;

use itertools::Itertools;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MartError>;

#[derive(Error, Debug)]
pub enum MartError {
    #[error("Missing input file {path:?}")]
    MissingFile { path: PathBuf },

    #[error("Cannot read header of {path:?}: {reason}")]
    SchemaInference { path: PathBuf, reason: String },

    #[error("Schema mismatch in '{table}' union input {position}: expected {expected:?} but found {found:?}")]
    SchemaMismatch {
        table: String,
        position: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Union requires at least one input table")]
    EmptyUnion,

    #[error(
        "Archiving into {archive:?} failed for {} file(s), {} moved: {}",
        .failed.len(),
        .moved.len(),
        describe_failures(.failed)
    )]
    ArchiveIo {
        archive: PathBuf,
        moved: Vec<String>,
        failed: Vec<(String, String)>,
    },

    #[error("Column '{column}' not found in '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("Table '{table}' has no columns")]
    ColumnAccess { table: String },

    #[error("Row {row} column '{column}' in '{table}': '{value}' does not match date format '{format}'")]
    DateParse {
        table: String,
        column: String,
        row: usize,
        value: String,
        format: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Export failed for {path:?}: {reason}")]
    Export { path: PathBuf, reason: String },

    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_failures(failed: &[(String, String)]) -> String {
    failed
        .iter()
        .map(|(name, reason)| format!("{name}: {reason}"))
        .join("; ")
}

impl MartError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MartError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        MartError::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        MartError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}
