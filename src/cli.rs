use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    config::{DatePolicy, ExportFormat, SnapshotSpec},
    io_utils::parse_delimiter,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Consolidate daily CSV snapshots into a data mart", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest, archive, union, transform and join every configured snapshot
    Run(RunArgs),
    /// Ingest and archive a single snapshot, writing its audit record
    Ingest(IngestArgs),
    /// List the audit records found under an archive root
    Audit(AuditArgs),
    /// Write the default pipeline configuration as YAML
    Config(ConfigArgs),
}

/// Options shared by commands that read snapshot folders.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Pipeline configuration file (YAML)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Directory that receives the `{day}_archive` folders
    #[arg(long = "archive-root")]
    pub archive_root: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the snapshot files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Snapshot as `day=folder`; repeat in ingestion order (replaces configured snapshots)
    #[arg(long = "snapshot", value_parser = parse_snapshot, action = clap::ArgAction::Append)]
    pub snapshots: Vec<SnapshotSpec>,
    /// chrono format of date columns (default `%m/%d/%Y`)
    #[arg(long = "date-format")]
    pub date_format: Option<String>,
    /// Handling of date values that do not match the format
    #[arg(long = "date-policy", value_enum)]
    pub date_policy: Option<DatePolicy>,
    /// Write the mart rows to this CSV file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Export the transformed tables and the mart into this directory
    #[arg(long = "export-dir")]
    pub export_dir: Option<PathBuf>,
    /// Export file format
    #[arg(long = "export-format", value_enum)]
    pub export_format: Option<ExportFormat>,
    /// Print the first N mart rows as a table
    #[arg(long = "preview")]
    pub preview: Option<usize>,
    /// Print the run report as JSON on stdout
    #[arg(long = "report")]
    pub report: bool,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Day label used for the archive folder and audit file
    #[arg(long)]
    pub day: String,
    /// Folder holding the snapshot's CSV extracts
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Directory holding the `{day}_archive` folders
    #[arg(long = "archive-root", default_value = ".")]
    pub archive_root: PathBuf,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Destination YAML file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_snapshot(value: &str) -> Result<SnapshotSpec, String> {
    value.parse::<SnapshotSpec>().map_err(|err| err.to_string())
}
