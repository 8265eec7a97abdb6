//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is loaded from YAML; every field has a default so an
//! empty document describes the reference two-day run. Command-line flags
//! override individual fields after loading.

use std::{
    collections::HashSet,
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{data::DEFAULT_DATE_FORMAT, error::MartError};

/// The four entity tables carried by every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Items,
    Customers,
    OrderHeaders,
    OrderLines,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Items,
        EntityKind::Customers,
        EntityKind::OrderHeaders,
        EntityKind::OrderLines,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Items => "items",
            EntityKind::Customers => "customers",
            EntityKind::OrderHeaders => "order_headers",
            EntityKind::OrderLines => "order_lines",
        }
    }

    pub fn default_file_name(self) -> String {
        format!("{}.csv", self.as_str())
    }

    /// File stem used by the export sinks.
    pub fn export_stem(self) -> &'static str {
        match self {
            EntityKind::Items => "items",
            EntityKind::Customers => "customers",
            EntityKind::OrderHeaders => "orderHeader",
            EntityKind::OrderLines => "orderLine",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a date cell that does not match the configured format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum DatePolicy {
    #[default]
    NullOnFailure,
    FailFast,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "kebab-case")]
pub enum ExportFormat {
    #[default]
    Parquet,
    Csv,
}

/// One snapshot to ingest: a day label and the folder holding its extracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSpec {
    pub day: String,
    pub source: PathBuf,
}

impl FromStr for SnapshotSpec {
    type Err = anyhow::Error;

    /// Parses `day=path`.
    fn from_str(value: &str) -> Result<Self> {
        let (day, source) = value
            .split_once('=')
            .ok_or_else(|| anyhow!("Snapshot '{value}' must have the form day=path"))?;
        let day = day.trim();
        let source = source.trim();
        if day.is_empty() || source.is_empty() {
            return Err(anyhow!("Snapshot '{value}' must name both a day and a path"));
        }
        Ok(SnapshotSpec {
            day: day.to_string(),
            source: PathBuf::from(source),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// File name inside each snapshot folder; defaults to `{entity}.csv`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Columns to parse as dates. When absent, every column whose lowercased
    /// name contains `date` is parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitiesConfig {
    pub items: EntityConfig,
    pub customers: EntityConfig,
    pub order_headers: EntityConfig,
    pub order_lines: EntityConfig,
}

impl EntitiesConfig {
    pub fn get(&self, kind: EntityKind) -> &EntityConfig {
        match kind {
            EntityKind::Items => &self.items,
            EntityKind::Customers => &self.customers,
            EntityKind::OrderHeaders => &self.order_headers,
            EntityKind::OrderLines => &self.order_lines,
        }
    }

    pub fn file_name(&self, kind: EntityKind) -> String {
        self.get(kind)
            .file
            .clone()
            .unwrap_or_else(|| kind.default_file_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub format: ExportFormat,
    pub path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: ExportFormat::Parquet,
            path: PathBuf::from("/parquet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub snapshots: Vec<SnapshotSpec>,
    /// Directory under which `{day}_archive` folders are created.
    pub archive_root: PathBuf,
    #[serde(with = "delimiter_serde")]
    pub delimiter: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// chrono format used for date columns.
    pub date_format: String,
    pub date_policy: DatePolicy,
    pub entities: EntitiesConfig,
    pub export: ExportConfig,
    /// Optional CSV destination for the mart rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mart_output: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            snapshots: vec![
                SnapshotSpec {
                    day: "day1".to_string(),
                    source: PathBuf::from("./day1_files"),
                },
                SnapshotSpec {
                    day: "day2".to_string(),
                    source: PathBuf::from("./day2_files"),
                },
            ],
            archive_root: PathBuf::from("."),
            delimiter: crate::io_utils::DEFAULT_CSV_DELIMITER,
            encoding: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            date_policy: DatePolicy::NullOnFailure,
            entities: EntitiesConfig::default(),
            export: ExportConfig::default(),
            mart_output: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: PipelineConfig =
            serde_yaml::from_reader(reader).context("Parsing pipeline config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing pipeline config YAML")
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |message: String| Err(MartError::Config(message));
        if self.snapshots.is_empty() {
            return invalid("at least one snapshot must be configured".to_string());
        }
        let mut days = HashSet::new();
        for snapshot in &self.snapshots {
            if snapshot.day.trim().is_empty() {
                return invalid("snapshot day labels cannot be empty".to_string());
            }
            if !days.insert(snapshot.day.as_str()) {
                return invalid(format!(
                    "snapshot day '{}' is configured more than once",
                    snapshot.day
                ));
            }
        }
        if self.date_format.trim().is_empty() {
            return invalid("date_format cannot be empty".to_string());
        }
        crate::io_utils::resolve_encoding(self.encoding.as_deref())?;
        if self.export.enabled
            && self.export.format == ExportFormat::Parquet
            && !cfg!(feature = "parquet")
        {
            return invalid(
                "Parquet export requires building with the `parquet` feature; use format: csv instead"
                    .to_string(),
            );
        }
        Ok(())
    }
}

mod delimiter_serde {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S>(value: &u8, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&crate::io_utils::printable_delimiter(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u8, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let token = if raw == "\\t" { "tab" } else { raw.as_str() };
        crate::io_utils::parse_delimiter(token).map_err(de::Error::custom)
    }
}
