//! Audit records written once per snapshot ingestion.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDateTime, SubsecRound};
use csv::QuoteStyle;
use serde::{Deserialize, Serialize};

use crate::{
    error::{MartError, Result},
    io_utils,
};

pub const AUDIT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    Success,
    Failed,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditStatus::Success => f.write_str("Success"),
            AuditStatus::Failed => f.write_str("Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(with = "timestamp")]
    pub start_time: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub end_time: NaiveDateTime,
    pub numberrow_treatment: usize,
    pub status: AuditStatus,
}

impl AuditRecord {
    pub fn file_name(day: &str) -> String {
        format!("Audit_{day}.csv")
    }

    /// Current local time at the microsecond precision the audit file keeps,
    /// so a record compares equal to its saved copy.
    pub fn now() -> NaiveDateTime {
        Local::now().naive_local().trunc_subsecs(6)
    }

    /// Writes the record as a one-row CSV with a header.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer =
            io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER, QuoteStyle::Necessary)?;
        writer
            .serialize(self)
            .map_err(|err| MartError::csv(path, err))?;
        writer.flush().map_err(|err| MartError::io(path, err))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader(path, io_utils::DEFAULT_CSV_DELIMITER)?;
        let mut records = reader.deserialize::<AuditRecord>();
        match records.next() {
            Some(record) => record.map_err(|err| MartError::csv(path, err)),
            None => Err(MartError::SchemaInference {
                path: path.to_path_buf(),
                reason: "audit file has no data row".to_string(),
            }),
        }
    }
}

/// Finds every `*_archive/Audit_*.csv` directly under `archive_root`, sorted
/// by path.
pub fn discover_audit_files(archive_root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries =
        std::fs::read_dir(archive_root).map_err(|err| MartError::io(archive_root, err))?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| MartError::io(archive_root, err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(day) = name.strip_suffix("_archive") else {
            continue;
        };
        let audit = entry.path().join(AuditRecord::file_name(day));
        if audit.is_file() {
            found.push((day.to_string(), audit));
        }
    }
    found.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(found)
}

mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::AUDIT_TIMESTAMP_FORMAT;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(AUDIT_TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(raw.trim(), AUDIT_TIMESTAMP_FORMAT)
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;

    use super::*;

    fn sample() -> AuditRecord {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(8, 0, 0, 125)
            .unwrap();
        AuditRecord {
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(40),
            numberrow_treatment: 12,
            status: AuditStatus::Success,
        }
    }

    #[test]
    fn save_writes_single_row_with_fixed_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AuditRecord::file_name("day1"));
        sample().save(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "start_time,end_time,numberrow_treatment,status");
        assert_eq!(
            lines[1],
            "2024-03-01 08:00:00.000125,2024-03-01 08:00:00.040125,12,Success"
        );
        assert_eq!(lines.len(), 2);
        assert_eq!(AuditRecord::load(&path).unwrap(), sample());
    }

    #[test]
    fn now_survives_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AuditRecord::file_name("day1"));
        let now = AuditRecord::now();
        let record = AuditRecord {
            start_time: now,
            end_time: now,
            numberrow_treatment: 0,
            status: AuditStatus::Failed,
        };
        record.save(&path).unwrap();
        assert_eq!(AuditRecord::load(&path).unwrap(), record);
    }

    #[test]
    fn discover_audit_files_only_matches_archive_folders() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("day1_archive")).unwrap();
        fs::create_dir(dir.path().join("other")).unwrap();
        sample()
            .save(&dir.path().join("day1_archive").join("Audit_day1.csv"))
            .unwrap();
        let found = discover_audit_files(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "day1");
    }
}
