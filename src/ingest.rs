//! Snapshot ingestion: load the four entity extracts of one day, count their
//! rows, move the source files into `{day}_archive` and write the audit
//! record for the run.

use std::{
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    audit::{AuditRecord, AuditStatus},
    config::{EntitiesConfig, EntityKind, PipelineConfig, SnapshotSpec},
    error::{MartError, Result},
    frame::Table,
    loader::{self, LoadOptions},
    pipeline::RunContext,
};

/// Outcome of moving a snapshot folder's files into its archive folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub archive_dir: PathBuf,
    pub moved: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl ArchiveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct IngestionAuditor {
    archive_root: PathBuf,
    entities: EntitiesConfig,
    options: LoadOptions,
}

impl IngestionAuditor {
    pub fn new(archive_root: impl Into<PathBuf>, entities: EntitiesConfig, options: LoadOptions) -> Self {
        Self {
            archive_root: archive_root.into(),
            entities,
            options,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(
            config.archive_root.clone(),
            config.entities.clone(),
            LoadOptions::from_config(config)?,
        ))
    }

    pub fn archive_dir(&self, day: &str) -> PathBuf {
        self.archive_root.join(format!("{day}_archive"))
    }

    /// Ingests one snapshot and appends its four tables to `context`.
    ///
    /// All four files are loaded before anything is moved, so a load failure
    /// leaves the source folder untouched. Archiving is best-effort: every
    /// entry is attempted and a `Failed` audit record is still written when
    /// the archive folder exists. Any archive failure returns `ArchiveIo`
    /// listing moved and failed entries, and the tables are appended to
    /// `context` only when the whole folder was archived.
    pub fn ingest(&self, snapshot: &SnapshotSpec, context: &mut RunContext) -> Result<AuditRecord> {
        let start_time = AuditRecord::now();
        info!(
            "Ingesting snapshot '{}' from {:?}",
            snapshot.day, snapshot.source
        );

        let tables = EntityKind::ALL
            .iter()
            .map(|kind| {
                let file_name = self.entities.file_name(*kind);
                loader::load_entity(*kind, &snapshot.source, &file_name, &self.options)
                    .map(|table| (*kind, table))
            })
            .collect::<Result<Vec<(EntityKind, Table)>>>()?;

        let numberrow_treatment = tables.iter().map(|(_, table)| table.row_count()).sum();
        for (kind, table) in &tables {
            debug!("  {kind}: {} row(s)", table.row_count());
        }

        let archive_dir = self.archive_dir(&snapshot.day);
        let report = archive_files(&snapshot.source, &archive_dir);
        let status = if report.is_complete() {
            AuditStatus::Success
        } else {
            AuditStatus::Failed
        };

        let record = AuditRecord {
            start_time,
            end_time: AuditRecord::now(),
            numberrow_treatment,
            status,
        };
        if archive_dir.is_dir() {
            let audit_path = archive_dir.join(AuditRecord::file_name(&snapshot.day));
            record.save(&audit_path)?;
            context.record_audit(&snapshot.day, record.clone());
        } else {
            warn!(
                "No archive folder {archive_dir:?}; audit for '{}' not written",
                snapshot.day
            );
        }

        if !report.is_complete() {
            warn!(
                "Snapshot '{}' archived partially: {} moved, {} failed",
                snapshot.day,
                report.moved.len(),
                report.failed.len()
            );
            return Err(MartError::ArchiveIo {
                archive: report.archive_dir,
                moved: report.moved,
                failed: report.failed,
            });
        }

        for (kind, table) in tables {
            context.append(kind, table);
        }
        info!(
            "Snapshot '{}': {} row(s) ingested, {} item(s) archived to {:?}",
            snapshot.day,
            numberrow_treatment,
            report.moved.len(),
            archive_dir
        );
        Ok(record)
    }
}

/// Moves every entry of `source`, files and folders alike, into
/// `archive_dir`, creating it if needed. Failures are collected in the
/// report: a folder that cannot be created or listed is recorded under its
/// own path and stops the move.
pub fn archive_files(source: &Path, archive_dir: &Path) -> ArchiveReport {
    let mut report = ArchiveReport {
        archive_dir: archive_dir.to_path_buf(),
        ..ArchiveReport::default()
    };
    if let Err(err) = fs::create_dir_all(archive_dir) {
        warn!("Could not create archive folder {archive_dir:?}: {err}");
        report
            .failed
            .push((archive_dir.display().to_string(), err.to_string()));
        return report;
    }
    let listing =
        fs::read_dir(source).and_then(|entries| entries.collect::<std::io::Result<Vec<_>>>());
    let entries = match listing {
        Ok(entries) => entries,
        Err(err) => {
            warn!("Could not list snapshot folder {source:?}: {err}");
            report.failed.push((source.display().to_string(), err.to_string()));
            return report;
        }
    };

    for entry in entries.into_iter().sorted_by_key(|entry| entry.file_name()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        let destination = archive_dir.join(&name);
        match fs::rename(entry.path(), &destination) {
            Ok(()) => {
                debug!("Moved {name:?} to {destination:?}");
                report.moved.push(name);
            }
            Err(err) => {
                warn!("Could not move {name:?} into {archive_dir:?}: {err}");
                report.failed.push((name, err.to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_files_moves_files_and_folders() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("day1_files");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("nested").join("c.csv"), "z\n").unwrap();
        fs::write(source.join("a.csv"), "x\n").unwrap();
        fs::write(source.join("b.txt"), "y\n").unwrap();
        let archive = dir.path().join("day1_archive");

        let report = archive_files(&source, &archive);
        assert!(report.is_complete());
        assert_eq!(report.moved, vec!["a.csv", "b.txt", "nested"]);
        assert!(archive.join("a.csv").is_file());
        assert!(archive.join("nested").join("c.csv").is_file());
        assert_eq!(fs::read_dir(&source).unwrap().count(), 0);
    }

    #[test]
    fn archive_files_records_unlistable_source() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent");
        let report = archive_files(&absent, &dir.path().join("out"));
        assert!(!report.is_complete());
        assert!(report.moved.is_empty());
        assert_eq!(report.failed[0].0, absent.display().to_string());
    }

    #[test]
    fn archive_files_records_uncreatable_archive_folder() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("day1_files");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.csv"), "x\n").unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();

        let report = archive_files(&source, &blocker.join("day1_archive"));
        assert_eq!(report.failed.len(), 1);
        assert!(source.join("a.csv").is_file());
    }
}
