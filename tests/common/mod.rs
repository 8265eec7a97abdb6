#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use csv_mart::config::{PipelineConfig, SnapshotSpec};
use tempfile::{TempDir, tempdir};

pub const ENTITY_FILES: [&str; 4] = [
    "items.csv",
    "customers.csv",
    "order_headers.csv",
    "order_lines.csv",
];

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory that cleans up on drop. Ingestion moves its inputs, so
/// every test works on copies of the fixtures.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` to `name` (relative, parents created) and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Copies the fixture folder `name` into the workspace and returns it.
    pub fn copy_fixture_dir(&self, name: &str) -> PathBuf {
        let source = fixture_path(name);
        let target = self.temp_dir.path().join(name);
        fs::create_dir_all(&target).expect("create fixture copy");
        for entry in fs::read_dir(&source).expect("read fixture dir") {
            let entry = entry.expect("fixture entry");
            fs::copy(entry.path(), target.join(entry.file_name())).expect("copy fixture file");
        }
        target
    }

    /// A config for the reference two-day fixtures, archiving inside the
    /// workspace.
    pub fn two_day_config(&self) -> PipelineConfig {
        let day1 = self.copy_fixture_dir("day1_files");
        let day2 = self.copy_fixture_dir("day2_files");
        PipelineConfig {
            snapshots: vec![
                SnapshotSpec {
                    day: "day1".to_string(),
                    source: day1,
                },
                SnapshotSpec {
                    day: "day2".to_string(),
                    source: day2,
                },
            ],
            archive_root: self.path().to_path_buf(),
            ..PipelineConfig::default()
        }
    }
}
