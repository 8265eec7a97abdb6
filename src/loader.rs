use std::{collections::HashSet, path::Path};

use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    config::{EntityKind, PipelineConfig},
    data::parse_cell,
    error::{MartError, Result},
    frame::Table,
    io_utils,
};

/// Reader settings shared by every entity of a run.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        }
    }
}

impl LoadOptions {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            delimiter: config.delimiter,
            encoding: io_utils::resolve_encoding(config.encoding.as_deref())?,
        })
    }
}

/// Loads `{source_dir}/{file_name}` as the table for `kind`.
pub fn load_entity(
    kind: EntityKind,
    source_dir: &Path,
    file_name: &str,
    options: &LoadOptions,
) -> Result<Table> {
    load_csv(kind.as_str(), &source_dir.join(file_name), options)
}

/// Reads a headered CSV file into a table. Empty fields become nulls; rows
/// narrower than the header are padded with nulls and wider rows are cut.
pub fn load_csv(name: &str, path: &Path, options: &LoadOptions) -> Result<Table> {
    if !path.is_file() {
        return Err(MartError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let mut reader = io_utils::open_csv_reader(path, options.delimiter)?;
    let columns = read_header(&mut reader, path, options.encoding)?;
    let mut table = Table::new(name, columns);
    let width = table.column_count();

    let mut reshaped = 0usize;
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| MartError::csv(path, err))?;
        let decoded = io_utils::decode_record(&record, options.encoding).ok_or_else(|| {
            MartError::io(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "row {} is not valid {}",
                        row_idx + 2,
                        options.encoding.name()
                    ),
                ),
            )
        })?;
        if decoded.len() != width {
            reshaped += 1;
        }
        table.push_row(decoded.iter().take(width).map(|raw| parse_cell(raw)).collect());
    }
    if reshaped > 0 {
        debug!("{reshaped} row(s) in {path:?} did not match the header width of {width}");
    }
    debug!(
        "Loaded {} row(s) x {} column(s) from {:?}",
        table.row_count(),
        width,
        path
    );
    Ok(table)
}

fn read_header<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
    path: &Path,
    encoding: &'static Encoding,
) -> Result<Vec<String>> {
    let inference = |reason: String| MartError::SchemaInference {
        path: path.to_path_buf(),
        reason,
    };
    let raw = reader
        .byte_headers()
        .map_err(|err| inference(err.to_string()))?
        .clone();
    if raw.is_empty() {
        return Err(inference("file has no header row".to_string()));
    }
    let headers = io_utils::decode_record(&raw, encoding)
        .ok_or_else(|| inference(format!("header is not valid {}", encoding.name())))?;
    let headers = headers
        .into_iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect::<Vec<_>>();

    let mut seen = HashSet::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(inference(format!("column {} has a blank name", idx + 1)));
        }
        if !seen.insert(name.as_str()) {
            return Err(inference(format!("column '{name}' appears more than once")));
        }
    }
    Ok(headers)
}
