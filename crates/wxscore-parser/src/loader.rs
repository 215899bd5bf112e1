use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ParserError;
use crate::fields::schema::{MAIN_LAYOUT, SOURCE_FILE_COLUMN, TIMESTAMP_COLUMN, WIND_LAYOUT};
use crate::model::{ObservationBatch, SourceFile};

const FILENAME_FORMAT: &str = "%Y%m%d%H%M%S";

/// What to do with a tabular file whose name is not a timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenamePolicy {
    #[default]
    Fail,
    Skip,
}

fn delimiter_for(path: &Path) -> Option<u8> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Some(b','),
        "tsv" => Some(b'\t'),
        _ => None,
    }
}

/// Parses the part of the file name before the first `.` as
/// `YYYYMMDDHHMMSS`.
pub fn parse_filename_timestamp(path: &Path) -> Result<NaiveDateTime, ParserError> {
    let malformed = |reason: String| ParserError::MalformedFilename {
        path: path.to_path_buf(),
        reason,
    };

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| malformed("file name is not valid UTF-8".to_string()))?;
    let stem = name.split('.').next().unwrap_or_default();

    if stem.len() != 14 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("expected 14 digits, found '{stem}'")));
    }

    NaiveDateTime::parse_from_str(stem, FILENAME_FORMAT).map_err(|err| malformed(err.to_string()))
}

struct PendingFile {
    path: PathBuf,
    timestamp: NaiveDateTime,
    delimiter: u8,
}

struct RawColumns {
    timestamp: Vec<i64>,
    source_file: Vec<String>,
    wind: Vec<Option<String>>,
    main: Vec<Option<String>>,
}

impl RawColumns {
    fn new() -> Self {
        Self {
            timestamp: Vec::new(),
            source_file: Vec::new(),
            wind: Vec::new(),
            main: Vec::new(),
        }
    }

    fn into_dataframe(self) -> Result<DataFrame, PolarsError> {
        let ts = Series::new(TIMESTAMP_COLUMN.into(), self.timestamp)
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?;
        DataFrame::new(vec![
            ts.into(),
            Series::new(SOURCE_FILE_COLUMN.into(), self.source_file).into(),
            Series::new(WIND_LAYOUT.source_column.into(), self.wind).into(),
            Series::new(MAIN_LAYOUT.source_column.into(), self.main).into(),
        ])
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.to_string())
}

fn read_file(file: &PendingFile, columns: &mut RawColumns) -> Result<usize, ParserError> {
    let csv_err = |source: csv::Error| ParserError::Csv {
        path: file.path.clone(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(file.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(&file.path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let index_of = |column: &'static str| {
        headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| ParserError::MissingColumn {
                path: file.path.clone(),
                column,
            })
    };
    let wind_idx = index_of(WIND_LAYOUT.source_column)?;
    let main_idx = index_of(MAIN_LAYOUT.source_column)?;

    let micros = file.timestamp.and_utc().timestamp_micros();
    let file_name = file
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut rows = 0;
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        columns.timestamp.push(micros);
        columns.source_file.push(file_name.clone());
        columns.wind.push(non_empty(record.get(wind_idx)));
        columns.main.push(non_empty(record.get(main_idx)));
        rows += 1;
    }

    Ok(rows)
}

/// Reads every `.csv`/`.tsv` file in `dir` into one batch.
///
/// Files are concatenated in order of their file-name timestamp (ties by
/// file name); rows keep their order within a file. Files with other
/// extensions are ignored. An empty directory yields an empty batch.
pub fn load_observations(
    dir: &Path,
    policy: FilenamePolicy,
) -> Result<ObservationBatch, ParserError> {
    let io_err = |source: std::io::Error| ParserError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut pending = Vec::new();
    let mut skipped = Vec::new();

    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() {
            continue;
        }
        let Some(delimiter) = delimiter_for(&path) else {
            debug!(path = %path.display(), "Ignoring non-tabular file");
            continue;
        };

        match parse_filename_timestamp(&path) {
            Ok(timestamp) => pending.push(PendingFile {
                path,
                timestamp,
                delimiter,
            }),
            Err(err) if policy == FilenamePolicy::Skip => {
                warn!(path = %path.display(), error = %err, "Skipping file with malformed name");
                skipped.push(path);
            }
            Err(err) => return Err(err),
        }
    }

    pending.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    });
    skipped.sort();

    let mut columns = RawColumns::new();
    let mut files = Vec::with_capacity(pending.len());
    for file in &pending {
        let rows = read_file(file, &mut columns)?;
        debug!(path = %file.path.display(), rows, "Read observation file");
        files.push(SourceFile {
            path: file.path.clone(),
            timestamp: file.timestamp,
            rows,
        });
    }

    let df = columns.into_dataframe()?;
    info!(
        dir = %dir.display(),
        files = files.len(),
        skipped = skipped.len(),
        rows = df.height(),
        "Loaded observation batch"
    );

    Ok(ObservationBatch { df, files, skipped })
}
