use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use thiserror::Error;

/// One per-timestamp input file that contributed rows to a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub timestamp: NaiveDateTime,
    pub rows: usize,
}

impl SourceFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Raw observations from every file in a directory, concatenated in
/// timestamp order.
///
/// Columns: `timestamp` (datetime, µs), `source_file`, `wind`, `main`.
#[derive(Debug, Clone)]
pub struct ObservationBatch {
    pub df: DataFrame,
    pub files: Vec<SourceFile>,
    pub skipped: Vec<PathBuf>,
}

impl ObservationBatch {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }
}

/// Why a single row's feature came out null.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldIssueKind {
    #[error("value does not match MapRecord[{{...}}]: {value:?}")]
    UnrecognizedFieldFormat { value: Option<String> },

    #[error("no value for key '{key}' (needed by '{column}')")]
    MissingKey {
        column: &'static str,
        key: &'static str,
    },

    #[error("'{column}' value {value:?} is not numeric: {reason}")]
    NumericCoercion {
        column: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub row: usize,
    pub source_file: Option<String>,
    pub field: &'static str,
    pub kind: FieldIssueKind,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} ", self.row)?;
        if let Some(file) = &self.source_file {
            write!(f, "({file}) ")?;
        }
        write!(f, "field '{}': {}", self.field, self.kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    pub parser: &'static str,
    pub issues: Vec<FieldIssue>,
}

impl ExtractionReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues_for_row(&self, row: usize) -> impl Iterator<Item = &FieldIssue> {
        self.issues.iter().filter(move |issue| issue.row == row)
    }
}

/// Output of the field extractor: exactly
/// `timestamp, wind_speed, temp, pressure, humidity`, in raw source units.
#[derive(Debug, Clone)]
pub struct ExtractedFeatures {
    pub df: DataFrame,
    pub report: ExtractionReport,
}
