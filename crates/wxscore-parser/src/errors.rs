use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Fatal problems raised while loading or extracting an observation batch.
///
/// Row-level problems inside the `wind`/`main` fields are not errors; they are
/// collected as [`FieldIssue`](crate::model::FieldIssue)s and null-propagated.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("file name {path:?} is not a YYYYMMDDHHMMSS timestamp: {reason}")]
    MalformedFilename { path: PathBuf, reason: String },

    #[error("{path:?} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}
