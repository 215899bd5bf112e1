// crates/wxscore-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;
use wxscore_parser::ParserError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Feature columns {missing:?} required by the model are absent (available: {available:?})")]
    SchemaMismatch {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("Failed to load classifier artifact {path:?}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("Inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
