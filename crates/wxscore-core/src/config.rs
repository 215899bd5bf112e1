use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use wxscore_parser::{FieldParsing, FilenamePolicy};

use crate::error::{PipelineError, Result};
use crate::outputs::DEFAULT_OUTPUT_FILENAME;
use crate::scorer::IncompleteRowPolicy;

pub const DEFAULT_MODEL_FILENAME: &str = "logistic_regression_model.json";

/// Environment variables read by [`PipelineConfig::apply_env`].
pub const ENV_INPUT_FOLDER: &str = "WXSCORE_INPUT_FOLDER";
pub const ENV_MODEL_FOLDER: &str = "WXSCORE_MODEL_FOLDER";
pub const ENV_MODEL_FILENAME: &str = "WXSCORE_MODEL_FILENAME";
pub const ENV_OUTPUT_FILENAME: &str = "WXSCORE_OUTPUT_FILENAME";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory of `<YYYYMMDDHHMMSS>.csv` observation files.
    pub input_folder: PathBuf,
    /// Holds the classifier artifact; predictions are written here too.
    pub model_folder: PathBuf,
    pub model_filename: String,
    pub output_filename: String,
    pub filename_policy: FilenamePolicy,
    pub field_parsing: FieldParsing,
    pub incomplete_rows: IncompleteRowPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::new(),
            model_folder: PathBuf::from("."),
            model_filename: DEFAULT_MODEL_FILENAME.to_string(),
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
            filename_policy: FilenamePolicy::default(),
            field_parsing: FieldParsing::default(),
            incomplete_rows: IncompleteRowPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new(input_folder: impl Into<PathBuf>, model_folder: impl Into<PathBuf>) -> Self {
        Self {
            input_folder: input_folder.into(),
            model_folder: model_folder.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| PipelineError::Config(err.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|err| PipelineError::Config(format!("failed to read {path:?}: {err}")))?;
        toml::from_str(&content).map_err(|err| PipelineError::Config(format!("{path:?}: {err}")))
    }

    /// Overrides path settings from `WXSCORE_*` variables, as returned by
    /// `lookup`. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(value) = get(ENV_INPUT_FOLDER) {
            self.input_folder = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_MODEL_FOLDER) {
            self.model_folder = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_MODEL_FILENAME) {
            self.model_filename = value;
        }
        if let Some(value) = get(ENV_OUTPUT_FILENAME) {
            self.output_filename = value;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_folder.as_os_str().is_empty() {
            return Err(PipelineError::Config("input_folder is not set".to_string()));
        }
        for (key, value) in [
            ("model_filename", &self.model_filename),
            ("output_filename", &self.output_filename),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!("{key} is empty")));
            }
            if Path::new(value).components().count() != 1 {
                return Err(PipelineError::Config(format!(
                    "{key} must be a bare file name, got '{value}'"
                )));
            }
        }
        Ok(())
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_folder.join(&self.model_filename)
    }

    pub fn output_path(&self) -> PathBuf {
        self.model_folder.join(&self.output_filename)
    }
}
