use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};

pub const DEFAULT_OUTPUT_FILENAME: &str = "weather_predictions.csv";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn staging_path(path: &Path) -> Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        PipelineError::Config(format!("output path {path:?} has no file name"))
    })?;
    let mut staging = file_name.to_os_string();
    staging.push(".partial");
    Ok(path.with_file_name(staging))
}

/// Serializes `df` as CSV with a header row into `writer`.
pub fn write_csv<W: Write>(df: &DataFrame, writer: W) -> Result<()> {
    let mut frame = df.clone();
    CsvWriter::new(writer)
        .include_header(true)
        .with_datetime_format(Some(DATETIME_FORMAT.to_string()))
        .finish(&mut frame)?;
    Ok(())
}

/// Writes the prediction table to `path`, replacing any existing file.
///
/// The table is written to `<name>.partial` next to the destination, synced,
/// and then renamed over it, so readers see either the old file or the
/// complete new one.
pub fn write_predictions(df: &DataFrame, path: &Path) -> Result<()> {
    let staging = staging_path(path)?;

    let result = (|| -> Result<()> {
        let file = File::create(&staging)?;
        let mut writer = BufWriter::new(file);
        write_csv(df, &mut writer)?;
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()?;
        fs::rename(&staging, path)?;
        Ok(())
    })();

    if result.is_err() {
        if let Err(err) = fs::remove_file(&staging) {
            if err.kind() != ErrorKind::NotFound {
                warn!(path = %staging.display(), error = %err, "Failed to remove staging file");
            }
        }
    }
    result?;

    info!(path = %path.display(), rows = df.height(), columns = df.width(), "Wrote predictions");
    Ok(())
}
