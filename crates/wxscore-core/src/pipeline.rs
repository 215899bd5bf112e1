use std::path::PathBuf;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use tracing::{info, warn};
use wxscore_parser::{
    extract_features, load_observations, ExtractionReport, FieldParsing, ObservationBatch,
};

use crate::align::align_features;
use crate::artifact::{load_artifact, ClassLabel, Classifier};
use crate::config::PipelineConfig;
use crate::outputs::write_predictions;
use crate::scorer::{score, IncompleteRowPolicy};
use crate::units::normalize_units;

/// Extraction diagnostics beyond this many are summarized rather than logged
/// one by one.
const MAX_LOGGED_ISSUES: usize = 20;

#[derive(Debug, Clone)]
pub struct ScoredBatch {
    /// `timestamp, wind_speed, temp, pressure, humidity, predicted_class,
    /// pred_proba_<label>...`
    pub df: DataFrame,
    pub extraction: ExtractionReport,
    pub unscored_rows: Vec<usize>,
    pub class_counts: Vec<(ClassLabel, usize)>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub files_read: usize,
    pub files_skipped: usize,
    pub rows: usize,
    pub extraction_issues: usize,
    pub unscored_rows: usize,
    pub class_counts: Vec<(ClassLabel, usize)>,
    pub output_path: PathBuf,
}

fn log_extraction_issues(report: &ExtractionReport) {
    for issue in report.issues.iter().take(MAX_LOGGED_ISSUES) {
        warn!(parser = report.parser, "{issue}");
    }
    if report.issues.len() > MAX_LOGGED_ISSUES {
        warn!(
            parser = report.parser,
            total = report.issues.len(),
            "Further extraction issues omitted"
        );
    }
}

/// Extract → normalize → align → score, with no I/O. The returned frame
/// keeps the feature row columns in their canonical order regardless of the
/// order the model was trained with.
pub fn score_batch(
    batch: &ObservationBatch,
    feature_columns: &[String],
    classifier: &dyn Classifier,
    parsing: FieldParsing,
    incomplete_rows: IncompleteRowPolicy,
) -> Result<ScoredBatch> {
    let extracted = extract_features(batch, parsing).context("failed to extract features")?;
    log_extraction_issues(&extracted.report);

    let normalized = normalize_units(&extracted.df)?;
    let aligned = align_features(&normalized, feature_columns)?;
    let predictions = score(&aligned, classifier, incomplete_rows)?;

    let unscored_rows = predictions.unscored_rows.clone();
    let class_counts = predictions.class_counts();

    let mut df = normalized;
    df.hstack_mut(&predictions.into_columns())?;

    Ok(ScoredBatch {
        df,
        extraction: extracted.report,
        unscored_rows,
        class_counts,
    })
}

/// Runs one batch end to end: artifact, input directory, scoring, output.
///
/// The artifact is loaded before any input is read so a missing or corrupt
/// model fails the run immediately.
pub fn run_batch(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;

    let model_path = config.model_path();
    let artifact = load_artifact(&model_path)?;

    let batch = load_observations(&config.input_folder, config.filename_policy)
        .with_context(|| format!("failed to load observations from {:?}", config.input_folder))?;

    let scored = score_batch(
        &batch,
        &artifact.feature_columns,
        artifact.classifier(),
        config.field_parsing,
        config.incomplete_rows,
    )?;

    let output_path = config.output_path();
    write_predictions(&scored.df, &output_path)
        .with_context(|| format!("failed to write predictions to {output_path:?}"))?;

    let summary = RunSummary {
        files_read: batch.files.len(),
        files_skipped: batch.skipped.len(),
        rows: scored.df.height(),
        extraction_issues: scored.extraction.issues.len(),
        unscored_rows: scored.unscored_rows.len(),
        class_counts: scored.class_counts,
        output_path,
    };

    info!(
        files = summary.files_read,
        rows = summary.rows,
        extraction_issues = summary.extraction_issues,
        unscored_rows = summary.unscored_rows,
        "Batch scored"
    );
    Ok(summary)
}
