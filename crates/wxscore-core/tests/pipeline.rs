use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use tempfile::TempDir;
use wxscore_core::artifact::ClassLabel;
use wxscore_core::scorer::IncompleteRowPolicy;
use wxscore_core::{run_batch, score_batch, Classifier, PipelineConfig, PipelineError};
use wxscore_parser::{load_observations, FieldParsing, FilenamePolicy, ParserError};

const WIND: &str = "MapRecord[{speed=3.1,deg=180,gust=5.0}]";
const MAIN: &str =
    "MapRecord[{temp=280.15,feels_like=279,temp_min=278,temp_max=282,pressure=1012,humidity=55}]";

const HEADER: &str =
    "timestamp,wind_speed,temp,pressure,humidity,predicted_class,pred_proba_0,pred_proba_1";

fn artifact_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/logistic_regression_model.json")
}

struct Workspace {
    input: TempDir,
    models: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let models = tempfile::tempdir().expect("model dir");
        fs::copy(
            artifact_fixture(),
            models.path().join("logistic_regression_model.json"),
        )
        .expect("copy artifact");
        Self {
            input: tempfile::tempdir().expect("input dir"),
            models,
        }
    }

    fn write_observations(&self, file_name: &str, rows: &[(&str, &str)]) {
        let mut writer =
            csv::Writer::from_path(self.input.path().join(file_name)).expect("create csv");
        writer
            .write_record(["coord", "main", "wind", "name"])
            .unwrap();
        for (wind, main) in rows {
            writer
                .write_record(["MapRecord[{lon=-87.65,lat=41.85}]", *main, *wind, "Chicago"])
                .unwrap();
        }
        writer.flush().unwrap();
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::new(self.input.path(), self.models.path())
    }

    fn output(&self) -> String {
        fs::read_to_string(self.config().output_path()).expect("read output")
    }
}

fn output_records(text: &str) -> Vec<csv::StringRecord> {
    csv::Reader::from_reader(text.as_bytes())
        .records()
        .collect::<std::result::Result<_, _>>()
        .expect("parse output")
}

#[test]
fn scores_single_observation_end_to_end() -> Result<()> {
    let ws = Workspace::new();
    ws.write_observations("20240101120000.csv", &[(WIND, MAIN)]);

    let summary = run_batch(&ws.config())?;
    assert_eq!(summary.files_read, 1);
    assert_eq!(summary.rows, 1);
    assert_eq!(summary.extraction_issues, 0);
    assert_eq!(summary.unscored_rows, 0);
    assert_eq!(summary.output_path, ws.models.path().join("weather_predictions.csv"));

    let text = ws.output();
    assert_eq!(text.lines().next(), Some(HEADER));

    let records = output_records(&text);
    assert_eq!(records.len(), 1);
    let row = &records[0];
    assert_eq!(&row[0], "2024-01-01 12:00:00");
    assert_eq!(row[1].parse::<f64>()?, 6.93);
    assert!((row[2].parse::<f64>()? - 44.6).abs() < 1e-9);
    assert_eq!(&row[3], "1012");
    assert_eq!(&row[4], "55");

    let p0: f64 = row[6].parse()?;
    let p1: f64 = row[7].parse()?;
    assert!((p0 + p1 - 1.0).abs() < 1e-9);
    let expected_class = if p1 > p0 { "1" } else { "0" };
    assert_eq!(&row[5], expected_class);

    let predicted: usize = summary.class_counts.iter().map(|(_, count)| count).sum();
    assert_eq!(predicted, 1);
    Ok(())
}

#[test]
fn rerunning_produces_identical_output() -> Result<()> {
    let ws = Workspace::new();
    ws.write_observations("20240101130000.csv", &[(WIND, MAIN), (WIND, MAIN)]);
    ws.write_observations("20240101120000.csv", &[(WIND, MAIN)]);

    run_batch(&ws.config())?;
    let first = fs::read(ws.config().output_path())?;
    run_batch(&ws.config())?;
    let second = fs::read(ws.config().output_path())?;

    assert_eq!(first, second);

    let text = String::from_utf8(first)?;
    let timestamps: Vec<String> = output_records(&text)
        .iter()
        .map(|record| record[0].to_string())
        .collect();
    assert_eq!(
        timestamps,
        vec![
            "2024-01-01 12:00:00",
            "2024-01-01 13:00:00",
            "2024-01-01 13:00:00"
        ]
    );
    Ok(())
}

#[test]
fn empty_directory_writes_header_only() -> Result<()> {
    let ws = Workspace::new();

    let summary = run_batch(&ws.config())?;
    assert_eq!(summary.rows, 0);
    assert_eq!(ws.output().trim_end(), HEADER);
    Ok(())
}

#[test]
fn malformed_filename_aborts_the_run() {
    let ws = Workspace::new();
    ws.write_observations("20240101120000.csv", &[(WIND, MAIN)]);
    ws.write_observations("notadate.csv", &[(WIND, MAIN)]);

    let err = run_batch(&ws.config()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ParserError>(),
        Some(ParserError::MalformedFilename { .. })
    ));
    assert!(!ws.config().output_path().exists());
}

#[test]
fn malformed_filename_can_be_skipped() -> Result<()> {
    let ws = Workspace::new();
    ws.write_observations("20240101120000.csv", &[(WIND, MAIN)]);
    ws.write_observations("notadate.csv", &[(WIND, MAIN)]);

    let mut config = ws.config();
    config.filename_policy = FilenamePolicy::Skip;
    let summary = run_batch(&config)?;

    assert_eq!(summary.files_read, 1);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.rows, 1);
    Ok(())
}

#[test]
fn missing_artifact_fails_before_reading_input() {
    let models = tempfile::tempdir().unwrap();
    let config = PipelineConfig::new("/definitely/not/a/dir", models.path());

    let err = run_batch(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ArtifactLoad { .. })
    ));
}

#[test]
fn corrupt_artifact_is_reported() {
    let ws = Workspace::new();
    fs::write(ws.config().model_path(), "{ not json").unwrap();

    let err = run_batch(&ws.config()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ArtifactLoad { .. })
    ));
}

#[test]
fn model_expecting_unknown_column_is_a_schema_mismatch() {
    let ws = Workspace::new();
    ws.write_observations("20240101120000.csv", &[(WIND, MAIN)]);
    let json = fs::read_to_string(artifact_fixture())
        .unwrap()
        .replace("\"humidity\"]", "\"dew_point\"]");
    fs::write(ws.config().model_path(), json).unwrap();

    let err = run_batch(&ws.config()).unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::SchemaMismatch { missing, .. }) => {
            assert_eq!(missing, &vec!["dew_point".to_string()]);
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn malformed_rows_are_kept_with_null_predictions() -> Result<()> {
    let ws = Workspace::new();
    ws.write_observations(
        "20240101120000.csv",
        &[(WIND, MAIN), ("not a map record", MAIN)],
    );

    let summary = run_batch(&ws.config())?;
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.extraction_issues, 1);
    assert_eq!(summary.unscored_rows, 1);

    let records = output_records(&ws.output());
    assert_eq!(&records[1][1], "");
    assert_eq!(&records[1][3], "1012");
    assert_eq!(&records[1][5], "");
    assert_eq!(&records[1][6], "");
    assert!(!records[0][5].is_empty());
    Ok(())
}

#[test]
fn incomplete_rows_fail_when_configured() {
    let ws = Workspace::new();
    ws.write_observations("20240101120000.csv", &[(WIND, MAIN), ("garbage", MAIN)]);

    let mut config = ws.config();
    config.incomplete_rows = IncompleteRowPolicy::Fail;
    let err = run_batch(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Inference(_))
    ));
}

/// Records the feature vectors it is asked to score.
struct Recording {
    classes: Vec<ClassLabel>,
    seen: std::cell::RefCell<Vec<Vec<f64>>>,
}

impl Classifier for Recording {
    fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    fn predict_proba(&self, row: &[f64]) -> wxscore_core::error::Result<Vec<f64>> {
        self.seen.borrow_mut().push(row.to_vec());
        Ok(vec![0.25, 0.75])
    }
}

#[test]
fn classifier_sees_features_in_training_order() -> Result<()> {
    let ws = Workspace::new();
    ws.write_observations("20240101120000.csv", &[(WIND, MAIN)]);
    let batch = load_observations(ws.input.path(), FilenamePolicy::Fail)?;

    let classifier = Recording {
        classes: vec![ClassLabel::Text("low".into()), ClassLabel::Text("high".into())],
        seen: Default::default(),
    };
    let training_columns: Vec<String> = ["humidity", "pressure", "wind_speed"]
        .iter()
        .map(|name| name.to_string())
        .collect();

    let scored = score_batch(
        &batch,
        &training_columns,
        &classifier,
        FieldParsing::Positional,
        IncompleteRowPolicy::Skip,
    )?;

    assert_eq!(classifier.seen.borrow().as_slice(), &[vec![55.0, 1012.0, 6.93]]);
    assert_eq!(
        scored.df.get_column_names_str(),
        vec![
            "timestamp",
            "wind_speed",
            "temp",
            "pressure",
            "humidity",
            "predicted_class",
            "pred_proba_low",
            "pred_proba_high"
        ]
    );
    let predicted = scored.df.column("predicted_class")?.str()?.get(0);
    assert_eq!(predicted, Some("high"));
    Ok(())
}
