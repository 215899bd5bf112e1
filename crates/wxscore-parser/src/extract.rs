use polars::prelude::*;

use crate::errors::ParserError;
use crate::fields::schema::{
    FeatureSpec, FieldLayout, NumericKind, FEATURES, MAIN_LAYOUT, SOURCE_FILE_COLUMN,
    TIMESTAMP_COLUMN, WIND_LAYOUT,
};
use crate::fields::{capture_inner, FieldParsing, MapRecordParser};
use crate::model::{ExtractedFeatures, ExtractionReport, FieldIssue, FieldIssueKind, ObservationBatch};

enum FeatureValues {
    Float(Vec<Option<f64>>),
    Integer(Vec<Option<i64>>),
}

impl FeatureValues {
    fn with_capacity(kind: NumericKind, capacity: usize) -> Self {
        match kind {
            NumericKind::Float => FeatureValues::Float(Vec::with_capacity(capacity)),
            NumericKind::Integer => FeatureValues::Integer(Vec::with_capacity(capacity)),
        }
    }

    fn push_null(&mut self) {
        match self {
            FeatureValues::Float(values) => values.push(None),
            FeatureValues::Integer(values) => values.push(None),
        }
    }

    fn into_column(self, name: &str) -> Column {
        match self {
            FeatureValues::Float(values) => Series::new(name.into(), values).into(),
            FeatureValues::Integer(values) => Series::new(name.into(), values).into(),
        }
    }
}

/// Coerces one stripped sub-field, pushing the value or a null.
fn coerce(
    spec: &FeatureSpec,
    raw: &str,
    values: &mut FeatureValues,
) -> Result<(), FieldIssueKind> {
    let failure = |reason: String| FieldIssueKind::NumericCoercion {
        column: spec.column,
        value: raw.to_string(),
        reason,
    };

    match values {
        FeatureValues::Float(values) => match raw.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => values.push(Some(parsed)),
            Ok(parsed) => {
                values.push(None);
                return Err(failure(format!("non-finite value {parsed}")));
            }
            Err(err) => {
                values.push(None);
                return Err(failure(err.to_string()));
            }
        },
        FeatureValues::Integer(values) => match raw.parse::<i64>() {
            Ok(parsed) => values.push(Some(parsed)),
            Err(err) => {
                values.push(None);
                return Err(failure(err.to_string()));
            }
        },
    }
    Ok(())
}

/// Parses `wind` and `main` into `wind_speed, temp, pressure, humidity`.
///
/// Row-level failures never abort the batch: the affected cells are null and
/// the cause is recorded in the returned report.
pub fn extract_features(
    batch: &ObservationBatch,
    parsing: FieldParsing,
) -> Result<ExtractedFeatures, ParserError> {
    let parser = parsing.parser();
    let df = &batch.df;
    let height = df.height();

    let source_files = df.column(SOURCE_FILE_COLUMN)?.str()?;
    let mut report = ExtractionReport {
        parser: parser.name(),
        issues: Vec::new(),
    };

    let mut outputs: Vec<FeatureValues> = FEATURES
        .iter()
        .map(|spec| FeatureValues::with_capacity(spec.kind, height))
        .collect();

    for layout in [&WIND_LAYOUT, &MAIN_LAYOUT] {
        let raw_values = df.column(layout.source_column)?.str()?;
        let targets: Vec<usize> = FEATURES
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.layout == layout)
            .map(|(idx, _)| idx)
            .collect();

        for (row, raw) in raw_values.into_iter().enumerate() {
            let mut record_issue = |kind: FieldIssueKind| {
                report.issues.push(FieldIssue {
                    row,
                    source_file: source_files.get(row).map(str::to_string),
                    field: layout.source_column,
                    kind,
                });
            };

            let Some(inner) = raw.and_then(capture_inner) else {
                for &idx in &targets {
                    outputs[idx].push_null();
                }
                record_issue(FieldIssueKind::UnrecognizedFieldFormat {
                    value: raw.map(str::to_string),
                });
                continue;
            };

            let slots = parser.split(inner, layout);
            for &idx in &targets {
                let spec = &FEATURES[idx];
                match slot_for(&slots, layout, spec.key) {
                    Some(value) => {
                        if let Err(kind) = coerce(spec, value, &mut outputs[idx]) {
                            record_issue(kind);
                        }
                    }
                    None => {
                        outputs[idx].push_null();
                        record_issue(FieldIssueKind::MissingKey {
                            column: spec.column,
                            key: spec.key,
                        });
                    }
                }
            }
        }
    }

    let mut columns: Vec<Column> = Vec::with_capacity(FEATURES.len() + 1);
    columns.push(df.column(TIMESTAMP_COLUMN)?.clone());
    for (spec, values) in FEATURES.iter().zip(outputs) {
        columns.push(values.into_column(spec.column));
    }

    report.issues.sort_by_key(|issue| issue.row);

    Ok(ExtractedFeatures {
        df: DataFrame::new(columns)?,
        report,
    })
}

fn slot_for<'a>(slots: &[Option<&'a str>], layout: &FieldLayout, key: &str) -> Option<&'a str> {
    layout
        .position(key)
        .and_then(|idx| slots.get(idx).copied().flatten())
}
