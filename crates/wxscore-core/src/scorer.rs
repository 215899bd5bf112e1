use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::artifact::{most_probable, ClassLabel, Classifier};
use crate::error::{PipelineError, Result};

pub const PREDICTED_CLASS_COLUMN: &str = "predicted_class";

pub fn probability_column(label: &ClassLabel) -> String {
    format!("pred_proba_{label}")
}

/// What to do with rows whose aligned features contain a null.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteRowPolicy {
    /// Leave the prediction and probabilities null for the row.
    #[default]
    Skip,
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    pub classes: Vec<ClassLabel>,
    pub labels: Vec<Option<ClassLabel>>,
    /// `probabilities[class][row]`
    pub probabilities: Vec<Vec<Option<f64>>>,
    pub unscored_rows: Vec<usize>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of rows predicted as each class, in class order.
    pub fn class_counts(&self) -> Vec<(ClassLabel, usize)> {
        self.classes
            .iter()
            .map(|class| {
                let count = self
                    .labels
                    .iter()
                    .filter(|label| label.as_ref() == Some(class))
                    .count();
                (class.clone(), count)
            })
            .collect()
    }

    /// `predicted_class` followed by one `pred_proba_<label>` column per
    /// class.
    pub fn into_columns(self) -> Vec<Column> {
        let labels: Vec<Option<String>> = self
            .labels
            .iter()
            .map(|label| label.as_ref().map(ToString::to_string))
            .collect();

        let mut columns: Vec<Column> = Vec::with_capacity(self.classes.len() + 1);
        columns.push(Series::new(PREDICTED_CLASS_COLUMN.into(), labels).into());
        for (class, values) in self.classes.iter().zip(self.probabilities) {
            columns.push(Series::new(probability_column(class).into(), values).into());
        }
        columns
    }
}

/// Row-major copy of the aligned features. Integer columns are widened to
/// `f64`; anything non-numeric is an inference error.
fn feature_matrix(aligned: &DataFrame) -> Result<Vec<Vec<Option<f64>>>> {
    let height = aligned.height();
    let mut rows: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(aligned.width()); height];

    for column in aligned.get_columns() {
        let numeric = matches!(
            column.dtype(),
            DataType::Float64
                | DataType::Float32
                | DataType::Int64
                | DataType::Int32
                | DataType::UInt64
                | DataType::UInt32
        );
        if !numeric {
            return Err(PipelineError::Inference(format!(
                "feature column '{}' has non-numeric type {}",
                column.name(),
                column.dtype()
            )));
        }
        let values = column.cast(&DataType::Float64)?;
        for (row, value) in rows.iter_mut().zip(values.f64()?.into_iter()) {
            row.push(value);
        }
    }

    Ok(rows)
}

/// Scores every row of an aligned feature frame.
pub fn score(
    aligned: &DataFrame,
    classifier: &dyn Classifier,
    policy: IncompleteRowPolicy,
) -> Result<Predictions> {
    let classes = classifier.classes().to_vec();
    let matrix = feature_matrix(aligned)?;

    let mut labels = Vec::with_capacity(matrix.len());
    let mut probabilities: Vec<Vec<Option<f64>>> =
        vec![Vec::with_capacity(matrix.len()); classes.len()];
    let mut unscored_rows = Vec::new();

    for (idx, row) in matrix.iter().enumerate() {
        let Some(features) = row.iter().copied().collect::<Option<Vec<f64>>>() else {
            if policy == IncompleteRowPolicy::Fail {
                return Err(PipelineError::Inference(format!(
                    "row {idx} has null features {row:?}"
                )));
            }
            unscored_rows.push(idx);
            labels.push(None);
            for column in probabilities.iter_mut() {
                column.push(None);
            }
            continue;
        };

        let proba = classifier
            .predict_proba(&features)
            .map_err(|err| PipelineError::Inference(format!("row {idx}: {err}")))?;
        if proba.len() != classes.len() {
            return Err(PipelineError::Inference(format!(
                "row {idx}: model returned {} probabilities for {} classes",
                proba.len(),
                classes.len()
            )));
        }
        let label = most_probable(&classes, &proba)?;

        labels.push(Some(label));
        for (column, p) in probabilities.iter_mut().zip(proba) {
            column.push(Some(p));
        }
    }

    if !unscored_rows.is_empty() {
        warn!(
            rows = unscored_rows.len(),
            first_row = unscored_rows[0],
            "Rows with null features were left unscored"
        );
    }

    Ok(Predictions {
        classes,
        labels,
        probabilities,
        unscored_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts class "hot" with probability equal to the first feature.
    struct Threshold {
        classes: Vec<ClassLabel>,
    }

    impl Threshold {
        fn new() -> Self {
            Self {
                classes: vec![
                    ClassLabel::Text("cold".into()),
                    ClassLabel::Text("hot".into()),
                ],
            }
        }
    }

    impl Classifier for Threshold {
        fn classes(&self) -> &[ClassLabel] {
            &self.classes
        }

        fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
            Ok(vec![1.0 - row[0], row[0]])
        }
    }

    #[test]
    fn scores_rows_in_class_order() -> Result<()> {
        let aligned = df!("p" => &[0.9f64, 0.2f64], "unused" => &[1i64, 2i64])?;
        let predictions = score(&aligned, &Threshold::new(), IncompleteRowPolicy::Skip)?;

        assert_eq!(
            predictions.labels,
            vec![
                Some(ClassLabel::Text("hot".into())),
                Some(ClassLabel::Text("cold".into()))
            ]
        );
        assert_eq!(predictions.probabilities[1], vec![Some(0.9), Some(0.2)]);
        assert!(predictions.unscored_rows.is_empty());

        let names: Vec<String> = predictions
            .into_columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect();
        assert_eq!(names, vec!["predicted_class", "pred_proba_cold", "pred_proba_hot"]);
        Ok(())
    }

    struct Counting {
        inner: Threshold,
        calls: std::cell::Cell<usize>,
    }

    impl Classifier for Counting {
        fn classes(&self) -> &[ClassLabel] {
            self.inner.classes()
        }

        fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
            self.calls.set(self.calls.get() + 1);
            self.inner.predict_proba(row)
        }
    }

    #[test]
    fn each_row_is_scored_once() -> Result<()> {
        let aligned = df!("p" => &[Some(0.7f64), None, Some(0.5f64)])?;
        let classifier = Counting {
            inner: Threshold::new(),
            calls: Default::default(),
        };
        let predictions = score(&aligned, &classifier, IncompleteRowPolicy::Skip)?;

        assert_eq!(classifier.calls.get(), 2);
        // An exact tie goes to the first class.
        assert_eq!(
            predictions.labels,
            vec![
                Some(ClassLabel::Text("hot".into())),
                None,
                Some(ClassLabel::Text("cold".into()))
            ]
        );
        Ok(())
    }

    #[test]
    fn null_rows_are_skipped_by_default() -> Result<()> {
        let aligned = df!("p" => &[Some(0.9f64), None])?;
        let predictions = score(&aligned, &Threshold::new(), IncompleteRowPolicy::Skip)?;

        assert_eq!(predictions.unscored_rows, vec![1]);
        assert_eq!(predictions.labels[1], None);
        assert_eq!(predictions.probabilities[0][1], None);
        assert_eq!(
            predictions.class_counts(),
            vec![
                (ClassLabel::Text("cold".into()), 0),
                (ClassLabel::Text("hot".into()), 1)
            ]
        );
        Ok(())
    }

    #[test]
    fn null_rows_fail_when_asked() {
        let aligned = df!("p" => &[Some(0.9f64), None]).unwrap();
        let err = score(&aligned, &Threshold::new(), IncompleteRowPolicy::Fail).unwrap_err();
        match err {
            PipelineError::Inference(message) => assert!(message.starts_with("row 1")),
            other => panic!("expected Inference, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_features_are_rejected() {
        let aligned = df!("p" => &["0.9"]).unwrap();
        let err = score(&aligned, &Threshold::new(), IncompleteRowPolicy::Skip).unwrap_err();
        assert!(matches!(err, PipelineError::Inference(_)));
    }

    #[test]
    fn empty_frame_yields_empty_columns() -> Result<()> {
        let aligned = DataFrame::new(vec![
            Series::new("p".into(), Vec::<Option<f64>>::new()).into(),
        ])?;
        let predictions = score(&aligned, &Threshold::new(), IncompleteRowPolicy::Fail)?;
        assert!(predictions.is_empty());

        let columns = predictions.into_columns();
        assert_eq!(columns.len(), 3);
        assert!(columns.iter().all(|column| column.len() == 0));
        Ok(())
    }
}
