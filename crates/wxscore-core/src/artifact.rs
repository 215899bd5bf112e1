use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};

/// A class the model can emit. Integer and boolean labels are kept as
/// exported so column names read `pred_proba_0`, `pred_proba_True`, ...
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Bool(true) => f.write_str("True"),
            ClassLabel::Bool(false) => f.write_str("False"),
            ClassLabel::Integer(value) => write!(f, "{value}"),
            ClassLabel::Text(value) => f.write_str(value),
        }
    }
}

/// Inference surface of a trained model. Rows arrive already aligned to the
/// training columns.
pub trait Classifier {
    fn classes(&self) -> &[ClassLabel];

    /// One probability per entry of [`classes`](Classifier::classes), in
    /// the same order.
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>>;

    /// Highest-probability class; ties go to the earlier class.
    fn predict(&self, row: &[f64]) -> Result<ClassLabel> {
        let proba = self.predict_proba(row)?;
        most_probable(self.classes(), &proba)
    }
}

/// Label of the highest entry in `proba`, which is ordered like `classes`.
pub fn most_probable(classes: &[ClassLabel], proba: &[f64]) -> Result<ClassLabel> {
    let best = argmax(proba)
        .ok_or_else(|| PipelineError::Inference("model returned no probabilities".into()))?;
    classes
        .get(best)
        .cloned()
        .ok_or_else(|| PipelineError::Inference(format!("class index {best} out of range")))
}

pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Linear logistic model in scikit-learn's layout: `coef` has one row for a
/// binary model, or one row per class for a multinomial one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub classes: Vec<ClassLabel>,
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LogisticRegression {
    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.classes.len() < 2 {
            return Err(format!("expected at least 2 classes, found {}", self.classes.len()));
        }
        let unique: HashSet<String> = self.classes.iter().map(ToString::to_string).collect();
        if unique.len() != self.classes.len() {
            return Err(format!("duplicate class labels in {:?}", self.classes));
        }

        let expected_rows = if self.classes.len() == 2 {
            [1, 2]
        } else {
            [self.classes.len(), self.classes.len()]
        };
        if !expected_rows.contains(&self.coef.len()) {
            return Err(format!(
                "coef has {} rows but {} classes were declared",
                self.coef.len(),
                self.classes.len()
            ));
        }
        if self.intercept.len() != self.coef.len() {
            return Err(format!(
                "intercept has {} entries but coef has {} rows",
                self.intercept.len(),
                self.coef.len()
            ));
        }
        for (idx, row) in self.coef.iter().enumerate() {
            if row.len() != n_features {
                return Err(format!(
                    "coef row {idx} has {} weights but the model was trained on {n_features} columns",
                    row.len()
                ));
            }
        }
        if self
            .coef
            .iter()
            .flatten()
            .chain(&self.intercept)
            .any(|value| !value.is_finite())
        {
            return Err("coef/intercept contain non-finite values".to_string());
        }
        Ok(())
    }

    fn decision(&self, row: &[f64]) -> Result<Vec<f64>> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(weights, intercept)| {
                if weights.len() != row.len() {
                    return Err(PipelineError::Inference(format!(
                        "expected {} features, got {}",
                        weights.len(),
                        row.len()
                    )));
                }
                Ok(weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + intercept)
            })
            .collect()
    }
}

impl Classifier for LogisticRegression {
    fn classes(&self) -> &[ClassLabel] {
        &self.classes
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        let scores = self.decision(row)?;
        let proba = if scores.len() == 1 {
            let positive = sigmoid(scores[0]);
            vec![1.0 - positive, positive]
        } else {
            softmax(&scores)
        };

        if proba.iter().any(|p| !p.is_finite()) {
            return Err(PipelineError::Inference(format!(
                "non-finite probabilities {proba:?} for features {row:?}"
            )));
        }
        Ok(proba)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression(LogisticRegression),
}

impl ModelSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelSpec::LogisticRegression(_) => "logistic_regression",
        }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        match self {
            ModelSpec::LogisticRegression(model) => model,
        }
    }
}

/// A trained classifier together with the ordered feature columns it was
/// fitted on. Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    #[serde(rename = "X_train_columns")]
    pub feature_columns: Vec<String>,
    pub model: ModelSpec,
}

impl ClassifierArtifact {
    pub fn from_json_str(content: &str) -> std::result::Result<Self, String> {
        let artifact: ClassifierArtifact =
            serde_json::from_str(content).map_err(|err| err.to_string())?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.feature_columns.is_empty() {
            return Err("X_train_columns is empty".to_string());
        }
        let unique: HashSet<&str> = self.feature_columns.iter().map(String::as_str).collect();
        if unique.len() != self.feature_columns.len() {
            return Err(format!(
                "duplicate entries in X_train_columns {:?}",
                self.feature_columns
            ));
        }
        match &self.model {
            ModelSpec::LogisticRegression(model) => model.validate(self.feature_columns.len()),
        }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.model.classifier()
    }

    pub fn classes(&self) -> &[ClassLabel] {
        self.classifier().classes()
    }
}

/// Reads and validates the artifact at `path`. Every failure is
/// [`PipelineError::ArtifactLoad`].
pub fn load_artifact(path: &Path) -> Result<ClassifierArtifact> {
    let load_error = |reason: String| PipelineError::ArtifactLoad {
        path: path.to_path_buf(),
        reason,
    };

    let content = fs::read_to_string(path).map_err(|err| load_error(err.to_string()))?;
    let artifact = ClassifierArtifact::from_json_str(&content).map_err(load_error)?;

    info!(
        path = %path.display(),
        kind = artifact.model.kind(),
        features = artifact.feature_columns.len(),
        classes = artifact.classes().len(),
        "Loaded classifier artifact"
    );
    Ok(artifact)
}
