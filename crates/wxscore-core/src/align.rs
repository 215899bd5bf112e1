use polars::prelude::DataFrame;

use crate::error::{PipelineError, Result};

/// Selects `columns` from `df` by name, in exactly the given order.
///
/// Every missing column is reported at once rather than stopping at the
/// first.
pub fn align_features(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let available = df.get_column_names_str();
    let missing: Vec<String> = columns
        .iter()
        .filter(|name| !available.contains(&name.as_str()))
        .cloned()
        .collect();

    if !missing.is_empty() {
        return Err(PipelineError::SchemaMismatch {
            missing,
            available: available.into_iter().map(str::to_string).collect(),
        });
    }

    Ok(df.select(columns.iter().map(String::as_str))?)
}
