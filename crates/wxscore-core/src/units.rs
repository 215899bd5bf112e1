use polars::prelude::*;

use crate::error::{PipelineError, Result};

const KELVIN_OFFSET: f64 = 273.15;
const MPS_TO_MPH: f64 = 2.23694;

pub fn kelvin_to_fahrenheit(kelvin: f64) -> f64 {
    (kelvin - KELVIN_OFFSET) * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_kelvin(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0 + KELVIN_OFFSET
}

/// Rounded to two decimal places.
pub fn convert_meters_per_sec_to_mph(mps: f64) -> f64 {
    round_to(MPS_TO_MPH * mps, 2)
}

pub fn mph_to_meters_per_sec(mph: f64) -> f64 {
    mph / MPS_TO_MPH
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn map_f64_column(df: &mut DataFrame, name: &str, f: impl Fn(f64) -> f64) -> Result<()> {
    let column = df.column(name).map_err(|_| PipelineError::SchemaMismatch {
        missing: vec![name.to_string()],
        available: df
            .get_column_names_str()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })?;
    let converted: Vec<Option<f64>> = column
        .f64()?
        .into_iter()
        .map(|value| value.map(&f))
        .collect();
    df.with_column(Series::new(name.into(), converted))?;
    Ok(())
}

/// Converts `temp` from Kelvin to Fahrenheit and `wind_speed` from m/s to
/// mph. Nulls stay null; other columns are untouched.
pub fn normalize_units(df: &DataFrame) -> Result<DataFrame> {
    let mut output = df.clone();
    map_f64_column(&mut output, "temp", kelvin_to_fahrenheit)?;
    map_f64_column(&mut output, "wind_speed", convert_meters_per_sec_to_mph)?;
    Ok(output)
}
