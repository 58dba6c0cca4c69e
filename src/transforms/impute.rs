//! Missing-value handling.

use super::{IMPUTE_AGE, IMPUTE_MISSING_VALUES};
use crate::dataset::{Dataset, column_f64, column_text};
use crate::error::{Result, SteerageError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// How `impute_missing_values` picks the fill value for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    Mean,
    Median,
    MostFrequent,
}

impl std::fmt::Display for ImputeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::MostFrequent => "most_frequent",
        };
        write!(f, "{name}")
    }
}

/// Fill missing values of `source_column` from `age_codes`, keyed by the
/// row's value in `title_column`.
///
/// Present values are truncated to integers. A missing value whose code has
/// no entry falls back to `default_age`; without one the step fails with
/// [`SteerageError::MissingFallback`].
pub fn impute_age(
    dataset: &Dataset,
    source_column: &str,
    title_column: &str,
    age_codes: &BTreeMap<String, i64>,
    default_age: Option<i64>,
) -> Result<Dataset> {
    info!("Running impute_age()");
    let ages = column_f64(
        IMPUTE_AGE,
        source_column,
        dataset.column(IMPUTE_AGE, source_column)?,
    )?;
    let codes = column_text(
        IMPUTE_AGE,
        title_column,
        dataset.column(IMPUTE_AGE, title_column)?,
    )?;

    let mut filled = 0usize;
    let imputed = ages
        .into_iter()
        .zip(codes)
        .map(|(age, code)| match age {
            Some(age) => Ok(age.trunc() as i64),
            None => {
                filled += 1;
                let code = code.unwrap_or_default();
                age_codes
                    .get(&code)
                    .copied()
                    .or(default_age)
                    .ok_or_else(|| SteerageError::MissingFallback {
                        step: IMPUTE_AGE.to_owned(),
                        code,
                    })
            }
        })
        .collect::<Result<Vec<i64>>>()?;
    debug!("Imputed {filled} missing values in '{source_column}'");

    let mut out = dataset.clone();
    out.put_column(Series::new(source_column.into(), imputed))?;
    Ok(out)
}

/// Fill every missing cell in the dataset, one column at a time.
///
/// Text columns treat null and the empty string as missing and only support
/// [`ImputeStrategy::MostFrequent`]. Numeric columns treat null and NaN as
/// missing. Columns without gaps are left untouched.
///
/// # Errors
/// A column with gaps but no present value is
/// [`SteerageError::NothingToImpute`].
pub fn impute_missing_values(dataset: &Dataset, strategy: ImputeStrategy) -> Result<Dataset> {
    info!("Running impute_missing_values()");
    let mut out = dataset.clone();
    for name in dataset.column_names() {
        let series = dataset.column(IMPUTE_MISSING_VALUES, &name)?;
        let dtype = series.dtype().clone();
        let replacement = match dtype {
            DataType::String => impute_text(&name, series, strategy)?,
            DataType::Null if series.is_empty() => None,
            DataType::Null => return Err(nothing_to_impute(&name)),
            ref dt if dt.is_primitive_numeric() || dt.is_bool() => impute_numeric(&name, series, strategy)?,
            ref other => {
                if series.null_count() > 0 {
                    return Err(SteerageError::type_mismatch(
                        IMPUTE_MISSING_VALUES,
                        &name,
                        "text, numeric or boolean",
                        other,
                    ));
                }
                None
            }
        };
        if let Some(series) = replacement {
            out.put_column(series)?;
        }
    }
    Ok(out)
}

fn nothing_to_impute(column: &str) -> SteerageError {
    SteerageError::NothingToImpute {
        step: IMPUTE_MISSING_VALUES.to_owned(),
        column: column.to_owned(),
    }
}

fn impute_text(name: &str, series: &Series, strategy: ImputeStrategy) -> Result<Option<Series>> {
    let values = series.str()?;
    let missing = values
        .into_iter()
        .filter(|v| v.is_none_or(str::is_empty))
        .count();
    if missing == 0 {
        return Ok(None);
    }
    if strategy != ImputeStrategy::MostFrequent {
        return Err(SteerageError::type_mismatch(
            IMPUTE_MISSING_VALUES,
            name,
            format!("numeric column for strategy '{strategy}'"),
            series.dtype(),
        ));
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values.into_iter().flatten().filter(|v| !v.is_empty()) {
        *counts.entry(value).or_default() += 1;
    }
    let Some(fill) = most_frequent(counts) else {
        return Err(nothing_to_impute(name));
    };
    debug!("Filling {missing} missing values in '{name}' with '{fill}'");

    let filled: Vec<&str> = values
        .into_iter()
        .map(|v| match v {
            Some(v) if !v.is_empty() => v,
            _ => fill,
        })
        .collect();
    Ok(Some(Series::new(name.into(), filled)))
}

fn impute_numeric(
    name: &str,
    series: &Series,
    strategy: ImputeStrategy,
) -> Result<Option<Series>> {
    let values = column_f64(IMPUTE_MISSING_VALUES, name, series)?;
    let missing = values.iter().filter(|v| v.is_none()).count();
    if missing == 0 {
        return Ok(None);
    }
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return Err(nothing_to_impute(name));
    }
    present.sort_by(f64::total_cmp);

    let fill = match strategy {
        ImputeStrategy::Mean => present.iter().sum::<f64>() / present.len() as f64,
        ImputeStrategy::Median => median(&present),
        ImputeStrategy::MostFrequent => {
            // `present` is sorted, so runs of equal values are adjacent and the
            // first run with the highest count holds the smallest such value.
            let mut runs: Vec<(f64, usize)> = Vec::new();
            for value in &present {
                match runs.last_mut() {
                    Some((last, count)) if last == value => *count += 1,
                    _ => runs.push((*value, 1)),
                }
            }
            runs.into_iter()
                .fold(None, |best: Option<(f64, usize)>, (value, count)| match best {
                    Some((_, c)) if c >= count => best,
                    _ => Some((value, count)),
                })
                .map_or(0.0, |(value, _)| value)
        }
    };
    debug!("Filling {missing} missing values in '{name}' with {fill} ({strategy})");

    let dtype = series.dtype();
    let filled = values.iter().map(|v| v.unwrap_or(fill));
    let series = if strategy == ImputeStrategy::MostFrequent && dtype.is_integer() {
        Series::new(name.into(), filled.map(|v| v as i64).collect::<Vec<_>>())
    } else if strategy == ImputeStrategy::MostFrequent && dtype.is_bool() {
        Series::new(name.into(), filled.map(|v| v != 0.0).collect::<Vec<_>>())
    } else {
        Series::new(name.into(), filled.collect::<Vec<_>>())
    };
    Ok(Some(series))
}

/// Key with the highest count; ties go to the smallest key.
fn most_frequent<K: Ord + Copy>(counts: BTreeMap<K, usize>) -> Option<K> {
    let mut best: Option<(K, usize)> = None;
    for (key, count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}

/// Median of an already sorted, non-empty slice.
fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
