//! Engineered feature columns.

use super::{CREATE_FAMILY_SIZE, CREATE_TITLE_CAT};
use crate::dataset::{Dataset, column_f64};
use crate::error::{Result, SteerageError};
use polars::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A run of letters preceded by a space and terminated by a period, as in
/// `"Tyrell, Ms. Olenna"`.
const TITLE_PATTERN: &str = r" ([A-Za-z]+)\.";

/// Extract the title from `source_column` and map it through `title_codes`
/// into `dest_column`.
///
/// Names without a title (and null names) yield an empty title. Titles with
/// no entry in `title_codes` are written through unchanged.
pub fn create_title_cat(
    dataset: &Dataset,
    source_column: &str,
    dest_column: &str,
    title_codes: &BTreeMap<String, String>,
) -> Result<Dataset> {
    info!("Running create_title_cat()");
    let source = dataset.column(CREATE_TITLE_CAT, source_column)?;
    let names = source.str().map_err(|_| {
        SteerageError::type_mismatch(CREATE_TITLE_CAT, source_column, "String", source.dtype())
    })?;
    let pattern = Regex::new(TITLE_PATTERN)
        .map_err(|e| SteerageError::Other(format!("Invalid title pattern: {e}")))?;

    let mut unmapped = 0usize;
    let categories: Vec<String> = names
        .into_iter()
        .map(|name| {
            let title = name
                .and_then(|n| pattern.captures(n))
                .and_then(|c| c.get(1))
                .map_or("", |m| m.as_str());
            match title_codes.get(title) {
                Some(code) => code.clone(),
                None => {
                    unmapped += 1;
                    title.to_owned()
                }
            }
        })
        .collect();
    if unmapped > 0 {
        debug!("{unmapped} titles had no category code and were kept as extracted");
    }

    let mut out = dataset.clone();
    out.put_column(Series::new(dest_column.into(), categories))?;
    Ok(out)
}

/// `dest_column` = row-wise sum of `source_columns` + 1.
///
/// A null in any source gives a null total. The result is `Int64` when every
/// source is an integer column and `Float64` otherwise.
pub fn create_family_size(
    dataset: &Dataset,
    source_columns: &[String],
    dest_column: &str,
) -> Result<Dataset> {
    info!("Running create_family_size()");
    if source_columns.is_empty() {
        return Err(SteerageError::Config(format!(
            "{CREATE_FAMILY_SIZE} needs at least one source column"
        )));
    }

    let mut totals: Vec<Option<f64>> = vec![Some(1.0); dataset.height()];
    let mut all_integer = true;
    for name in source_columns {
        let series = dataset.column(CREATE_FAMILY_SIZE, name)?;
        all_integer &= series.dtype().is_integer();
        let values = column_f64(CREATE_FAMILY_SIZE, name, series)?;
        for (total, value) in totals.iter_mut().zip(values) {
            *total = total.zip(value).map(|(t, v)| t + v);
        }
    }

    let column = if all_integer {
        let ints: Vec<Option<i64>> = totals.iter().map(|t| t.map(|v| v as i64)).collect();
        Series::new(dest_column.into(), ints)
    } else {
        Series::new(dest_column.into(), totals)
    };
    let mut out = dataset.clone();
    out.put_column(column)?;
    Ok(out)
}
