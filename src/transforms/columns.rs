use super::{CONVERT_TO_STR, DROP_COLUMNS};
use crate::dataset::{Dataset, column_text};
use crate::error::Result;
use polars::prelude::*;
use tracing::{debug, info};

/// Render each named column as text. Nulls stay null.
pub fn convert_to_str(dataset: &Dataset, convert_to_str_cols: &[String]) -> Result<Dataset> {
    info!("Running convert_to_str()");
    let mut out = dataset.clone();
    for name in convert_to_str_cols {
        let series = dataset.column(CONVERT_TO_STR, name)?;
        let text = column_text(CONVERT_TO_STR, name, series)?;
        debug!("Converted '{name}' from {} to String", series.dtype());
        out.put_column(Series::new(name.as_str().into(), text))?;
    }
    Ok(out)
}

/// Remove the named columns. Every name must exist.
pub fn drop_columns(dataset: &Dataset, drop_column_names: &[String]) -> Result<Dataset> {
    info!("Running drop_columns()");
    let mut out = dataset.clone();
    for name in drop_column_names {
        out.drop_column(DROP_COLUMNS, name)?;
    }
    Ok(out)
}
