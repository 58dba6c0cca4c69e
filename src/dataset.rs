//! Indexed tabular dataset.
//!
//! A [`Dataset`] is a Polars [`DataFrame`] plus an optional row index. The
//! index is the uid column after `set_df_index` has promoted it: it travels
//! alongside the frame but is not one of the regular columns, so transforms
//! never see or modify it.

use crate::error::{Result, SteerageError};
use polars::prelude::*;
use std::collections::HashSet;

/// A single record keyed by column name, e.g. one passenger sent for scoring.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Anything a pipeline can be applied to.
#[derive(Debug, Clone)]
pub enum TableInput {
    Table(Dataset),
    Record(Record),
}

impl From<Dataset> for TableInput {
    fn from(dataset: Dataset) -> Self {
        Self::Table(dataset)
    }
}

impl From<DataFrame> for TableInput {
    fn from(frame: DataFrame) -> Self {
        Self::Table(Dataset::new(frame))
    }
}

impl From<Record> for TableInput {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl TableInput {
    /// Normalize to a table; a record becomes a one-row dataset.
    pub fn into_dataset(self) -> Result<Dataset> {
        match self {
            Self::Table(dataset) => Ok(dataset),
            Self::Record(record) => Dataset::from_record(&record),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    index: Option<Series>,
}

impl Dataset {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame, index: None }
    }

    /// Build a one-row dataset from a record. Nulls become `f64` nulls so a
    /// missing numeric field stays imputable.
    pub fn from_record(record: &Record) -> Result<Self> {
        let mut columns = Vec::with_capacity(record.len());
        for (name, value) in record {
            let name = PlSmallStr::from(name.as_str());
            let series = match value {
                serde_json::Value::Null => Series::full_null(name, 1, &DataType::Float64),
                serde_json::Value::Bool(b) => Series::new(name, [*b]),
                serde_json::Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Series::new(name, [i])
                    } else {
                        let f = n.as_f64().ok_or_else(|| {
                            SteerageError::Config(format!("Field '{name}' is not a finite number"))
                        })?;
                        Series::new(name, [f])
                    }
                }
                serde_json::Value::String(s) => Series::new(name, [s.as_str()]),
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    return Err(SteerageError::Config(format!(
                        "Field '{name}' holds a nested value; records must be flat"
                    )));
                }
            };
            columns.push(Column::from(series));
        }
        Ok(Self::new(DataFrame::new(columns)?))
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn index(&self) -> Option<&Series> {
        self.index.as_ref()
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index.as_ref().map(|s| s.name().as_str())
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Number of regular columns (the index is not counted).
    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    /// Look up a regular column, reporting the step that asked for it.
    pub fn column(&self, step: &str, name: &str) -> Result<&Series> {
        self.frame
            .column(name)
            .map(Column::as_materialized_series)
            .map_err(|_| SteerageError::column_not_found(step, name))
    }

    /// Insert or overwrite a column, keeping the position of an existing one.
    pub fn put_column(&mut self, series: Series) -> Result<()> {
        self.frame.with_column(series)?;
        Ok(())
    }

    pub fn drop_column(&mut self, step: &str, name: &str) -> Result<()> {
        if !self.has_column(name) {
            return Err(SteerageError::column_not_found(step, name));
        }
        self.frame = self.frame.drop(name)?;
        Ok(())
    }

    /// Promote `column` to the row index, replacing any previous index.
    pub fn set_index(mut self, step: &str, column: &str) -> Result<Self> {
        let series = self.column(step, column)?.clone();
        ensure_unique(step, &series)?;
        self.frame = self.frame.drop(column)?;
        self.index = Some(series);
        Ok(self)
    }

    /// Move the index back to the first regular column.
    pub fn reset_index(mut self) -> Result<Self> {
        if let Some(index) = self.index.take() {
            self.frame.insert_column(0, index)?;
        }
        Ok(self)
    }

    /// Select rows by position, carrying the index along.
    pub fn take_rows(&self, positions: &IdxCa) -> Result<Self> {
        let frame = self.frame.take(positions)?;
        let index = match &self.index {
            Some(index) => Some(index.take(positions)?),
            None => None,
        };
        Ok(Self { frame, index })
    }

    /// Position of the row whose index renders as `key`.
    pub fn position_of(&self, key: &str) -> Option<usize> {
        let index = self.index.as_ref()?;
        let labels = column_text("position_of", index.name(), index).ok()?;
        labels.iter().position(|v| v.as_deref() == Some(key))
    }
}

fn ensure_unique(step: &str, series: &Series) -> Result<()> {
    let labels = column_text(step, series.name(), series)?;
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        let label = label.unwrap_or_else(|| "null".to_owned());
        if !seen.insert(label.clone()) {
            return Err(SteerageError::DuplicateIndex {
                step: step.to_owned(),
                column: series.name().to_string(),
                value: label,
            });
        }
    }
    Ok(())
}

/// Render a float the way a category label should read: integral values
/// without a fractional part so `3.0` and `3` name the same category.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

/// Every cell of `series` as text; nulls and NaN stay `None`.
pub fn column_text(step: &str, name: &str, series: &Series) -> Result<Vec<Option<String>>> {
    let dtype = series.dtype();
    let values = match dtype {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_owned))
            .collect(),
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect(),
        DataType::Null => vec![None; series.len()],
        DataType::Categorical(..) | DataType::Enum(..) => {
            let cast = series.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(str::to_owned))
                .collect()
        }
        dt if dt.is_integer() => series
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map(|i| i.to_string()))
            .collect(),
        dt if dt.is_float() => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|f| !f.is_nan()).map(format_float))
            .collect(),
        other => {
            return Err(SteerageError::type_mismatch(
                step,
                name,
                "text, numeric or boolean",
                other,
            ));
        }
    };
    Ok(values)
}

/// Every cell of a numeric column as `f64`; nulls and NaN stay `None`.
pub fn column_f64(step: &str, name: &str, series: &Series) -> Result<Vec<Option<f64>>> {
    let dtype = series.dtype();
    if matches!(dtype, DataType::Null) {
        return Ok(vec![None; series.len()]);
    }
    if !dtype.is_primitive_numeric() && !matches!(dtype, DataType::Boolean) {
        return Err(SteerageError::type_mismatch(step, name, "numeric", dtype));
    }
    let values = series
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.filter(|f| !f.is_nan()))
        .collect();
    Ok(values)
}
