use super::ONE_HOT_ENCODER;
use crate::dataset::{Dataset, column_text, format_float};
use crate::error::{Result, SteerageError};
use polars::prelude::*;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// A column to one-hot encode and its complete vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotColumn {
    pub col_name: String,

    /// Accepts numbers as well as strings so `[1, 2, 3]` can describe a
    /// class column that was converted to text upstream.
    #[serde(deserialize_with = "category_labels")]
    pub categories: Vec<String>,
}

impl OneHotColumn {
    pub fn new(col_name: impl Into<String>, categories: &[&str]) -> Self {
        Self {
            col_name: col_name.into(),
            categories: categories.iter().map(|c| (*c).to_owned()).collect(),
        }
    }

    /// Names of the indicator columns, in vocabulary order.
    pub fn indicator_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|category| format!("{}_{category}", self.col_name))
            .collect()
    }
}

fn category_labels<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|value| match value {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Bool(b) => Ok(b.to_string()),
            serde_json::Value::Number(n) => Ok(match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => i.to_string(),
                (None, Some(f)) => format_float(f),
                (None, None) => n.to_string(),
            }),
            other => Err(D::Error::custom(format!(
                "category must be a string or number, got {other}"
            ))),
        })
        .collect()
}

/// Replace each described column with `{column}_{category}` indicator
/// columns (`i32`, exactly one `1` per row), then index by `uid`.
///
/// A value outside the vocabulary, including null, fails with
/// [`SteerageError::UnknownCategory`].
pub fn one_hot_encoder(
    dataset: &Dataset,
    uid: &str,
    one_hot_columns: &[OneHotColumn],
) -> Result<Dataset> {
    info!("Running one_hot_encoder()");
    let mut out = dataset.clone().reset_index()?;

    for spec in one_hot_columns {
        let name = spec.col_name.as_str();
        let labels = column_text(ONE_HOT_ENCODER, name, out.column(ONE_HOT_ENCODER, name)?)?;

        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(spec.categories.len());
        for (pos, category) in spec.categories.iter().enumerate() {
            if positions.insert(category.as_str(), pos).is_some() {
                return Err(SteerageError::Config(format!(
                    "Category '{category}' is listed twice for column '{name}'"
                )));
            }
        }

        let mut indicators = vec![vec![0i32; labels.len()]; spec.categories.len()];
        for (row, label) in labels.iter().enumerate() {
            let pos = label
                .as_deref()
                .and_then(|l| positions.get(l))
                .ok_or_else(|| SteerageError::UnknownCategory {
                    step: ONE_HOT_ENCODER.to_owned(),
                    column: name.to_owned(),
                    value: label.clone().unwrap_or_else(|| "null".to_owned()),
                })?;
            if let Some(cell) = indicators.get_mut(*pos).and_then(|col| col.get_mut(row)) {
                *cell = 1;
            }
        }

        out.drop_column(ONE_HOT_ENCODER, name)?;
        for (indicator, values) in spec.indicator_names().into_iter().zip(indicators) {
            if out.has_column(&indicator) {
                return Err(SteerageError::Config(format!(
                    "Indicator column '{indicator}' already exists"
                )));
            }
            out.put_column(Series::new(indicator.into(), values))?;
        }
        debug!(
            "Encoded '{name}' into {} indicator columns",
            spec.categories.len()
        );
    }

    out.set_index(ONE_HOT_ENCODER, uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::set_df_index;
    use crate::transforms::test_support::dataset;

    fn ints(dataset: &Dataset, name: &str) -> Vec<i32> {
        dataset
            .column("test", name)
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    }

    fn frame() -> Dataset {
        let ds = dataset(vec![
            Series::new("id".into(), [1i64, 2, 3, 4, 5]),
            Series::new("col1".into(), ["foo", "foo", "bar", "bar", "bar"]),
            Series::new("col2".into(), ["wibble", "wubble", "wibble", "wubble", "wibble"]),
        ]);
        set_df_index(ds, "id").unwrap()
    }

    fn vocab() -> Vec<OneHotColumn> {
        vec![
            OneHotColumn::new("col1", &["bar", "foo"]),
            OneHotColumn::new("col2", &["wibble", "wubble"]),
        ]
    }

    #[test]
    fn test_one_hot_columns_and_values() {
        let out = one_hot_encoder(&frame(), "id", &vocab()).unwrap();
        assert_eq!(
            out.column_names(),
            vec!["col1_bar", "col1_foo", "col2_wibble", "col2_wubble"]
        );
        assert_eq!(out.index_name(), Some("id"));
        assert_eq!(ints(&out, "col1_foo"), vec![1, 1, 0, 0, 0]);
        assert_eq!(ints(&out, "col1_bar"), vec![0, 0, 1, 1, 1]);
        assert_eq!(ints(&out, "col2_wibble"), vec![1, 0, 1, 0, 1]);
        assert_eq!(ints(&out, "col2_wubble"), vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_each_group_sums_to_one() {
        let out = one_hot_encoder(&frame(), "id", &vocab()).unwrap();
        for spec in vocab() {
            let columns: Vec<Vec<i32>> = spec
                .indicator_names()
                .iter()
                .map(|n| ints(&out, n))
                .collect();
            for row in 0..out.height() {
                let total: i32 = columns.iter().map(|c| c[row]).sum();
                assert_eq!(total, 1, "row {row} of {}", spec.col_name);
            }
        }
    }

    #[test]
    fn test_column_count_invariant() {
        let input = frame();
        let out = one_hot_encoder(&input, "id", &vocab()).unwrap();
        assert_eq!(out.width(), input.width() - 2 + 4);
    }

    #[test]
    fn test_unknown_category_is_an_error() {
        let vocab = vec![OneHotColumn::new("col1", &["foo"])];
        let err = one_hot_encoder(&frame(), "id", &vocab).unwrap_err();
        assert!(matches!(
            err,
            SteerageError::UnknownCategory { ref value, .. } if value == "bar"
        ));
    }

    #[test]
    fn test_numeric_vocabulary_matches_text_and_float_columns() {
        let spec: OneHotColumn =
            serde_json::from_str(r#"{"col_name": "Pclass", "categories": [1, 2, 3]}"#).unwrap();
        assert_eq!(spec.categories, vec!["1", "2", "3"]);

        let ds = dataset(vec![
            Series::new("id".into(), [1i64, 2]),
            Series::new("Pclass".into(), [3.0, 1.0]),
        ]);
        let out = one_hot_encoder(&ds, "id", &[spec]).unwrap();
        assert_eq!(ints(&out, "Pclass_1"), vec![0, 1]);
        assert_eq!(ints(&out, "Pclass_3"), vec![1, 0]);
    }
}
