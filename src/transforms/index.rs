use super::SET_DF_INDEX;
use crate::dataset::{Dataset, TableInput};
use crate::error::Result;
use tracing::info;

/// Promote `df_index_col` to the row index.
///
/// A bare record is first normalized to a one-row table. Input that is
/// already indexed by `df_index_col` is returned as is; any other index is
/// demoted back to a column before re-indexing.
pub fn set_df_index(input: impl Into<TableInput>, df_index_col: &str) -> Result<Dataset> {
    info!("Running set_df_index()");
    let dataset = input.into().into_dataset()?;
    if dataset.index_name() == Some(df_index_col) {
        return Ok(dataset);
    }
    dataset.reset_index()?.set_index(SET_DF_INDEX, df_index_col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use crate::error::SteerageError;
    use crate::transforms::test_support::dataset;
    use polars::prelude::*;

    fn passengers() -> Dataset {
        dataset(vec![
            Series::new("PassengerId".into(), [1i64, 2, 3]),
            Series::new("Sex".into(), ["male", "female", "female"]),
        ])
    }

    #[test]
    fn test_index_column_leaves_regular_columns() {
        let ds = set_df_index(passengers(), "PassengerId").unwrap();
        assert_eq!(ds.index_name(), Some("PassengerId"));
        assert_eq!(ds.column_names(), vec!["Sex"]);
        assert_eq!(ds.height(), 3);
    }

    #[test]
    fn test_reindex_round_trip_recovers_columns() {
        let original = passengers();
        let indexed = set_df_index(original.clone(), "PassengerId").unwrap();
        let reset = indexed.reset_index().unwrap();
        assert_eq!(reset.column_names(), original.column_names());

        let again = set_df_index(reset, "PassengerId").unwrap();
        assert_eq!(again.column_names(), vec!["Sex"]);
    }

    #[test]
    fn test_already_indexed_input_is_unchanged() {
        let indexed = set_df_index(passengers(), "PassengerId").unwrap();
        let again = set_df_index(indexed, "PassengerId").unwrap();
        assert_eq!(again.index_name(), Some("PassengerId"));
        assert_eq!(again.column_names(), vec!["Sex"]);
    }

    #[test]
    fn test_single_record_is_normalized() {
        let record: Record =
            serde_json::from_str(r#"{"PassengerId": 42, "Sex": "female"}"#).unwrap();
        let ds = set_df_index(record, "PassengerId").unwrap();
        assert_eq!(ds.height(), 1);
        assert_eq!(ds.position_of("42"), Some(0));
    }

    #[test]
    fn test_missing_index_column_is_an_error() {
        let err = set_df_index(passengers(), "uid").unwrap_err();
        assert!(matches!(
            err,
            SteerageError::ColumnNotFound { ref column, .. } if column == "uid"
        ));
    }
}
