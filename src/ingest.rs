//! Raw data ingest and the train/test split.

use crate::dataset::Dataset;
use crate::error::{Result, SteerageError};
use polars::prelude::*;
use rand::SeedableRng as _;
use rand::seq::SliceRandom as _;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

const INGEST_SPLIT: &str = "ingest_split";

/// Fractions of the train/test source assigned to each side, and the seed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IngestSplitParameters {
    pub train_size: f64,
    pub test_size: f64,
    pub random_state: u64,
}

/// Output of [`ingest_split`]. `y_*` hold only the target column and line
/// up row for row with the matching `x_*`.
#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: Dataset,
    pub x_test: Dataset,
    pub y_train: Dataset,
    pub y_test: Dataset,
    pub x_holdout: Dataset,
}

/// Read a CSV file with a header row.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(SteerageError::InvalidPath(format!(
            "File not found: {}",
            path.display()
        )));
    }
    let df = LazyCsvReader::new(path)
        .with_infer_schema_length(Some(10000))
        .with_has_header(true)
        .finish()?
        .collect()?;
    debug!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Cast every integer column except those in `keep` to `Float64`, so a
/// column that is integral in one file and has gaps in another ends up with
/// the same dtype in both.
pub fn ints_to_floats(mut df: DataFrame, keep: &[&str]) -> Result<DataFrame> {
    let targets: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype().is_integer() && !keep.contains(&c.name().as_str()))
        .map(|c| c.name().to_string())
        .collect();
    for name in targets {
        let cast = df
            .column(&name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        df.with_column(cast)?;
    }
    Ok(df)
}

/// Positions of the train and test rows for a source of `n_rows`.
///
/// The test side takes `ceil(test_size * n)` rows and the train side
/// `floor(train_size * n)`, both drawn from one shuffle seeded into
/// [`ChaCha8Rng`], whose stream is fixed across platforms and releases.
pub fn split_positions(
    n_rows: usize,
    params: &IngestSplitParameters,
) -> Result<(Vec<IdxSize>, Vec<IdxSize>)> {
    let IngestSplitParameters {
        train_size,
        test_size,
        random_state,
    } = *params;
    let in_range = |f: f64| f > 0.0 && f <= 1.0;
    if !in_range(train_size) || !in_range(test_size) {
        return Err(SteerageError::InvalidSplit(format!(
            "train_size ({train_size}) and test_size ({test_size}) must be in (0, 1]"
        )));
    }
    if train_size + test_size > 1.0 + 1e-9 {
        return Err(SteerageError::InvalidSplit(format!(
            "train_size + test_size = {} exceeds 1",
            train_size + test_size
        )));
    }

    let n = n_rows as f64;
    let n_test = (test_size * n).ceil() as usize;
    let n_train = (train_size * n).floor() as usize;
    if n_test == 0 || n_train == 0 {
        return Err(SteerageError::InvalidSplit(format!(
            "{n_rows} rows give {n_train} train and {n_test} test rows; both must be non-empty"
        )));
    }
    if n_train + n_test > n_rows {
        return Err(SteerageError::InvalidSplit(format!(
            "{n_train} train + {n_test} test rows exceed the {n_rows} available"
        )));
    }

    let mut order: Vec<IdxSize> = (0..n_rows).map(|i| i as IdxSize).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(random_state));
    let train = order.split_off(n_test);
    order.truncate(n_test);
    let train = train.into_iter().take(n_train).collect();
    Ok((train, order))
}

/// Load both sources, normalize integer columns to floats and split the
/// train/test source into features and target.
///
/// The uid and target columns keep their dtype. The holdout set must carry
/// every feature column; a target column in it is dropped.
pub fn ingest_split(
    train_test_raw_path: impl AsRef<Path>,
    holdout_raw_path: impl AsRef<Path>,
    target: &str,
    uid: &str,
    params: &IngestSplitParameters,
) -> Result<SplitData> {
    info!("Running ingest_split()");
    let keep = [uid, target];
    let train_test = ints_to_floats(load_csv(train_test_raw_path)?, &keep)?;
    let mut holdout = ints_to_floats(load_csv(holdout_raw_path)?, &keep)?;

    if train_test.column(target).is_err() {
        return Err(SteerageError::column_not_found(INGEST_SPLIT, target));
    }
    let x = train_test.drop(target)?;
    let y = train_test.select([target])?;

    if holdout.column(target).is_ok() {
        warn!("Holdout data has a '{target}' column; dropping it");
        holdout = holdout.drop(target)?;
    }
    for name in x.get_column_names() {
        if holdout.column(name).is_err() {
            return Err(SteerageError::column_not_found(INGEST_SPLIT, name.as_str()));
        }
    }
    let extra: Vec<&str> = holdout
        .get_column_names()
        .into_iter()
        .map(PlSmallStr::as_str)
        .filter(|name| x.column(name).is_err())
        .collect();
    if !extra.is_empty() {
        warn!("Holdout data has columns not in the training data: {extra:?}");
    }

    let (train, test) = split_positions(x.height(), params)?;
    let train = IdxCa::from_vec("train".into(), train);
    let test = IdxCa::from_vec("test".into(), test);

    let split = SplitData {
        x_train: Dataset::new(x.take(&train)?),
        x_test: Dataset::new(x.take(&test)?),
        y_train: Dataset::new(y.take(&train)?),
        y_test: Dataset::new(y.take(&test)?),
        x_holdout: Dataset::new(holdout),
    };
    info!(
        "Split {} rows into {} train / {} test; {} holdout rows",
        x.height(),
        split.x_train.height(),
        split.x_test.height(),
        split.x_holdout.height()
    );
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(train_size: f64, test_size: f64, random_state: u64) -> IngestSplitParameters {
        IngestSplitParameters {
            train_size,
            test_size,
            random_state,
        }
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let (train, test) = split_positions(10, &params(0.7, 0.3, 1)).unwrap();
        assert_eq!(train.len(), 7);
        assert_eq!(test.len(), 3);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn test_split_is_reproducible() {
        let a = split_positions(40, &params(0.75, 0.25, 42)).unwrap();
        let b = split_positions(40, &params(0.75, 0.25, 42)).unwrap();
        assert_eq!(a, b);
        let c = split_positions(40, &params(0.75, 0.25, 7)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_partial_split_leaves_rows_out() {
        let (train, test) = split_positions(10, &params(0.5, 0.25, 3)).unwrap();
        assert_eq!(train.len(), 5);
        assert_eq!(test.len(), 3);
    }

    #[test]
    fn test_invalid_fractions() {
        assert!(matches!(
            split_positions(10, &params(0.8, 0.3, 0)),
            Err(SteerageError::InvalidSplit(_))
        ));
        assert!(split_positions(10, &params(0.0, 0.5, 0)).is_err());
        assert!(split_positions(1, &params(0.5, 0.5, 0)).is_err());
    }

    #[test]
    fn test_ints_to_floats_keeps_listed_columns() {
        let df = df![
            "PassengerId" => [1i64, 2],
            "SibSp" => [0i64, 3],
            "Name" => ["a", "b"],
        ]
        .unwrap();
        let df = ints_to_floats(df, &["PassengerId"]).unwrap();
        assert_eq!(df.column("PassengerId").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("SibSp").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("Name").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = load_csv("does/not/exist.csv").unwrap_err();
        assert!(matches!(err, SteerageError::InvalidPath(_)));
    }
}
