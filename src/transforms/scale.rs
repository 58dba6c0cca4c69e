use super::SCALER;
use crate::dataset::{Dataset, column_f64};
use crate::error::Result;
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Min-max scale each named column into `[0, 1]` using its own range.
///
/// Statistics are computed from the data passed in on every call. A column
/// with no spread maps every present value to `0.0`; nulls stay null.
pub fn scaler(dataset: &Dataset, scale_columns: &[String]) -> Result<Dataset> {
    info!("Running scaler()");
    let mut out = dataset.clone();
    for name in scale_columns {
        let values = column_f64(SCALER, name, dataset.column(SCALER, name)?)?;
        let (min, max) = values
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let range = max - min;
        let scaled: Vec<Option<f64>> = if range > 0.0 {
            debug!("Scaling '{name}' from [{min}, {max}]");
            values.iter().map(|v| v.map(|v| (v - min) / range)).collect()
        } else {
            if min.is_finite() {
                warn!("Column '{name}' is constant ({min}); scaling to 0");
            } else {
                warn!("Column '{name}' has no values to scale");
            }
            values.iter().map(|v| v.map(|_| 0.0)).collect()
        };
        out.put_column(Series::new(name.as_str().into(), scaled))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SteerageError;
    use crate::transforms::test_support::{dataset, f64s};

    #[test]
    fn test_scaler_spans_unit_interval() {
        let ds = dataset(vec![Series::new("x".into(), [2i64, 3, 4, 5, 6])]);
        let out = scaler(&ds, &["x".to_owned()]).unwrap();
        assert_eq!(
            f64s(&out, "x"),
            vec![Some(0.0), Some(0.25), Some(0.5), Some(0.75), Some(1.0)]
        );
    }

    #[test]
    fn test_scaler_keeps_nulls_and_other_columns() {
        let ds = dataset(vec![
            Series::new("Age".into(), [Some(10.0), None, Some(30.0)]),
            Series::new("Sex".into(), ["male", "female", "male"]),
        ]);
        let out = scaler(&ds, &["Age".to_owned()]).unwrap();
        assert_eq!(f64s(&out, "Age"), vec![Some(0.0), None, Some(1.0)]);
        assert_eq!(out.column_names(), vec!["Age", "Sex"]);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let ds = dataset(vec![Series::new("x".into(), [7.0, 7.0, 7.0])]);
        let out = scaler(&ds, &["x".to_owned()]).unwrap();
        assert_eq!(f64s(&out, "x"), vec![Some(0.0); 3]);
    }

    #[test]
    fn test_text_column_is_rejected() {
        let ds = dataset(vec![Series::new("Sex".into(), ["male"])]);
        let err = scaler(&ds, &["Sex".to_owned()]).unwrap_err();
        assert!(matches!(err, SteerageError::TypeMismatch { .. }));
    }
}
