//! End-to-end preprocessing over the fixture files.
//!
//! The holdout sample is transformed with the full pipeline and checked
//! cell by cell against values worked out by hand from `testdata/holdout.csv`.

use polars::prelude::*;
use steerage::config::Parameters;
use steerage::dataset::Dataset;
use steerage::error::SteerageError;
use steerage::ingest::{SplitData, ingest_split};
use steerage::pipeline::{create_pipeline, create_preprocessing_pipeline};

fn parameters() -> Parameters {
    Parameters::from_file("testdata/parameters.yaml").unwrap()
}

fn split(params: &Parameters) -> SplitData {
    ingest_split(
        "testdata/train_test.csv",
        "testdata/holdout.csv",
        &params.target,
        &params.uid,
        &params.ingest_split_parameters,
    )
    .unwrap()
}

fn series<'a>(ds: &'a Dataset, name: &str) -> &'a Series {
    ds.frame().column(name).unwrap().as_materialized_series()
}

fn float_at(ds: &Dataset, name: &str, passenger: u32) -> f64 {
    let row = ds.position_of(&passenger.to_string()).unwrap();
    series(ds, name).f64().unwrap().get(row).unwrap()
}

fn flag_at(ds: &Dataset, name: &str, passenger: u32) -> i32 {
    let row = ds.position_of(&passenger.to_string()).unwrap();
    series(ds, name).i32().unwrap().get(row).unwrap()
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[test]
fn test_full_pipeline_on_holdout() {
    let params = parameters();
    let data = split(&params);
    let pipeline = create_preprocessing_pipeline(&params.pipeline_parameters).unwrap();

    let x = pipeline.fit_transform(data.x_holdout).unwrap();

    // Structure
    assert_eq!(x.index_name(), Some("PassengerId"));
    assert_eq!((x.height(), x.width()), (19, 16));

    // Scaling
    let age = series(&x, "Age");
    assert_eq!(age.min::<f64>().unwrap(), Some(0.0));
    assert_eq!(age.max::<f64>().unwrap(), Some(1.0));

    // One-hot encoding
    for name in ["Pclass_1", "Pclass_2", "Pclass_3"] {
        let s = series(&x, name);
        assert_eq!(s.min::<i32>().unwrap(), Some(0), "{name}");
        assert_eq!(s.max::<i32>().unwrap(), Some(1), "{name}");
    }

    // Individual cells
    assert_eq!(round3(float_at(&x, "Age", 1)), 0.071);
    assert_eq!(round3(float_at(&x, "FamilySize", 1)), 0.5);
    assert_eq!(flag_at(&x, "Pclass_1", 2), 0);
    assert_eq!(flag_at(&x, "Pclass_2", 3), 0);
    assert_eq!(flag_at(&x, "Pclass_3", 4), 0);
    assert_eq!(flag_at(&x, "Sex_female", 5), 1);
    assert_eq!(flag_at(&x, "Sex_male", 6), 0);
    assert_eq!(flag_at(&x, "Embarked_C", 7), 0);
    assert_eq!(flag_at(&x, "Embarked_Q", 8), 1);
    assert_eq!(flag_at(&x, "Embarked_S", 9), 1);
    assert_eq!(flag_at(&x, "TitleCategory_gen_female", 10), 0);
    assert_eq!(flag_at(&x, "TitleCategory_gen_male", 11), 0);
    assert_eq!(flag_at(&x, "TitleCategory_other_female", 12), 0);
    assert_eq!(flag_at(&x, "TitleCategory_other_male", 13), 1);
    assert_eq!(flag_at(&x, "TitleCategory_young_female", 14), 1);
    assert_eq!(flag_at(&x, "TitleCategory_young_male", 15), 0);
}

#[test]
fn test_indicator_groups_are_exclusive() {
    let params = parameters();
    let data = split(&params);
    let pipeline = create_preprocessing_pipeline(&params.pipeline_parameters).unwrap();
    let x = pipeline.fit_transform(data.x_holdout).unwrap();

    for prefix in ["Pclass_", "Sex_", "Embarked_", "TitleCategory_"] {
        let group: Vec<String> = x
            .column_names()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect();
        assert!(!group.is_empty(), "{prefix}");
        for row in 0..x.height() {
            let total: i32 = group
                .iter()
                .map(|c| series(&x, c).i32().unwrap().get(row).unwrap())
                .sum();
            assert_eq!(total, 1, "{prefix} row {row}");
        }
    }
}

#[test]
fn test_minimal_pipeline_keeps_categoricals() {
    let params = parameters();
    let data = split(&params);
    let pipeline = create_pipeline(&params.pipeline_parameters).unwrap();

    let x = pipeline.fit_transform(data.x_holdout).unwrap();

    assert_eq!(x.height(), 19);
    assert_eq!(
        x.column_names(),
        vec!["Pclass", "Sex", "Age", "Embarked", "TitleCategory", "FamilySize"]
    );
    let titles = series(&x, "TitleCategory");
    let row = x.position_of("17").unwrap();
    assert_eq!(titles.str().unwrap().get(row), Some("other_female"));
    // Missing port filled with the most frequent one.
    let row = x.position_of("9").unwrap();
    assert_eq!(series(&x, "Embarked").str().unwrap().get(row), Some("S"));
}

#[test]
fn test_train_and_test_transform_independently() {
    let params = parameters();
    let data = split(&params);
    let pipeline = create_preprocessing_pipeline(&params.pipeline_parameters).unwrap();

    let train = pipeline.fit_transform(data.x_train.clone()).unwrap();
    let test = pipeline.fit_transform(data.x_test.clone()).unwrap();

    assert_eq!(train.height(), data.x_train.height());
    assert_eq!(test.height(), data.x_test.height());
    assert_eq!(train.column_names(), test.column_names());
    // Each side is scaled with its own range.
    for x in [&train, &test] {
        assert_eq!(series(x, "Age").max::<f64>().unwrap(), Some(1.0));
    }
}

#[test]
fn test_single_record_runs_through_full_pipeline() {
    let params = parameters();
    let pipeline = create_preprocessing_pipeline(&params.pipeline_parameters).unwrap();
    let record = serde_json::json!({
        "PassengerId": 892,
        "Pclass": 3,
        "Name": "Kelly, Mr. James",
        "Sex": "male",
        "Age": null,
        "SibSp": 0,
        "Parch": 0,
        "Ticket": "330911",
        "Fare": 7.83,
        "Cabin": null,
        "Embarked": "Q"
    });
    let serde_json::Value::Object(record) = record else {
        panic!("record literal is an object");
    };

    let x = pipeline.fit_transform(record).unwrap();

    assert_eq!((x.height(), x.width()), (1, 16));
    assert_eq!(x.position_of("892"), Some(0));
    assert_eq!(flag_at(&x, "Pclass_3", 892), 1);
    assert_eq!(flag_at(&x, "TitleCategory_gen_male", 892), 1);
    // A single row has no range to scale over.
    assert_eq!(float_at(&x, "Age", 892), 0.0);
}

#[test]
fn test_missing_input_column_is_reported_before_running() {
    let params = parameters();
    let data = split(&params);
    let pipeline = create_preprocessing_pipeline(&params.pipeline_parameters).unwrap();
    let frame = data.x_holdout.frame().drop("Ticket").unwrap();

    let err = pipeline.fit_transform(Dataset::new(frame)).unwrap_err();
    assert!(matches!(err, SteerageError::Wiring(_)), "{err}");
    assert!(err.to_string().contains("Ticket"), "{err}");
}
