//! Full experiment runs against the fixture files, writing into a temp dir.

use std::path::Path;
use steerage::config::{AppConfig, Parameters};
use steerage::experiment::{HOLDOUT_PREDICTIONS_FILE, run_experiment};
use steerage::tracking::{ExperimentTracker, RunStatus};

fn test_config(out: &Path) -> AppConfig {
    let mut config = AppConfig::load("testdata/.env-test").unwrap();
    config.artifact_path = out.join("artifacts");
    config.logs_path = out.join("logs");
    config.tracking_uri = out.join("runs");
    config
}

#[test]
fn test_logreg_experiment_writes_artifacts_and_run() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let params = Parameters::from_file(&config.parameters_path).unwrap();

    let outcome = run_experiment(&config, &params, "logreg").unwrap();

    for (name, value) in outcome.metrics.as_pairs() {
        assert!((0.0..=100.0).contains(&value), "{name} = {value}");
    }
    for name in ["X_train.csv", "X_test.csv", "y_train.csv", "y_test.csv", HOLDOUT_PREDICTIONS_FILE] {
        assert!(config.artifact_path.join(name).is_file(), "{name}");
    }

    let predictions =
        std::fs::read_to_string(config.artifact_path.join(HOLDOUT_PREDICTIONS_FILE)).unwrap();
    let mut lines = predictions.lines();
    assert_eq!(lines.next(), Some("PassengerId,prediction"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 19);
    assert!(rows.iter().all(|r| r.ends_with(",0") || r.ends_with(",1")));

    let tracker = ExperimentTracker::new(&config.tracking_uri, &config.experiment_name);
    let runs = tracker.list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Finished);
    assert_eq!(runs[0].run_id, outcome.run.run_id);

    let logged = tracker.load_params(&outcome.run.run_id).unwrap();
    assert_eq!(logged.get("model_type").map(String::as_str), Some("LogisticRegression"));
    assert_eq!(logged.get("random_state").map(String::as_str), Some("42"));
    let metrics = tracker.load_metrics(&outcome.run.run_id).unwrap();
    assert_eq!(metrics.get("test_score"), Some(&outcome.metrics.test_score));

    let artifact_dir = config
        .tracking_uri
        .join(&config.experiment_name)
        .join(outcome.run.run_id.to_string())
        .join("artifacts");
    assert!(artifact_dir.join(HOLDOUT_PREDICTIONS_FILE).is_file());
}

#[test]
fn test_svc_experiment_runs() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let params = Parameters::from_file(&config.parameters_path).unwrap();

    let outcome = run_experiment(&config, &params, "svc").unwrap();
    assert_eq!(outcome.run.run_name, "svc");
    assert!(outcome.metrics.train_score > 50.0, "{:?}", outcome.metrics);
}

#[test]
fn test_unknown_model_fails_before_a_run_starts() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let params = Parameters::from_file(&config.parameters_path).unwrap();

    assert!(run_experiment(&config, &params, "forest").is_err());
    let tracker = ExperimentTracker::new(&config.tracking_uri, &config.experiment_name);
    assert!(tracker.list_runs().unwrap().is_empty());
}

#[test]
fn test_failed_run_is_marked_failed() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.holdout_raw_path = tmp.path().join("no_such_holdout.csv");
    let params = Parameters::from_file(&config.parameters_path).unwrap();

    assert!(run_experiment(&config, &params, "logreg").is_err());
    let tracker = ExperimentTracker::new(&config.tracking_uri, &config.experiment_name);
    let runs = tracker.list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
}
