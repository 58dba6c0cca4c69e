//! End-to-end experiment run: ingest, preprocess, train, evaluate, track.

use crate::config::{AppConfig, Parameters};
use crate::evaluate::{EvaluationMetrics, evaluate_model};
use crate::export::{export_features, write_csv};
use crate::ingest::{SplitData, ingest_split};
use crate::logging::current_log_path;
use crate::model::{Classifier, features_to_matrix};
use crate::pipeline::{Pipeline, create_preprocessing_pipeline};
use crate::tracking::{ActiveRun, ExperimentTracker, RunMeta, RunStatus};
use anyhow::{Context as _, Result};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const HOLDOUT_PREDICTIONS_FILE: &str = "holdout_predictions.csv";

#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    pub run: RunMeta,
    pub metrics: EvaluationMetrics,
    /// Files written to the artifact directory, in the order they were logged.
    pub artifacts: Vec<PathBuf>,
}

/// Run one experiment for the model whose hyperparameters are stored under
/// `<model_name>_hyperparameters`.
///
/// A failure after the run has started closes it with status `FAILED`.
pub fn run_experiment(
    config: &AppConfig,
    parameters: &Parameters,
    model_name: &str,
) -> Result<ExperimentOutcome> {
    info!("Running run_experiment() for model '{model_name}'");
    let hyperparameters = parameters.hyperparameters(model_name)?;
    let tracker = ExperimentTracker::new(&config.tracking_uri, &config.experiment_name);
    let mut run = tracker.start_run(Some(hyperparameters.model_name()))?;

    let result = (|| -> Result<(EvaluationMetrics, Vec<PathBuf>)> {
        run.log_params(hyperparameters.params())?;
        log_split_params(&mut run, parameters)?;

        let split = ingest_split(
            &config.train_test_raw_path,
            &config.holdout_raw_path,
            &parameters.target,
            &parameters.uid,
            &parameters.ingest_split_parameters,
        )?;
        let pipeline = create_preprocessing_pipeline(&parameters.pipeline_parameters)?;
        run.log_param("pipeline", &pipeline.name)?;
        run.log_param("pipeline_steps", pipeline.steps.len())?;

        let mut model = hyperparameters.build();
        let evaluation = evaluate_model(
            &pipeline,
            model.as_mut(),
            &split,
            &config.artifact_path,
            hyperparameters.cv(),
        )?;
        for (key, value) in evaluation.metrics.as_pairs() {
            run.log_metric(key, value)?;
        }

        let holdout = predict_holdout(&pipeline, model.as_ref(), &split, &config.artifact_path)?;

        let mut artifacts: Vec<PathBuf> = ["X_train.csv", "X_test.csv", "y_train.csv", "y_test.csv"]
            .iter()
            .map(|name| config.artifact_path.join(name))
            .collect();
        artifacts.extend(holdout);
        for path in &artifacts {
            run.log_artifact(path)?;
        }
        let log_file = current_log_path(&config.logs_path, &config.app_name);
        if log_file.is_file() {
            run.log_artifact(&log_file)?;
        }
        Ok((evaluation.metrics, artifacts))
    })();

    match result {
        Ok((metrics, artifacts)) => {
            let run = run.end_run(RunStatus::Finished)?;
            info!(
                "Experiment '{}' run {} finished: test accuracy {}%",
                run.experiment, run.run_id, metrics.test_score
            );
            Ok(ExperimentOutcome {
                run,
                metrics,
                artifacts,
            })
        }
        Err(err) => Err(fail_run(run, err)),
    }
}

/// Close `run` as `FAILED` and hand back `err`. A failure to close the run
/// is logged, never returned in place of `err`.
fn fail_run(run: ActiveRun, err: anyhow::Error) -> anyhow::Error {
    error!("Experiment run failed: {err:#}");
    if let Err(end_err) = run.end_run(RunStatus::Failed) {
        warn!("Could not mark run as failed: {end_err:#}");
    }
    err
}

fn log_split_params(run: &mut ActiveRun, parameters: &Parameters) -> Result<()> {
    let split = &parameters.ingest_split_parameters;
    run.log_param("uid", &parameters.uid)?;
    run.log_param("target", &parameters.target)?;
    run.log_param("train_size", split.train_size)?;
    run.log_param("test_size", split.test_size)?;
    run.log_param("random_state", split.random_state)
}

/// Preprocess the holdout set, predict with the fitted `model` and write the
/// holdout features plus `uid,prediction` rows.
fn predict_holdout(
    pipeline: &Pipeline,
    model: &dyn Classifier,
    split: &SplitData,
    artifact_path: &Path,
) -> Result<Vec<PathBuf>> {
    info!("Running holdout preprocessing");
    let features = pipeline
        .fit_transform(split.x_holdout.clone())
        .context("Holdout preprocessing failed")?;
    let predictions = model.predict(&features_to_matrix(&features)?)?;

    let uid = features
        .index()
        .cloned()
        .context("Holdout features have no uid index")?;
    let prediction = Series::new(
        "prediction".into(),
        predictions.iter().map(|&p| i32::from(p)).collect::<Vec<_>>(),
    );
    let mut frame = DataFrame::new(vec![uid.into(), prediction.into()])?;

    let features_path = export_features(&features, artifact_path.join("X_holdout.csv"))?;
    let predictions_path = write_csv(&mut frame, artifact_path.join(HOLDOUT_PREDICTIONS_FILE))?;
    info!("Wrote {} holdout predictions", frame.height());
    Ok(vec![features_path, predictions_path])
}
