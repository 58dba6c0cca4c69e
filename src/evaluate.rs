//! Model evaluation.
//!
//! Train and test features are produced by separate `fit_transform` calls, so
//! each partition is imputed and scaled with its own statistics.

use crate::dataset::Dataset;
use crate::export::{export_features, write_csv};
use crate::ingest::SplitData;
use crate::model::{Classifier, features_to_matrix, target_to_labels};
use crate::pipeline::Pipeline;
use anyhow::{Context as _, Result, bail};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Scores as percentages rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub train_score: f64,
    pub test_score: f64,
    pub train_cv_score: f64,
    pub test_cv_score: f64,
    pub train_average_precision: f64,
    pub test_average_precision: f64,
    pub train_recall: f64,
    pub test_recall: f64,
}

impl EvaluationMetrics {
    pub fn as_pairs(&self) -> [(&'static str, f64); 8] {
        [
            ("train_score", self.train_score),
            ("test_score", self.test_score),
            ("train_cv_score", self.train_cv_score),
            ("test_cv_score", self.test_cv_score),
            ("train_average_precision", self.train_average_precision),
            ("test_average_precision", self.test_average_precision),
            ("train_recall", self.train_recall),
            ("test_recall", self.test_recall),
        ]
    }
}

/// Result of [`evaluate_model`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub metrics: EvaluationMetrics,
    pub x_train_features: Dataset,
    pub x_test_features: Dataset,
}

/// `fraction` as a percentage with two decimals.
pub fn percent(fraction: f64) -> f64 {
    (fraction * 10_000.0).round() / 100.0
}

/// Assign rows to `k` folds, dealing each class out round-robin so every
/// fold sees the class balance of the whole.
pub fn stratified_folds(y: &Array1<bool>, k: usize) -> Result<Vec<Vec<usize>>> {
    if k < 2 {
        bail!("Cross-validation needs at least 2 folds, got {k}");
    }
    if y.len() < k {
        bail!("Cannot split {} rows into {k} folds", y.len());
    }
    let mut folds = vec![Vec::new(); k];
    let mut next = 0usize;
    for class in [false, true] {
        for (row, _) in y.iter().enumerate().filter(|&(_, label)| *label == class) {
            if let Some(fold) = folds.get_mut(next % k) {
                fold.push(row);
            }
            next += 1;
        }
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Mean accuracy over stratified folds, each scored by a fresh copy of
/// `model` trained on the other folds.
///
/// Folds whose training rows hold a single class cannot be fitted and are
/// skipped with a warning.
pub fn cross_val_score(
    model: &dyn Classifier,
    x: &Array2<f64>,
    y: &Array1<bool>,
    cv: usize,
) -> Result<f64> {
    let folds = stratified_folds(y, cv)?;
    let mut scores = Vec::with_capacity(folds.len());
    for (i, held_out) in folds.iter().enumerate() {
        let train_rows: Vec<usize> = (0..y.len()).filter(|r| !held_out.contains(r)).collect();
        let y_fit = y.select(Axis(0), &train_rows);
        if y_fit.iter().all(|&l| l) || y_fit.iter().all(|&l| !l) {
            warn!("Skipping fold {}: training rows hold a single class", i + 1);
            continue;
        }
        let mut fold_model = model.fresh();
        fold_model.fit(&x.select(Axis(0), &train_rows), &y_fit)?;
        scores.push(fold_model.score(&x.select(Axis(0), held_out), &y.select(Axis(0), held_out))?);
    }
    if scores.is_empty() {
        bail!("No cross-validation fold could be fitted");
    }
    Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Area under the precision-recall curve as a step function over
/// decreasing score thresholds. Zero when there are no positives.
pub fn average_precision(y_true: &Array1<bool>, scores: &Array1<f64>) -> f64 {
    let positives = y_true.iter().filter(|&&l| l).count();
    if positives == 0 {
        return 0.0;
    }
    let mut order: Vec<(f64, bool)> = scores.iter().copied().zip(y_true.iter().copied()).collect();
    order.sort_by(|a, b| b.0.total_cmp(&a.0));

    let (mut tp, mut fp) = (0usize, 0usize);
    let (mut ap, mut prev_recall) = (0.0, 0.0);
    let mut rows = order.iter().peekable();
    while let Some(&(score, label)) = rows.next() {
        if label {
            tp += 1;
        } else {
            fp += 1;
        }
        // Tied scores form one threshold.
        if rows.peek().is_some_and(|(next, _)| *next == score) {
            continue;
        }
        let precision = tp as f64 / (tp + fp) as f64;
        let recall = tp as f64 / positives as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    ap
}

/// Unweighted mean of per-class recall over the classes that occur in
/// either `y_true` or `y_pred`.
pub fn macro_recall(y_true: &Array1<bool>, y_pred: &Array1<bool>) -> f64 {
    let classes: Vec<bool> = [false, true]
        .into_iter()
        .filter(|c| y_true.iter().chain(y_pred.iter()).any(|l| l == c))
        .collect();
    if classes.is_empty() {
        return 0.0;
    }
    let total: f64 = classes
        .iter()
        .map(|c| {
            let actual = y_true.iter().filter(|l| *l == c).count();
            let hits = y_true
                .iter()
                .zip(y_pred.iter())
                .filter(|(t, p)| *t == c && *p == c)
                .count();
            if actual == 0 {
                0.0
            } else {
                hits as f64 / actual as f64
            }
        })
        .sum();
    total / classes.len() as f64
}

/// Preprocess train and test, fit `model` on train and score both sides.
///
/// Writes `X_train.csv`, `X_test.csv`, `y_train.csv` and `y_test.csv` to
/// `artifact_path`.
pub fn evaluate_model(
    pipeline: &Pipeline,
    model: &mut dyn Classifier,
    split: &SplitData,
    artifact_path: &Path,
    cv: usize,
) -> Result<Evaluation> {
    info!("Running evaluate_model()");

    info!("Running train preprocessing");
    let x_train_features = pipeline
        .fit_transform(split.x_train.clone())
        .context("Train preprocessing failed")?;
    info!("Running test preprocessing");
    let x_test_features = pipeline
        .fit_transform(split.x_test.clone())
        .context("Test preprocessing failed")?;

    let x_train = features_to_matrix(&x_train_features)?;
    let x_test = features_to_matrix(&x_test_features)?;
    let y_train = target_to_labels(&split.y_train)?;
    let y_test = target_to_labels(&split.y_test)?;

    info!("Fitting model '{}'", model.name());
    model.fit(&x_train, &y_train)?;

    info!("Scoring model");
    let train_predictions = model.predict(&x_train)?;
    let test_predictions = model.predict(&x_test)?;
    let metrics = EvaluationMetrics {
        train_score: percent(model.score(&x_train, &y_train)?),
        test_score: percent(model.score(&x_test, &y_test)?),
        train_cv_score: percent(cross_val_score(model, &x_train, &y_train, cv)?),
        test_cv_score: percent(cross_val_score(model, &x_test, &y_test, cv)?),
        train_average_precision: percent(average_precision(
            &y_train,
            &model.decision_scores(&x_train)?,
        )),
        test_average_precision: percent(average_precision(
            &y_test,
            &model.decision_scores(&x_test)?,
        )),
        train_recall: percent(macro_recall(&y_train, &train_predictions)),
        test_recall: percent(macro_recall(&y_test, &test_predictions)),
    };
    info!(
        "Train accuracy {}%, test accuracy {}%",
        metrics.train_score, metrics.test_score
    );

    export_features(&x_train_features, artifact_path.join("X_train.csv"))?;
    export_features(&x_test_features, artifact_path.join("X_test.csv"))?;
    write_csv(&mut split.y_train.frame().clone(), artifact_path.join("y_train.csv"))?;
    write_csv(&mut split.y_test.frame().clone(), artifact_path.join("y_test.csv"))?;

    Ok(Evaluation {
        metrics,
        x_train_features,
        x_test_features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_percent_rounds_to_two_decimals() {
        assert_eq!(percent(0.812_345), 81.23);
        assert_eq!(percent(1.0), 100.0);
    }

    #[test]
    fn test_folds_cover_every_row_once() {
        let y = array![true, false, false, true, false, false, true, false, false, false];
        let folds = stratified_folds(&y, 3).unwrap();
        let mut rows: Vec<usize> = folds.iter().flatten().copied().collect();
        rows.sort_unstable();
        assert_eq!(rows, (0..10).collect::<Vec<_>>());
        for fold in &folds {
            assert!(fold.iter().any(|&r| y[r]), "{fold:?}");
        }
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        assert!(stratified_folds(&array![true, false], 5).is_err());
        assert!(stratified_folds(&array![true, false], 1).is_err());
    }

    #[test]
    fn test_average_precision() {
        // sklearn: average_precision_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) == 0.8333...
        let y = array![false, false, true, true];
        let scores = array![0.1, 0.4, 0.35, 0.8];
        assert!((average_precision(&y, &scores) - 0.833_333).abs() < 1e-5);
    }

    #[test]
    fn test_average_precision_with_ties() {
        let y = array![true, false, true, false];
        let scores = array![1.0, 1.0, 0.0, 0.0];
        // One threshold at 1.0: precision 0.5, recall 0.5; then 0.0: precision 0.5, recall 1.
        assert!((average_precision(&y, &scores) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_macro_recall() {
        let y_true = array![true, true, false, false];
        let y_pred = array![true, false, false, false];
        assert!((macro_recall(&y_true, &y_pred) - 0.75).abs() < 1e-12);
    }
}
