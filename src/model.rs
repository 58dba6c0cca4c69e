//! Classifiers trained on the preprocessed feature matrix.
//!
//! The pipeline hands over an all-numeric [`Dataset`]; [`features_to_matrix`]
//! and [`target_to_labels`] turn it into the `ndarray` shapes `linfa` works
//! with, and [`Classifier`] hides which algorithm sits behind the run.

use crate::dataset::{Dataset, column_f64, column_text};
use crate::error::SteerageError;
use anyhow::{Result, anyhow};
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use linfa_svm::Svm;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

const FEATURES: &str = "features_to_matrix";
const TARGET: &str = "target_to_labels";

/// Convert an all-numeric dataset (index excluded) into a row-major matrix.
///
/// # Errors
/// A non-numeric column is a [`SteerageError::TypeMismatch`]; a missing
/// value is a [`SteerageError::DataProcessing`] error naming the column.
pub fn features_to_matrix(dataset: &Dataset) -> crate::error::Result<Array2<f64>> {
    let mut matrix = Array2::zeros((dataset.height(), dataset.width()));
    for (j, name) in dataset.column_names().iter().enumerate() {
        let values = column_f64(FEATURES, name, dataset.column(FEATURES, name)?)?;
        let values = values
            .into_iter()
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| {
                SteerageError::DataProcessing(format!(
                    "Feature column '{name}' has missing values"
                ))
            })?;
        matrix.column_mut(j).assign(&Array1::from(values));
    }
    Ok(matrix)
}

/// Read the single target column as binary labels.
///
/// Numbers map to `value != 0`, booleans as is, and the strings `0`/`1`/
/// `true`/`false` accordingly. Anything else, including nulls, is an error.
pub fn target_to_labels(target: &Dataset) -> crate::error::Result<Array1<bool>> {
    let names = target.column_names();
    let [name] = names.as_slice() else {
        return Err(SteerageError::DataProcessing(format!(
            "Expected exactly one target column, found {names:?}"
        )));
    };
    let series = target.column(TARGET, name)?;
    let labels = column_text(TARGET, name, series)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value.as_deref() {
            Some("1" | "true") => Ok(true),
            Some("0" | "false") => Ok(false),
            Some(other) => Err(SteerageError::DataProcessing(format!(
                "Target '{name}' row {row} has non-binary value '{other}'"
            ))),
            None => Err(SteerageError::DataProcessing(format!(
                "Target '{name}' row {row} is missing"
            ))),
        })
        .collect::<crate::error::Result<Vec<bool>>>()?;
    Ok(Array1::from(labels))
}

/// A binary classifier with a scikit-learn style surface.
pub trait Classifier {
    fn name(&self) -> &str;

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<bool>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<bool>>;

    /// Confidence that each row is positive; higher means more likely.
    fn decision_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Accuracy on `(x, y)`.
    fn score(&self, x: &Array2<f64>, y: &Array1<bool>) -> Result<f64> {
        let predictions = self.predict(x)?;
        let dataset = linfa::Dataset::new(x.clone(), y.clone());
        let cm = predictions.confusion_matrix(&dataset)?;
        Ok(f64::from(cm.accuracy()))
    }

    /// An unfitted model with the same hyperparameters.
    fn fresh(&self) -> Box<dyn Classifier>;
}

/// Kernel of the support vector classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SvcKernel {
    Linear,
    /// `(x . y + coef0)^degree`
    Poly,
    /// `exp(-gamma * |x - y|^2)`
    #[default]
    Rbf,
}

impl SvcKernel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Poly => "poly",
            Self::Rbf => "rbf",
        }
    }
}

/// Hyperparameters for one model, tagged by `model_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type")]
pub enum ModelHyperparameters {
    LogisticRegression {
        model_name: String,
        #[serde(default = "default_cv")]
        cv: usize,
        /// L2 penalty strength.
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_max_iter")]
        max_iter: u64,
    },
    #[serde(rename = "SVC")]
    Svc {
        model_name: String,
        #[serde(default = "default_cv")]
        cv: usize,
        #[serde(rename = "C", alias = "c", default = "default_c")]
        c: f64,
        #[serde(default)]
        kernel: SvcKernel,
        /// Kernel coefficient for `rbf`. Unset means `1 / (n_features * var(x))`.
        #[serde(default)]
        gamma: Option<f64>,
        #[serde(default = "default_degree")]
        degree: u32,
        #[serde(default)]
        coef0: f64,
    },
}

fn default_cv() -> usize {
    5
}

fn default_alpha() -> f64 {
    1.0
}

fn default_max_iter() -> u64 {
    100
}

fn default_c() -> f64 {
    1.0
}

fn default_degree() -> u32 {
    3
}

impl ModelHyperparameters {
    pub fn model_name(&self) -> &str {
        match self {
            Self::LogisticRegression { model_name, .. } | Self::Svc { model_name, .. } => {
                model_name
            }
        }
    }

    pub fn model_type(&self) -> &'static str {
        match self {
            Self::LogisticRegression { .. } => "LogisticRegression",
            Self::Svc { .. } => "SVC",
        }
    }

    /// Number of cross-validation folds.
    pub fn cv(&self) -> usize {
        match self {
            Self::LogisticRegression { cv, .. } | Self::Svc { cv, .. } => *cv,
        }
    }

    /// Reject knob values the solvers cannot use.
    ///
    /// # Errors
    /// A [`SteerageError::Config`] naming the offending knob.
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid =
            |msg: String| Err(SteerageError::Config(format!("{}: {msg}", self.model_name())));
        match self {
            Self::LogisticRegression { alpha, .. } if *alpha < 0.0 => {
                invalid(format!("alpha must be non-negative, got {alpha}"))
            }
            Self::Svc { c, .. } if *c <= 0.0 => invalid(format!("C must be positive, got {c}")),
            Self::Svc {
                gamma: Some(gamma), ..
            } if *gamma <= 0.0 => invalid(format!("gamma must be positive, got {gamma}")),
            Self::Svc { degree: 0, .. } => invalid("degree must be at least 1".to_owned()),
            _ => Ok(()),
        }
    }

    /// Every hyperparameter as a `(name, value)` pair for tracking.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("model_name".to_owned(), self.model_name().to_owned()),
            ("model_type".to_owned(), self.model_type().to_owned()),
            ("cv".to_owned(), self.cv().to_string()),
        ];
        match self {
            Self::LogisticRegression {
                alpha, max_iter, ..
            } => {
                params.push(("alpha".to_owned(), alpha.to_string()));
                params.push(("max_iter".to_owned(), max_iter.to_string()));
            }
            Self::Svc {
                c,
                kernel,
                gamma,
                degree,
                coef0,
                ..
            } => {
                params.push(("C".to_owned(), c.to_string()));
                params.push(("kernel".to_owned(), kernel.as_str().to_owned()));
                match kernel {
                    SvcKernel::Linear => {}
                    SvcKernel::Poly => {
                        params.push(("degree".to_owned(), degree.to_string()));
                        params.push(("coef0".to_owned(), coef0.to_string()));
                    }
                    SvcKernel::Rbf => params.push((
                        "gamma".to_owned(),
                        gamma.map_or_else(|| "scale".to_owned(), |g| g.to_string()),
                    )),
                }
            }
        }
        params
    }

    /// An unfitted classifier for these hyperparameters.
    pub fn build(&self) -> Box<dyn Classifier> {
        match self {
            Self::LogisticRegression {
                model_name,
                alpha,
                max_iter,
                ..
            } => Box::new(LogRegModel::new(model_name.clone(), *alpha, *max_iter)),
            Self::Svc {
                model_name,
                c,
                kernel,
                gamma,
                degree,
                coef0,
                ..
            } => {
                let kernel = match kernel {
                    SvcKernel::Linear => KernelChoice::Linear,
                    SvcKernel::Poly => KernelChoice::Poly {
                        degree: *degree,
                        coef0: *coef0,
                    },
                    SvcKernel::Rbf => KernelChoice::Rbf { gamma: *gamma },
                };
                Box::new(SvcModel::new(model_name.clone(), *c, kernel))
            }
        }
    }
}

/// L2-regularized logistic regression.
pub struct LogRegModel {
    name: String,
    alpha: f64,
    max_iter: u64,
    fitted: Option<FittedLogisticRegression<f64, bool>>,
}

impl LogRegModel {
    pub fn new(name: impl Into<String>, alpha: f64, max_iter: u64) -> Self {
        Self {
            name: name.into(),
            alpha,
            max_iter,
            fitted: None,
        }
    }

    fn fitted(&self) -> Result<&FittedLogisticRegression<f64, bool>> {
        self.fitted
            .as_ref()
            .ok_or_else(|| anyhow!("Model '{}' has not been fitted", self.name))
    }
}

impl Classifier for LogRegModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<bool>) -> Result<()> {
        let dataset = linfa::Dataset::new(x.clone(), y.clone());
        let model = LogisticRegression::default()
            .alpha(self.alpha)
            .max_iterations(self.max_iter)
            .fit(&dataset)
            .map_err(|e| anyhow!("Logistic Regression training failed: {e}"))?;
        self.fitted = Some(model);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<bool>> {
        Ok(self.fitted()?.predict(x))
    }

    fn decision_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted()?;
        let probabilities = fitted.predict_probabilities(x);
        // Probabilities are for the fitted positive class.
        if fitted.labels().pos.class {
            Ok(probabilities)
        } else {
            Ok(probabilities.mapv(|p| 1.0 - p))
        }
    }

    fn fresh(&self) -> Box<dyn Classifier> {
        Box::new(Self::new(self.name.clone(), self.alpha, self.max_iter))
    }
}

/// Kernel settings resolved for [`SvcModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelChoice {
    Linear,
    Poly { degree: u32, coef0: f64 },
    /// `None` picks `1 / (n_features * var(x))` from the training matrix.
    Rbf { gamma: Option<f64> },
}

/// Support vector classifier; the decision score is the signed margin.
pub struct SvcModel {
    name: String,
    c: f64,
    kernel: KernelChoice,
    fitted: Option<Svm<f64, bool>>,
}

impl SvcModel {
    pub fn new(name: impl Into<String>, c: f64, kernel: KernelChoice) -> Self {
        Self {
            name: name.into(),
            c,
            kernel,
            fitted: None,
        }
    }

    fn fitted(&self) -> Result<&Svm<f64, bool>> {
        self.fitted
            .as_ref()
            .ok_or_else(|| anyhow!("Model '{}' has not been fitted", self.name))
    }
}

/// `1 / (n_features * var(x))`, or 1.0 for a constant matrix.
fn scale_gamma(x: &Array2<f64>) -> f64 {
    let Some(mean) = x.mean() else {
        return 1.0;
    };
    let variance = x.mapv(|v| (v - mean).powi(2)).mean().unwrap_or(0.0);
    if variance > 0.0 {
        1.0 / (x.ncols() as f64 * variance)
    } else {
        1.0
    }
}

impl Classifier for SvcModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<bool>) -> Result<()> {
        let dataset = linfa::Dataset::new(x.clone(), y.clone());
        let params = Svm::<f64, bool>::params().pos_neg_weights(self.c, self.c);
        let params = match self.kernel {
            KernelChoice::Linear => params.linear_kernel(),
            KernelChoice::Poly { degree, coef0 } => {
                params.polynomial_kernel(coef0, f64::from(degree))
            }
            // linfa's gaussian kernel is exp(-|x - y|^2 / eps).
            KernelChoice::Rbf { gamma } => {
                params.gaussian_kernel(1.0 / gamma.unwrap_or_else(|| scale_gamma(x)))
            }
        };
        let model = params
            .fit(&dataset)
            .map_err(|e| anyhow!("SVC training failed: {e}"))?;
        self.fitted = Some(model);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<bool>> {
        Ok(self.fitted()?.predict(x))
    }

    /// Signed distance to the separating surface; positive predicts `true`.
    fn decision_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted()?;
        Ok(x.rows()
            .into_iter()
            .map(|row| fitted.weighted_sum(&row) - fitted.rho)
            .collect())
    }

    fn fresh(&self) -> Box<dyn Classifier> {
        Box::new(Self::new(self.name.clone(), self.c, self.kernel))
    }
}
