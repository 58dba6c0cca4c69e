//! Application configuration.
//!
//! Two sources feed a run:
//!
//! - [`AppConfig`]: paths and tracker settings from a `.env` file. A variable
//!   already set in the process environment takes precedence over the file.
//! - [`Parameters`]: the YAML or JSON parameters file with the uid, target,
//!   split settings, pipeline keyword arguments and model hyperparameters.

use crate::error::{Result, ResultExt as _, SteerageError};
use crate::ingest::IngestSplitParameters;
use crate::model::ModelHyperparameters;
use crate::pipeline::PipelineParameters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub parameters_path: PathBuf,
    pub artifact_path: PathBuf,
    pub logs_path: PathBuf,
    /// Root directory of the file-backed experiment tracker.
    pub tracking_uri: PathBuf,
    pub experiment_name: String,
    pub train_test_raw_path: PathBuf,
    pub holdout_raw_path: PathBuf,
}

impl AppConfig {
    /// Read the configuration from the `.env` file at `env_path`.
    ///
    /// # Errors
    /// Fails if the file cannot be parsed or a variable is missing from both
    /// the file and the process environment.
    pub fn load(env_path: impl AsRef<Path>) -> Result<Self> {
        let env_path = env_path.as_ref();
        if !env_path.is_file() {
            return Err(SteerageError::InvalidPath(format!(
                "Environment file not found: {}",
                env_path.display()
            )));
        }

        let mut vars = HashMap::new();
        let entries = dotenvy::from_path_iter(env_path)
            .map_err(|e| SteerageError::Config(format!("Failed to read {}: {e}", env_path.display())))?;
        for entry in entries {
            let (key, value) = entry.map_err(|e| {
                SteerageError::Config(format!("Failed to parse {}: {e}", env_path.display()))
            })?;
            vars.insert(key, value);
        }
        debug!("Read {} variables from {}", vars.len(), env_path.display());

        let var = |key: &str| -> Result<String> {
            std::env::var(key)
                .ok()
                .or_else(|| vars.get(key).cloned())
                .ok_or_else(|| SteerageError::missing_key("env", key))
        };

        Ok(Self {
            app_name: var("APP_NAME")?,
            parameters_path: var("PARAMETERS_PATH")?.into(),
            artifact_path: var("ARTIFACT_PATH")?.into(),
            logs_path: var("LOGS_PATH")?.into(),
            tracking_uri: var("TRACKING_URI")?.into(),
            experiment_name: var("EXPERIMENT_NAME")?,
            train_test_raw_path: var("TRAIN_TEST_RAW_PATH")?.into(),
            holdout_raw_path: var("HOLDOUT_RAW_PATH")?.into(),
        })
    }
}

/// Contents of the parameters file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub uid: String,
    pub target: String,
    pub ingest_split_parameters: IngestSplitParameters,
    pub pipeline_parameters: PipelineParameters,

    /// Remaining entries, including the `<model>_hyperparameters` blocks.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Parameters {
    /// Load parameters from YAML (`.yaml`/`.yml`) or JSON (`.json`).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters file {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "json" => Self::from_json(&content),
            _ => Err(SteerageError::Config(format!(
                "Unsupported parameters file extension: {ext}"
            ))),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// The `<model_name>_hyperparameters` block, e.g. `logreg`.
    pub fn hyperparameters(&self, model_name: &str) -> Result<ModelHyperparameters> {
        let key = format!("{model_name}_hyperparameters");
        let value = self
            .extra
            .get(&key)
            .ok_or_else(|| SteerageError::missing_key("model", &key))?;
        let hyperparameters: ModelHyperparameters = serde_json::from_value(value.clone())
            .map_err(|e| SteerageError::Config(format!("Invalid '{key}': {e}")))?;
        hyperparameters.validate()?;
        Ok(hyperparameters)
    }

    /// Names of every model with a hyperparameter block, sorted.
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .extra
            .keys()
            .filter_map(|k| k.strip_suffix("_hyperparameters"))
            .map(str::to_owned)
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const YAML: &str = r"
uid: PassengerId
target: Survived
ingest_split_parameters:
  train_size: 0.75
  test_size: 0.25
  random_state: 42
pipeline_parameters:
  set_df_index_kw_args:
    df_index_col: PassengerId
  convert_to_str_kw_args:
    convert_to_str_cols: [Pclass]
logreg_hyperparameters:
  model_type: LogisticRegression
  model_name: logreg
  cv: 5
  alpha: 1.0
  max_iter: 100
";

    #[test]
    fn test_parameters_from_yaml() {
        let params = Parameters::from_yaml(YAML).unwrap();
        assert_eq!(params.uid, "PassengerId");
        assert_eq!(params.ingest_split_parameters.random_state, 42);
        assert!(
            params
                .pipeline_parameters
                .0
                .contains_key("convert_to_str_kw_args")
        );
        assert_eq!(params.model_names(), vec!["logreg"]);
        let hp = params.hyperparameters("logreg").unwrap();
        assert_eq!(hp.model_name(), "logreg");
        assert_eq!(hp.cv(), 5);
    }

    #[test]
    fn test_unsupported_svc_kernel_is_a_config_error() {
        let yaml = format!(
            "{YAML}svc_hyperparameters:\n  model_type: SVC\n  model_name: svc\n  kernel: sigmoid\n"
        );
        let params = Parameters::from_yaml(&yaml).unwrap();
        let err = params.hyperparameters("svc").unwrap_err();
        assert!(matches!(err, SteerageError::Config(ref msg) if msg.contains("sigmoid")), "{err}");
    }

    #[test]
    fn test_unknown_model_is_a_missing_key() {
        let params = Parameters::from_yaml(YAML).unwrap();
        let err = params.hyperparameters("forest").unwrap_err();
        assert!(matches!(err, SteerageError::MissingKey { .. }));
    }

    #[test]
    fn test_missing_top_level_key_fails() {
        let err = Parameters::from_yaml("uid: PassengerId\n").unwrap_err();
        assert!(matches!(err, SteerageError::Config(_)));
    }

    #[test]
    fn test_app_config_from_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "APP_NAME=steerage-unit\n\
             PARAMETERS_PATH=testdata/parameters.yaml\n\
             ARTIFACT_PATH=out/artifacts\n\
             MODELS_PATH=out/models\n\
             LOGS_PATH=out/logs\n\
             TRACKING_URI=out/runs\n\
             EXPERIMENT_NAME=unit\n\
             TRAIN_TEST_RAW_PATH=testdata/train_test.csv\n\
             HOLDOUT_RAW_PATH=testdata/holdout.csv"
        )
        .unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.experiment_name, "unit");
        assert_eq!(config.artifact_path, PathBuf::from("out/artifacts"));
        assert_eq!(config.holdout_raw_path, PathBuf::from("testdata/holdout.csv"));
    }

    #[test]
    fn test_app_config_missing_variable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "PARAMETERS_PATH=parameters.yaml").unwrap();
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Missing configuration key"), "{err}");
    }
}
