//! File-backed experiment tracker.
//!
//! Runs live under `<root>/<experiment>/<run_id>/`:
//!
//! ```text
//! meta.json      run id, name, timestamps, status
//! params.json    string parameters, written on every log_param
//! metrics.json   numeric metrics, written on every log_metric
//! artifacts/     copies of logged files and directories
//! ```

use anyhow::{Context as _, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

const META_FILE: &str = "meta.json";
const PARAMS_FILE: &str = "params.json";
const METRICS_FILE: &str = "metrics.json";
const ARTIFACTS_DIR: &str = "artifacts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub run_name: String,
    pub experiment: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
}

/// Tracker for one named experiment under a root directory.
#[derive(Debug, Clone)]
pub struct ExperimentTracker {
    root: PathBuf,
    experiment: String,
}

impl ExperimentTracker {
    pub fn new(root: impl Into<PathBuf>, experiment: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            experiment: experiment.into(),
        }
    }

    pub fn experiment_dir(&self) -> PathBuf {
        self.root.join(&self.experiment)
    }

    /// Create a new run directory and mark the run as running.
    ///
    /// Without a name the run is named after the first block of its id.
    pub fn start_run(&self, run_name: Option<&str>) -> Result<ActiveRun> {
        let run_id = Uuid::new_v4();
        let dir = self.experiment_dir().join(run_id.to_string());
        fs::create_dir_all(dir.join(ARTIFACTS_DIR))
            .with_context(|| format!("Failed to create run directory {}", dir.display()))?;

        let run_name = run_name.map_or_else(
            || run_id.simple().to_string().chars().take(8).collect(),
            str::to_owned,
        );
        let run = ActiveRun {
            dir,
            meta: RunMeta {
                run_id,
                run_name,
                experiment: self.experiment.clone(),
                start_time: Utc::now(),
                end_time: None,
                status: RunStatus::Running,
            },
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
        };
        run.write_meta()?;
        write_json(&run.dir.join(PARAMS_FILE), &run.params)?;
        write_json(&run.dir.join(METRICS_FILE), &run.metrics)?;
        info!(
            "Started run '{}' ({}) in experiment '{}'",
            run.meta.run_name, run.meta.run_id, self.experiment
        );
        Ok(run)
    }

    /// Metadata of every run in the experiment, newest first.
    pub fn list_runs(&self) -> Result<Vec<RunMeta>> {
        let dir = self.experiment_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Failed to read experiment directory {}", dir.display()))?
        {
            let meta_path = entry?.path().join(META_FILE);
            if meta_path.is_file() {
                runs.push(read_json::<RunMeta>(&meta_path)?);
            }
        }
        runs.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(runs)
    }

    pub fn load_params(&self, run_id: &Uuid) -> Result<BTreeMap<String, String>> {
        read_json(&self.run_file(run_id, PARAMS_FILE))
    }

    pub fn load_metrics(&self, run_id: &Uuid) -> Result<BTreeMap<String, f64>> {
        read_json(&self.run_file(run_id, METRICS_FILE))
    }

    fn run_file(&self, run_id: &Uuid, name: &str) -> PathBuf {
        self.experiment_dir().join(run_id.to_string()).join(name)
    }
}

/// A run in progress. Every log call is written through to disk.
#[derive(Debug)]
pub struct ActiveRun {
    dir: PathBuf,
    meta: RunMeta,
    params: BTreeMap<String, String>,
    metrics: BTreeMap<String, f64>,
}

impl ActiveRun {
    pub fn run_id(&self) -> Uuid {
        self.meta.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.dir.join(ARTIFACTS_DIR)
    }

    /// Record a parameter. Re-logging the same value is a no-op; a
    /// different value for an existing key is an error.
    pub fn log_param(&mut self, key: &str, value: impl fmt::Display) -> Result<()> {
        let value = value.to_string();
        match self.params.get(key) {
            Some(existing) if *existing == value => return Ok(()),
            Some(existing) => bail!(
                "Parameter '{key}' already logged as '{existing}', refusing to change it to '{value}'"
            ),
            None => {}
        }
        debug!("param {key} = {value}");
        self.params.insert(key.to_owned(), value);
        write_json(&self.dir.join(PARAMS_FILE), &self.params)
    }

    pub fn log_params<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: AsRef<str>,
        V: fmt::Display,
    {
        for (key, value) in params {
            self.log_param(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Record a metric, replacing any earlier value for `key`.
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            bail!("Metric '{key}' is not finite: {value}");
        }
        debug!("metric {key} = {value}");
        self.metrics.insert(key.to_owned(), value);
        write_json(&self.dir.join(METRICS_FILE), &self.metrics)
    }

    /// Copy a file, or a directory tree, into the run's artifacts.
    pub fn log_artifact(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .with_context(|| format!("Artifact path has no file name: {}", path.display()))?;
        let dest = self.artifact_dir().join(name);
        if path.is_dir() {
            copy_dir(path, &dest)?;
        } else if path.is_file() {
            fs::copy(path, &dest)
                .with_context(|| format!("Failed to copy artifact {}", path.display()))?;
        } else {
            bail!("Artifact not found: {}", path.display());
        }
        debug!("Logged artifact {}", dest.display());
        Ok(dest)
    }

    /// Close the run with `status`.
    pub fn end_run(mut self, status: RunStatus) -> Result<RunMeta> {
        self.meta.end_time = Some(Utc::now());
        self.meta.status = status;
        self.write_meta()?;
        info!("Run {} ended with status {status}", self.meta.run_id);
        Ok(self.meta)
    }

    fn write_meta(&self) -> Result<()> {
        write_json(&self.dir.join(META_FILE), &self.meta)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize tracker record")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}

fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create directory {}", dest.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("Failed to read {}", src.display()))? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let tracker = ExperimentTracker::new(tmp.path(), "titanic");

        let mut run = tracker.start_run(Some("baseline"))?;
        let run_id = run.run_id();
        run.log_param("model_name", "logreg")?;
        run.log_params([("cv", 5), ("max_iter", 100)])?;
        run.log_metric("test_score", 81.25)?;
        run.log_metric("test_score", 82.5)?;

        let meta = run.end_run(RunStatus::Finished)?;
        assert_eq!(meta.status, RunStatus::Finished);
        assert!(meta.end_time.is_some());

        let runs = tracker.list_runs()?;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_name, "baseline");

        let params = tracker.load_params(&run_id)?;
        assert_eq!(params.get("cv").map(String::as_str), Some("5"));
        let metrics = tracker.load_metrics(&run_id)?;
        assert_eq!(metrics.get("test_score"), Some(&82.5));
        Ok(())
    }

    #[test]
    fn test_param_cannot_change() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let mut run = ExperimentTracker::new(tmp.path(), "e").start_run(None)?;
        run.log_param("cv", 5)?;
        run.log_param("cv", 5)?;
        let err = run.log_param("cv", 3).unwrap_err();
        assert!(err.to_string().contains("already logged"), "{err}");
        Ok(())
    }

    #[test]
    fn test_log_artifact_file_and_dir() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let src = tmp.path().join("out");
        fs::create_dir_all(src.join("nested"))?;
        fs::write(src.join("a.csv"), "x\n1\n")?;
        fs::write(src.join("nested").join("b.txt"), "b")?;

        let run = ExperimentTracker::new(tmp.path().join("runs"), "e").start_run(None)?;
        let file = run.log_artifact(src.join("a.csv"))?;
        assert_eq!(fs::read_to_string(file)?, "x\n1\n");
        let dir = run.log_artifact(&src)?;
        assert!(dir.join("nested").join("b.txt").is_file());
        assert!(run.log_artifact(src.join("missing.csv")).is_err());
        Ok(())
    }

    #[test]
    fn test_no_runs_yet() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        assert!(ExperimentTracker::new(tmp.path(), "empty").list_runs()?.is_empty());
        Ok(())
    }
}
