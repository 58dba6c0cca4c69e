//! Pipeline execution engine.
//!
//! Applies the steps of a [`Pipeline`] in order, each step's output feeding
//! the next, and reports what the run did.

use super::spec::{Pipeline, Step};
use super::validation::validate_pipeline;
use crate::dataset::{Dataset, TableInput};
use crate::error::{Result, SteerageError};
use crate::transforms::{
    convert_to_str, create_family_size, create_title_cat, drop_columns, impute_age,
    impute_missing_values, one_hot_encoder, scaler, set_df_index,
};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Report generated after a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Number of rows before processing
    pub rows_before: usize,

    /// Number of columns before processing, index included
    pub columns_before: usize,

    /// Number of rows after processing
    pub rows_after: usize,

    /// Number of regular columns after processing
    pub columns_after: usize,

    /// Number of steps applied
    pub steps_applied: usize,

    /// Time taken for execution
    pub duration: Duration,
}

impl RunReport {
    /// Create a summary message
    pub fn summary(&self) -> String {
        format!(
            "Pipeline completed: {} rows ({} → {}), {} columns ({} → {}), {} steps, {:.2}s",
            change(self.rows_before, self.rows_after),
            self.rows_before,
            self.rows_after,
            change(self.columns_before, self.columns_after),
            self.columns_before,
            self.columns_after,
            self.steps_applied,
            self.duration.as_secs_f64()
        )
    }
}

fn change(before: usize, after: usize) -> &'static str {
    match after.cmp(&before) {
        std::cmp::Ordering::Greater => "added",
        std::cmp::Ordering::Less => "removed",
        std::cmp::Ordering::Equal => "unchanged",
    }
}

impl Pipeline {
    /// Apply every step to `input` and return the transformed dataset.
    ///
    /// Stateful steps (imputation, scaling) compute their statistics from
    /// `input` on every call; nothing is carried over between calls.
    pub fn fit_transform(&self, input: impl Into<TableInput>) -> Result<Dataset> {
        self.fit_transform_with_report(input)
            .map(|(dataset, _)| dataset)
    }

    /// Like [`Pipeline::fit_transform`], also returning a [`RunReport`].
    ///
    /// # Errors
    /// [`SteerageError::Wiring`] if the input lacks a column the steps need;
    /// otherwise the first failing step as [`SteerageError::StepFailed`].
    pub fn fit_transform_with_report(
        &self,
        input: impl Into<TableInput>,
    ) -> Result<(Dataset, RunReport)> {
        let start = Instant::now();
        let mut dataset = input.into().into_dataset()?;

        let mut available = dataset.column_names();
        available.extend(dataset.index_name().map(str::to_owned));
        validate_pipeline(self, Some(&available)).into_result()?;

        let rows_before = dataset.height();
        let columns_before = available.len();
        info!("Running {} on {rows_before} rows", self.name);

        for (index, step) in self.steps.iter().enumerate() {
            debug!("Step {}: {}", index + 1, step.description());
            dataset = apply_step(step, dataset).map_err(|source| SteerageError::StepFailed {
                index,
                step: step.name().to_owned(),
                source: Box::new(source),
            })?;
        }

        let report = RunReport {
            rows_before,
            columns_before,
            rows_after: dataset.height(),
            columns_after: dataset.width(),
            steps_applied: self.steps.len(),
            duration: start.elapsed(),
        };
        info!("{}", report.summary());
        Ok((dataset, report))
    }
}

/// Apply a single step
pub fn apply_step(step: &Step, dataset: Dataset) -> Result<Dataset> {
    match step {
        Step::SetDfIndex(args) => set_df_index(dataset, &args.df_index_col),
        Step::ConvertToStr(args) => convert_to_str(&dataset, &args.convert_to_str_cols),
        Step::CreateTitleCat(args) => create_title_cat(
            &dataset,
            &args.source_column,
            &args.dest_column,
            &args.title_codes,
        ),
        Step::ImputeAge(args) => impute_age(
            &dataset,
            &args.source_column,
            &args.title_column,
            &args.age_codes,
            args.default_age,
        ),
        Step::CreateFamilySize(args) => {
            create_family_size(&dataset, &args.source_columns, &args.dest_column)
        }
        Step::DropColumns(args) => drop_columns(&dataset, &args.drop_column_names),
        Step::ImputeMissingValues(args) => impute_missing_values(&dataset, args.strategy),
        Step::Scaler(args) => scaler(&dataset, &args.scale_columns),
        Step::OneHotEncoder(args) => one_hot_encoder(&dataset, &args.uid, &args.one_hot_columns),
    }
}
