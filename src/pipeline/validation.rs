//! Pipeline wiring validation.
//!
//! Simulates the column set step by step so that a step reading a column
//! that an earlier step dropped is reported when the pipeline is built, not
//! halfway through a run.

use super::spec::{Pipeline, Step};
use crate::error::{Result, SteerageError, WiringError};
use std::collections::BTreeSet;

/// Outcome of [`validate_pipeline`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WiringReport {
    /// Raw input columns the pipeline reads before producing them itself.
    pub required_inputs: Vec<String>,
    pub errors: Vec<WiringError>,
}

impl WiringReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The required inputs, or every wiring error at once.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.errors.is_empty() {
            Ok(self.required_inputs)
        } else {
            Err(SteerageError::Wiring(self.errors))
        }
    }
}

/// Column bookkeeping while walking the steps.
struct Simulation<'a> {
    /// `None` when the input schema is unknown; any column not yet seen is
    /// then assumed to come from the input.
    input: Option<BTreeSet<&'a str>>,
    columns: BTreeSet<String>,
    removed: BTreeSet<String>,
    index: Option<String>,
    report: WiringReport,
}

impl<'a> Simulation<'a> {
    fn new(input_columns: Option<&'a [String]>) -> Self {
        let input: Option<BTreeSet<&str>> =
            input_columns.map(|cols| cols.iter().map(String::as_str).collect());
        let columns = input
            .iter()
            .flatten()
            .map(|c| (*c).to_owned())
            .collect();
        Self {
            input,
            columns,
            removed: BTreeSet::new(),
            index: None,
            report: WiringReport::default(),
        }
    }

    fn error(&mut self, idx: usize, step: &Step, message: String) {
        self.report.errors.push(WiringError {
            step_index: Some(idx),
            step: step.name().to_owned(),
            message,
        });
    }

    /// Check that `column` can be read at this point.
    fn require(&mut self, idx: usize, step: &Step, column: &str) {
        if self.columns.contains(column) {
            return;
        }
        if self.removed.contains(column) {
            self.error(
                idx,
                step,
                format!("Column '{column}' was removed by an earlier step"),
            );
        } else if self.input.is_some() {
            self.error(idx, step, format!("Column '{column}' is not available"));
        } else {
            self.report.required_inputs.push(column.to_owned());
            self.columns.insert(column.to_owned());
        }
    }

    fn remove(&mut self, column: &str) {
        if self.columns.remove(column) {
            self.removed.insert(column.to_owned());
        }
    }

    fn step(&mut self, idx: usize, step: &Step) {
        for column in step.consumes() {
            self.require(idx, step, &column);
        }

        match step {
            Step::SetDfIndex(args) => {
                self.remove(&args.df_index_col);
                self.index = Some(args.df_index_col.clone());
            }
            Step::OneHotEncoder(args) => {
                let uid = args.uid.as_str();
                if self.index.as_deref() != Some(uid) {
                    self.require(idx, step, uid);
                }
                for column in step.produces() {
                    if self.columns.contains(&column) {
                        self.error(
                            idx,
                            step,
                            format!("Indicator column '{column}' would overwrite an existing column"),
                        );
                    }
                }
                if let Some(old) = self.index.take().filter(|old| old != uid) {
                    self.removed.remove(&old);
                    self.columns.insert(old);
                }
                self.remove(uid);
                self.index = Some(uid.to_owned());
            }
            Step::ConvertToStr(_)
            | Step::CreateTitleCat(_)
            | Step::ImputeAge(_)
            | Step::CreateFamilySize(_)
            | Step::DropColumns(_)
            | Step::ImputeMissingValues(_)
            | Step::Scaler(_) => {}
        }

        for column in step.removes() {
            self.remove(&column);
        }
        for column in step.produces() {
            self.removed.remove(&column);
            self.columns.insert(column);
        }
    }
}

/// Validate the column flow of `pipeline`.
///
/// With `input_columns` (regular columns plus any index name) every column a
/// step reads must be present in the input or produced earlier. Without it
/// only internal contradictions are reported and the columns the pipeline
/// expects from its input are collected.
pub fn validate_pipeline(pipeline: &Pipeline, input_columns: Option<&[String]>) -> WiringReport {
    let mut sim = Simulation::new(input_columns);
    if pipeline.steps.is_empty() {
        sim.report.errors.push(WiringError {
            step_index: None,
            step: pipeline.name.clone(),
            message: "Pipeline has no steps".to_owned(),
        });
    }
    if let Some(cols) = input_columns {
        let mut seen = BTreeSet::new();
        for col in cols.iter().filter(|c| !seen.insert(c.as_str())) {
            sim.report.errors.push(WiringError {
                step_index: None,
                step: pipeline.name.clone(),
                message: format!("Input column '{col}' appears more than once"),
            });
        }
    }
    for (idx, step) in pipeline.steps.iter().enumerate() {
        sim.step(idx, step);
    }
    sim.report
}
