//! Assemble pipelines from `pipeline_parameters`.

use super::spec::{Pipeline, PipelineParameters, PipelineVariant, Step};
use super::validation::validate_pipeline;
use crate::error::Result;
use tracing::{debug, info};

/// Index, title category, age imputation, family size, drop, imputation and
/// scaling. Categoricals are left as text.
pub fn create_pipeline(parameters: &PipelineParameters) -> Result<Pipeline> {
    build_pipeline(parameters, PipelineVariant::Minimal)
}

/// The minimal pipeline plus text coercion after indexing and one-hot
/// encoding at the end, ready for numeric model input.
pub fn create_preprocessing_pipeline(parameters: &PipelineParameters) -> Result<Pipeline> {
    build_pipeline(parameters, PipelineVariant::Full)
}

/// Build either variant in the fixed step order.
///
/// # Errors
/// Fails before returning if any step's keyword arguments are missing or
/// malformed, or if the steps contradict each other (e.g. scaling a column
/// that was dropped).
pub fn build_pipeline(
    parameters: &PipelineParameters,
    variant: PipelineVariant,
) -> Result<Pipeline> {
    info!("Building {variant:?} preprocessing pipeline");
    let full = variant == PipelineVariant::Full;

    let mut steps = vec![Step::SetDfIndex(parameters.kw_args()?)];
    if full {
        steps.push(Step::ConvertToStr(parameters.kw_args()?));
    }
    steps.extend([
        Step::CreateTitleCat(parameters.kw_args()?),
        Step::ImputeAge(parameters.kw_args()?),
        Step::CreateFamilySize(parameters.kw_args()?),
        Step::DropColumns(parameters.kw_args()?),
        Step::ImputeMissingValues(parameters.kw_args()?),
        Step::Scaler(parameters.kw_args()?),
    ]);
    if full {
        steps.push(Step::OneHotEncoder(parameters.kw_args()?));
    }

    let name = match variant {
        PipelineVariant::Minimal => "feature_pipeline",
        PipelineVariant::Full => "preprocessing_pipeline",
    };
    finish(name.to_owned(), variant, steps)
}

/// Validate the wiring and record the inputs the steps need.
pub(crate) fn finish(name: String, variant: PipelineVariant, steps: Vec<Step>) -> Result<Pipeline> {
    let mut pipeline = Pipeline {
        name,
        variant,
        steps,
        required_inputs: Vec::new(),
    };
    pipeline.required_inputs = validate_pipeline(&pipeline, None).into_result()?;
    debug!(
        "Pipeline '{}' has {} steps and reads {:?}",
        pipeline.name,
        pipeline.steps.len(),
        pipeline.required_inputs
    );
    Ok(pipeline)
}
