//! Pipeline data structures.
//!
//! A pipeline is an ordered list of [`Step`]s, each carrying the keyword
//! arguments of one transform. Arguments are read from the nested
//! `pipeline_parameters` mapping, one `<step>_kw_args` entry per step.

use crate::error::{Result, SteerageError};
use crate::transforms::{
    CONVERT_TO_STR, CREATE_FAMILY_SIZE, CREATE_TITLE_CAT, DROP_COLUMNS, IMPUTE_AGE,
    IMPUTE_MISSING_VALUES, ImputeStrategy, ONE_HOT_ENCODER, OneHotColumn, SCALER, SET_DF_INDEX,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Keyword arguments of one step, read from a named entry of a parameter
/// mapping.
pub trait KeywordArgs: DeserializeOwned {
    /// Step the arguments belong to, used in error messages.
    const STEP: &'static str;

    /// Entry holding the arguments, e.g. `scaler_kw_args`.
    const KEY: &'static str;

    /// Keys that must be present inside the entry.
    const REQUIRED: &'static [&'static str];

    /// Read and check the arguments.
    ///
    /// # Errors
    /// [`SteerageError::MissingKey`] when the entry or one of its required
    /// keys is absent, [`SteerageError::Config`] when a value has the wrong
    /// shape.
    fn from_parameters(parameters: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let entry = parameters
            .get(Self::KEY)
            .ok_or_else(|| SteerageError::missing_key(Self::STEP, Self::KEY))?;
        let fields = entry.as_object().ok_or_else(|| {
            SteerageError::Config(format!("'{}' must be a mapping", Self::KEY))
        })?;
        if let Some(key) = Self::REQUIRED.iter().find(|k| !fields.contains_key(**k)) {
            return Err(SteerageError::missing_key(
                Self::STEP,
                format!("{}.{key}", Self::KEY),
            ));
        }
        serde_json::from_value(entry.clone())
            .map_err(|e| SteerageError::Config(format!("Invalid '{}': {e}", Self::KEY)))
    }
}

macro_rules! keyword_args {
    ($ty:ty, $step:expr, $key:literal, [$($field:literal),* $(,)?]) => {
        impl KeywordArgs for $ty {
            const STEP: &'static str = $step;
            const KEY: &'static str = $key;
            const REQUIRED: &'static [&'static str] = &[$($field),*];
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDfIndexArgs {
    pub df_index_col: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertToStrArgs {
    pub convert_to_str_cols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTitleCatArgs {
    pub source_column: String,
    pub dest_column: String,
    pub title_codes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputeAgeArgs {
    pub source_column: String,
    pub title_column: String,
    pub age_codes: BTreeMap<String, i64>,

    /// Used when a row's code has no entry in `age_codes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_age: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFamilySizeArgs {
    pub source_columns: Vec<String>,
    pub dest_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropColumnsArgs {
    pub drop_column_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputeMissingValuesArgs {
    pub strategy: ImputeStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalerArgs {
    pub scale_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotArgs {
    pub uid: String,
    pub one_hot_columns: Vec<OneHotColumn>,
}

keyword_args!(SetDfIndexArgs, SET_DF_INDEX, "set_df_index_kw_args", ["df_index_col"]);
keyword_args!(ConvertToStrArgs, CONVERT_TO_STR, "convert_to_str_kw_args", ["convert_to_str_cols"]);
keyword_args!(
    CreateTitleCatArgs,
    CREATE_TITLE_CAT,
    "create_title_cat_kw_args",
    ["source_column", "dest_column", "title_codes"]
);
keyword_args!(
    ImputeAgeArgs,
    IMPUTE_AGE,
    "impute_age_kw_args",
    ["source_column", "title_column", "age_codes"]
);
keyword_args!(
    CreateFamilySizeArgs,
    CREATE_FAMILY_SIZE,
    "create_family_size_kw_args",
    ["source_columns", "dest_column"]
);
keyword_args!(DropColumnsArgs, DROP_COLUMNS, "drop_columns_kw_args", ["drop_column_names"]);
keyword_args!(
    ImputeMissingValuesArgs,
    IMPUTE_MISSING_VALUES,
    "impute_missing_values_kw_args",
    ["strategy"]
);
keyword_args!(ScalerArgs, SCALER, "scaler_kw_args", ["scale_columns"]);
keyword_args!(OneHotArgs, ONE_HOT_ENCODER, "one_hot_kw_args", ["uid", "one_hot_columns"]);

/// A single transformation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    SetDfIndex(SetDfIndexArgs),
    ConvertToStr(ConvertToStrArgs),
    CreateTitleCat(CreateTitleCatArgs),
    ImputeAge(ImputeAgeArgs),
    CreateFamilySize(CreateFamilySizeArgs),
    DropColumns(DropColumnsArgs),
    ImputeMissingValues(ImputeMissingValuesArgs),
    Scaler(ScalerArgs),
    OneHotEncoder(OneHotArgs),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetDfIndex(_) => SET_DF_INDEX,
            Self::ConvertToStr(_) => CONVERT_TO_STR,
            Self::CreateTitleCat(_) => CREATE_TITLE_CAT,
            Self::ImputeAge(_) => IMPUTE_AGE,
            Self::CreateFamilySize(_) => CREATE_FAMILY_SIZE,
            Self::DropColumns(_) => DROP_COLUMNS,
            Self::ImputeMissingValues(_) => IMPUTE_MISSING_VALUES,
            Self::Scaler(_) => SCALER,
            Self::OneHotEncoder(_) => ONE_HOT_ENCODER,
        }
    }

    /// Human-readable label used in logs and reports.
    pub fn description(&self) -> &'static str {
        match self {
            Self::SetDfIndex(_) => "Set dataframe index",
            Self::ConvertToStr(_) => "Convert columns to text",
            Self::CreateTitleCat(_) => "Create title category column",
            Self::ImputeAge(_) => "Impute missing ages",
            Self::CreateFamilySize(_) => "Create family size column",
            Self::DropColumns(_) => "Drop columns",
            Self::ImputeMissingValues(_) => "Impute missing values",
            Self::Scaler(_) => "Scale numeric columns",
            Self::OneHotEncoder(_) => "One-hot encode categorical columns",
        }
    }

    /// Regular columns the step reads.
    pub fn consumes(&self) -> Vec<String> {
        match self {
            Self::SetDfIndex(args) => vec![args.df_index_col.clone()],
            Self::ConvertToStr(args) => args.convert_to_str_cols.clone(),
            Self::CreateTitleCat(args) => vec![args.source_column.clone()],
            Self::ImputeAge(args) => vec![args.source_column.clone(), args.title_column.clone()],
            Self::CreateFamilySize(args) => args.source_columns.clone(),
            Self::DropColumns(args) => args.drop_column_names.clone(),
            Self::ImputeMissingValues(_) => Vec::new(),
            Self::Scaler(args) => args.scale_columns.clone(),
            Self::OneHotEncoder(args) => args
                .one_hot_columns
                .iter()
                .map(|c| c.col_name.clone())
                .collect(),
        }
    }

    /// Columns the step adds (overwritten columns are not listed).
    pub fn produces(&self) -> Vec<String> {
        match self {
            Self::CreateTitleCat(args) => vec![args.dest_column.clone()],
            Self::CreateFamilySize(args) => vec![args.dest_column.clone()],
            Self::OneHotEncoder(args) => args
                .one_hot_columns
                .iter()
                .flat_map(OneHotColumn::indicator_names)
                .collect(),
            Self::SetDfIndex(_)
            | Self::ConvertToStr(_)
            | Self::ImputeAge(_)
            | Self::DropColumns(_)
            | Self::ImputeMissingValues(_)
            | Self::Scaler(_) => Vec::new(),
        }
    }

    /// Regular columns that no longer exist after the step.
    pub fn removes(&self) -> Vec<String> {
        match self {
            Self::SetDfIndex(args) => vec![args.df_index_col.clone()],
            Self::DropColumns(args) => args.drop_column_names.clone(),
            Self::OneHotEncoder(_) => self.consumes(),
            Self::ConvertToStr(_)
            | Self::CreateTitleCat(_)
            | Self::ImputeAge(_)
            | Self::CreateFamilySize(_)
            | Self::ImputeMissingValues(_)
            | Self::Scaler(_) => Vec::new(),
        }
    }
}

/// The nested `pipeline_parameters` mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineParameters(pub serde_json::Map<String, serde_json::Value>);

impl PipelineParameters {
    pub fn kw_args<T: KeywordArgs>(&self) -> Result<T> {
        T::from_parameters(&self.0)
    }
}

/// Which of the two pipeline shapes to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVariant {
    /// Ends at scaling; categoricals stay as text.
    Minimal,

    /// Adds text coercion and one-hot encoding for direct model input.
    Full,
}

/// An ordered, validated composition of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub variant: PipelineVariant,
    pub steps: Vec<Step>,

    /// Raw input columns the steps need, derived during validation.
    #[serde(default)]
    pub required_inputs: Vec<String>,
}

impl Pipeline {
    /// Load a pipeline from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse and re-validate a pipeline.
    pub fn from_json(json: &str) -> Result<Self> {
        let pipeline: Self = serde_json::from_str(json)?;
        super::builder::finish(pipeline.name, pipeline.variant, pipeline.steps)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parameters(value: serde_json::Value) -> PipelineParameters {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_kw_args_parse() {
        let params = parameters(json!({
            "scaler_kw_args": {"scale_columns": ["Age", "FamilySize"]}
        }));
        let args: ScalerArgs = params.kw_args().unwrap();
        assert_eq!(args.scale_columns, vec!["Age", "FamilySize"]);
    }

    #[test]
    fn test_missing_entry_names_the_key() {
        let err = parameters(json!({})).kw_args::<ScalerArgs>().unwrap_err();
        assert!(matches!(
            err,
            SteerageError::MissingKey { ref step, ref key } if step == "scaler" && key == "scaler_kw_args"
        ));
    }

    #[test]
    fn test_missing_field_names_the_key() {
        let params = parameters(json!({
            "impute_age_kw_args": {"source_column": "Age", "age_codes": {}}
        }));
        let err = params.kw_args::<ImputeAgeArgs>().unwrap_err();
        assert!(matches!(
            err,
            SteerageError::MissingKey { ref key, .. } if key == "impute_age_kw_args.title_column"
        ));
    }

    #[test]
    fn test_wrong_shape_is_a_config_error() {
        let params = parameters(json!({
            "impute_missing_values_kw_args": {"strategy": "loudest"}
        }));
        let err = params.kw_args::<ImputeMissingValuesArgs>().unwrap_err();
        assert!(matches!(err, SteerageError::Config(_)));
    }

    #[test]
    fn test_step_serializes_with_op_tag() {
        let step = Step::DropColumns(DropColumnsArgs {
            drop_column_names: vec!["Cabin".to_owned()],
        });
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(
            value,
            json!({"op": "drop_columns", "drop_column_names": ["Cabin"]})
        );
        let back: Step = serde_json::from_value(value).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_one_hot_produces_indicator_names() {
        let step = Step::OneHotEncoder(OneHotArgs {
            uid: "PassengerId".to_owned(),
            one_hot_columns: vec![OneHotColumn::new("Sex", &["female", "male"])],
        });
        assert_eq!(step.produces(), vec!["Sex_female", "Sex_male"]);
        assert_eq!(step.removes(), vec!["Sex"]);
    }
}
