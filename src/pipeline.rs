//! Declarative preprocessing pipeline.
//!
//! A [`Pipeline`] is built once per run from the `pipeline_parameters`
//! mapping and applied independently to train, test and holdout data.
//!
//! # Example
//!
//! ```no_run
//! use steerage::config::Parameters;
//! use steerage::pipeline::create_preprocessing_pipeline;
//!
//! let parameters = Parameters::from_file("parameters.yaml")?;
//! let pipeline = create_preprocessing_pipeline(&parameters.pipeline_parameters)?;
//! let holdout = steerage::ingest::load_csv("holdout.csv")?;
//! let features = pipeline.fit_transform(holdout)?;
//! println!("{} feature columns", features.width());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Step order
//!
//! Both variants follow the same order; the full variant adds the steps in
//! parentheses:
//!
//! `set_df_index` → (`convert_to_str`) → `create_title_cat` → `impute_age` →
//! `create_family_size` → `drop_columns` → `impute_missing_values` →
//! `scaler` → (`one_hot_encoder`)

pub mod builder;
pub mod executor;
pub mod spec;
pub mod validation;

pub use builder::{build_pipeline, create_pipeline, create_preprocessing_pipeline};
pub use executor::{RunReport, apply_step};
pub use spec::{KeywordArgs, Pipeline, PipelineParameters, PipelineVariant, Step};
pub use validation::{WiringReport, validate_pipeline};
