//! # Steerage
//!
//! A declarative preprocessing pipeline for tabular passenger data, plus the
//! experiment runner around it: ingest and split, feature engineering,
//! model training, evaluation and file-backed run tracking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use steerage::config::Parameters;
//! use steerage::ingest::ingest_split;
//! use steerage::pipeline::create_preprocessing_pipeline;
//!
//! let params = Parameters::from_file("parameters.yaml")?;
//! let split = ingest_split(
//!     "data/raw/train.csv",
//!     "data/raw/holdout.csv",
//!     &params.target,
//!     &params.uid,
//!     &params.ingest_split_parameters,
//! )?;
//!
//! let pipeline = create_preprocessing_pipeline(&params.pipeline_parameters)?;
//! let x_train = pipeline.fit_transform(split.x_train)?;
//! println!("{} rows x {} features", x_train.height(), x_train.width());
//! # Ok::<(), steerage::error::SteerageError>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`transforms`]: the named, parameterized dataset transformations
//! - [`pipeline`]: building, validating and running ordered step sequences
//! - [`ingest`]: CSV loading and the seeded train/test split
//! - [`dataset`]: the indexed `DataFrame` wrapper every step works on
//! - [`error`]: error types and handling utilities
//!
//! ## Around the core
//!
//! - [`config`]: `.env` settings and the parameters file
//! - [`model`]: classifiers behind a common trait
//! - [`evaluate`]: accuracy, cross-validation, average precision, recall
//! - [`tracking`]: run metadata, params, metrics and artifacts on disk
//! - [`experiment`]: the end-to-end run
//! - [`export`]: feature CSV output
//! - [`logging`]: console and rolling-file subscriber

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod experiment;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod tracking;
pub mod transforms;
