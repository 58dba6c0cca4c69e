//! Centralized error handling for the preprocessing core.
//!
//! Every transform, the pipeline builder and the ingest stage return
//! [`Result<T>`], so a failed run always says which step failed and why:
//!
//! ```
//! use steerage::error::SteerageError;
//!
//! fn describe(err: &SteerageError) -> &'static str {
//!     match err {
//!         SteerageError::MissingKey { .. } => "configuration",
//!         SteerageError::ColumnNotFound { .. } | SteerageError::TypeMismatch { .. } => "data shape",
//!         SteerageError::MissingFallback { .. } => "domain gap",
//!         _ => "other",
//!     }
//! }
//! ```
//!
//! ## Context Extension Trait
//!
//! [`ResultExt`] adds `.context()` to any result whose error converts into
//! [`SteerageError`]:
//!
//! ```no_run
//! use steerage::error::ResultExt as _;
//!
//! fn load() -> steerage::error::Result<String> {
//!     std::fs::read_to_string("params.yaml").context("Failed to read parameters")
//! }
//! ```

use std::fmt;

/// A wiring problem found while simulating the column flow of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiringError {
    /// Zero-based step index, `None` for problems with the input itself.
    pub step_index: Option<usize>,
    pub step: String,
    pub message: String,
}

impl fmt::Display for WiringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step_index {
            Some(idx) => write!(f, "Step {} ({}): {}", idx + 1, self.step, self.message),
            None => write!(f, "Input: {}", self.message),
        }
    }
}

/// Main error type for steerage operations.
#[derive(Debug)]
pub enum SteerageError {
    /// A required configuration key is absent
    MissingKey { step: String, key: String },

    /// A transform referenced a column the dataset does not have
    ColumnNotFound { step: String, column: String },

    /// A column has the wrong dtype for a transform
    TypeMismatch {
        step: String,
        column: String,
        expected: String,
        found: String,
    },

    /// A value outside the declared one-hot vocabulary
    UnknownCategory {
        step: String,
        column: String,
        value: String,
    },

    /// A title category with no fallback age and no default configured
    MissingFallback { step: String, code: String },

    /// A column with gaps has no present value to impute from
    NothingToImpute { step: String, column: String },

    /// The index column holds a repeated value
    DuplicateIndex {
        step: String,
        column: String,
        value: String,
    },

    /// The pipeline's column flow is inconsistent
    Wiring(Vec<WiringError>),

    /// A pipeline step failed while being applied
    StepFailed {
        index: usize,
        step: String,
        source: Box<SteerageError>,
    },

    /// Train/test split parameters cannot be satisfied
    InvalidSplit(String),

    /// File not found or invalid path
    InvalidPath(String),

    /// I/O errors (file operations)
    Io(std::io::Error),

    /// Data processing errors raised by Polars
    DataProcessing(String),

    /// Configuration parse errors
    Config(String),

    /// Generic error with context
    Other(String),
}

impl SteerageError {
    pub fn missing_key(step: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingKey {
            step: step.into(),
            key: key.into(),
        }
    }

    pub fn column_not_found(step: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            step: step.into(),
            column: column.into(),
        }
    }

    pub fn type_mismatch(
        step: impl Into<String>,
        column: impl Into<String>,
        expected: impl Into<String>,
        found: impl fmt::Display,
    ) -> Self {
        Self::TypeMismatch {
            step: step.into(),
            column: column.into(),
            expected: expected.into(),
            found: found.to_string(),
        }
    }

    /// The innermost error, looking through [`SteerageError::StepFailed`].
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl fmt::Display for SteerageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { step, key } => {
                write!(f, "Missing configuration key '{key}' for step '{step}'")
            }
            Self::ColumnNotFound { step, column } => {
                write!(f, "Column '{column}' not found (step '{step}')")
            }
            Self::TypeMismatch {
                step,
                column,
                expected,
                found,
            } => write!(
                f,
                "Column '{column}' has dtype {found}, expected {expected} (step '{step}')"
            ),
            Self::UnknownCategory {
                step,
                column,
                value,
            } => write!(
                f,
                "Value '{value}' in column '{column}' is not in the declared categories (step '{step}')"
            ),
            Self::MissingFallback { step, code } => write!(
                f,
                "No fallback configured for category '{code}' and no default set (step '{step}')"
            ),
            Self::NothingToImpute { step, column } => write!(
                f,
                "Column '{column}' has missing values but none present to impute from (step '{step}')"
            ),
            Self::DuplicateIndex {
                step,
                column,
                value,
            } => write!(
                f,
                "Index column '{column}' holds duplicate value '{value}' (step '{step}')"
            ),
            Self::Wiring(errors) => {
                write!(f, "Pipeline wiring is invalid:")?;
                for err in errors {
                    write!(f, "\n  {err}")?;
                }
                Ok(())
            }
            Self::StepFailed {
                index,
                step,
                source,
            } => write!(f, "Step {} '{step}' failed: {source}", index + 1),
            Self::InvalidSplit(msg) => write!(f, "Invalid split: {msg}"),
            Self::InvalidPath(msg) => write!(f, "Invalid path: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SteerageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::StepFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SteerageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<polars::error::PolarsError> for SteerageError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

impl From<serde_json::Error> for SteerageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<serde_yaml::Error> for SteerageError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(format!("YAML error: {err}"))
    }
}

/// Result type alias for steerage operations.
pub type Result<T> = std::result::Result<T, SteerageError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<SteerageError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: SteerageError = e.into();
            SteerageError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: SteerageError = e.into();
            SteerageError::Other(format!("{}: {}", f(), err))
        })
    }
}
