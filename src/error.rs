// src/error.rs

use thiserror::Error;

/// Errors raised by metrics, classifiers and the PCA engine.
///
/// Every failure is local and synchronous: it is returned from the call that
/// caused it and nothing is retried.
#[derive(Debug, Error)]
pub enum LearnError {
    /// A constructor or setter received a parameter outside its domain.
    #[error("invalid configuration for `{parameter}`: {reason}")]
    InvalidConfiguration { parameter: String, reason: String },

    /// A classifier was queried or saved before `train`.
    #[error("classifier has not been trained")]
    NotTrained,

    /// A PCA model was used for projection or saved before `solve`.
    #[error("PCA model has not been solved")]
    NotSolved,

    /// Two shapes that must agree do not.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("empty dataset: {context}")]
    EmptyDataset { context: String },

    /// The spectrum cannot support the requested computation.
    #[error("numerical singularity: {reason}")]
    NumericalSingularity { reason: String },

    /// The linear algebra backend failed.
    #[error("decomposition failed: {0}")]
    Decomposition(String),

    /// Encoding, decoding or validation of a saved model failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LearnError {
    pub(crate) fn invalid_config(parameter: &str, reason: impl Into<String>) -> Self {
        LearnError::InvalidConfiguration {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        LearnError::DimensionMismatch {
            context: context.to_string(),
            expected,
            actual,
        }
    }

    pub(crate) fn empty(context: &str) -> Self {
        LearnError::EmptyDataset {
            context: context.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LearnError>;
