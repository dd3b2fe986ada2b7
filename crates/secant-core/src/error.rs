//! Error types for quasi-Newton optimization.
//!
//! Only two kinds of failure surface as `Err`: malformed configuration,
//! rejected before any iteration runs, and failures of the caller's
//! evaluator. Numerical degradations (a rejected secant pair, an exhausted
//! line search, a non-descent direction) are reported through state fields
//! instead.

use thiserror::Error;

/// Errors that can occur while configuring or running an optimizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// Invalid optimizer or line search configuration.
    ///
    /// This error occurs when a configuration is built with values outside
    /// their valid range (e.g. zero memory size, zero line search steps).
    #[error("Invalid optimizer configuration: {reason} ({parameter} = {value})")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// Dimension mismatch between vectors.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// The evaluator failed to produce a value or gradient.
    #[error("Evaluation failed: {reason}")]
    EvaluationFailed {
        /// Description of the failure
        reason: String,
    },

    /// The evaluator returned a non-finite value where a finite one is required.
    ///
    /// Raised only at initialization; during iterations non-finite trial
    /// values simply fail the line search conditions.
    #[error("Non-finite {what} at the initial point")]
    NonFiniteValue {
        /// Which quantity was not finite
        what: String,
    },

    /// A stored secant history violates its own invariants.
    ///
    /// Only produced when a history is rebuilt from a checkpoint.
    #[error("Invalid history: {reason}")]
    InvalidHistory {
        /// Which invariant was broken
        reason: String,
    },
}

impl OptimizerError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: ToString,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create an EvaluationFailed error with a custom reason.
    pub fn evaluation_failed<S: Into<String>>(reason: S) -> Self {
        Self::EvaluationFailed {
            reason: reason.into(),
        }
    }

    /// Create a NonFiniteValue error.
    pub fn non_finite<S: Into<String>>(what: S) -> Self {
        Self::NonFiniteValue { what: what.into() }
    }

    /// Create an InvalidHistory error.
    pub fn invalid_history<S: Into<String>>(reason: S) -> Self {
        Self::InvalidHistory {
            reason: reason.into(),
        }
    }
}

/// Result type alias for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizerError>;
