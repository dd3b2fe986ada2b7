//! Stopping rules and optimization results.
//!
//! The solver performs exactly one iteration per `update` call and knows
//! nothing about convergence. The predicate lives here, owned by whoever
//! drives the loop: [`LBFGS::minimize`](crate::LBFGS::minimize) or the
//! caller's own loop.
//!
//! # Solver States
//!
//! - **Running**: neither condition below holds
//! - **Converged**: `‖∇f(x)‖ < gradient_tolerance`
//! - **Exhausted**: `iteration_count ≥ max_iterations`
//!
//! Convergence is checked first, so a state satisfying both is converged.

use crate::state::SolverState;
use secant_core::{
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Position of a solver state relative to the stopping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverStatus {
    /// Keep iterating
    Running,
    /// The gradient norm is below tolerance
    Converged,
    /// The iteration budget is spent
    Exhausted,
}

/// Reasons for optimization termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TerminationReason {
    /// First-order condition satisfied: ‖∇f(x)‖ < ε_grad
    Converged,
    /// Maximum iteration count exhausted without convergence
    MaxIterations,
    /// Too many consecutive line searches failed
    LineSearchFailed,
    /// Progress callback function requested early termination
    CallbackRequest,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Converged => write!(f, "Converged"),
            TerminationReason::MaxIterations => write!(f, "Maximum iterations reached"),
            TerminationReason::LineSearchFailed => write!(f, "Line search failed"),
            TerminationReason::CallbackRequest => write!(f, "Stopped by callback"),
        }
    }
}

/// Stopping rule for the optimization loop.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StoppingCriterion<T> {
    /// Maximum number of solver iterations
    pub max_iterations: usize,

    /// Tolerance for the gradient norm: ‖∇f(x)‖ < ε_grad
    pub gradient_tolerance: T,

    /// Abort after this many line search failures in a row
    ///
    /// `None` keeps iterating through failures until another rule fires.
    pub max_consecutive_line_search_failures: Option<usize>,
}

impl<T: Scalar> Default for StoppingCriterion<T> {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            gradient_tolerance: T::DEFAULT_GRADIENT_TOLERANCE,
            max_consecutive_line_search_failures: None,
        }
    }
}

impl<T: Scalar> StoppingCriterion<T> {
    /// Creates a new stopping criterion with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Sets the gradient tolerance.
    pub fn with_gradient_tolerance(mut self, tol: T) -> Self {
        self.gradient_tolerance = tol;
        self
    }

    /// Stops after `limit` consecutive line search failures.
    pub fn with_max_consecutive_line_search_failures(mut self, limit: usize) -> Self {
        self.max_consecutive_line_search_failures = Some(limit);
        self
    }

    /// Validates the criterion.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the gradient tolerance is negative
    /// or NaN, or the failure limit is zero.
    pub fn validate(&self) -> Result<()> {
        if !(self.gradient_tolerance >= T::zero()) {
            return Err(OptimizerError::invalid_configuration(
                "must be non-negative",
                "gradient_tolerance",
                self.gradient_tolerance,
            ));
        }
        if self.max_consecutive_line_search_failures == Some(0) {
            return Err(OptimizerError::invalid_configuration(
                "must be at least 1",
                "max_consecutive_line_search_failures",
                0,
            ));
        }
        Ok(())
    }

    /// Classifies a solver state.
    pub fn status(&self, state: &SolverState<T>) -> SolverStatus {
        if state.grad_norm() < self.gradient_tolerance {
            SolverStatus::Converged
        } else if state.iteration_count >= self.max_iterations {
            SolverStatus::Exhausted
        } else {
            SolverStatus::Running
        }
    }
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult<T: Scalar> {
    /// The final parameters
    pub params: DVector<T>,

    /// The objective function value at the final parameters
    pub value: T,

    /// The gradient norm at the final parameters
    pub gradient_norm: T,

    /// Total number of solver iterations performed
    pub iterations: usize,

    /// Total number of objective function evaluations
    pub function_evaluations: usize,

    /// Total number of gradient evaluations
    pub gradient_evaluations: usize,

    /// Wall-clock time elapsed during optimization
    pub duration: Duration,

    /// Reason for termination
    pub termination_reason: TerminationReason,

    /// True if the gradient tolerance was met
    pub converged: bool,

    /// Final solver state, usable to resume the run
    pub state: SolverState<T>,
}

impl<T: Scalar> OptimizationResult<T> {
    /// Builds a result from the final solver state.
    pub fn from_state(
        state: SolverState<T>,
        duration: Duration,
        termination_reason: TerminationReason,
    ) -> Self {
        Self {
            params: state.params.clone(),
            value: state.value,
            gradient_norm: state.grad_norm(),
            iterations: state.iteration_count,
            function_evaluations: state.num_fun_evals,
            gradient_evaluations: state.num_grad_evals,
            duration,
            termination_reason,
            converged: termination_reason == TerminationReason::Converged,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secant_core::history::HistoryBuffer;

    fn state_with(grad: Vec<f64>, iteration_count: usize) -> SolverState<f64> {
        let n = grad.len();
        SolverState {
            params: DVector::zeros(n),
            value: 0.0,
            grad: DVector::from_vec(grad),
            history: HistoryBuffer::new(1).unwrap(),
            iteration_count,
            last_line_search: None,
            num_fun_evals: 3,
            num_grad_evals: 2,
            last_step: None,
        }
    }

    #[test]
    fn test_status() {
        let criterion = StoppingCriterion::new()
            .with_max_iterations(10)
            .with_gradient_tolerance(1e-3);

        assert_eq!(criterion.status(&state_with(vec![1.0, 0.0], 0)), SolverStatus::Running);
        assert_eq!(criterion.status(&state_with(vec![1e-4, 0.0], 3)), SolverStatus::Converged);
        assert_eq!(criterion.status(&state_with(vec![1.0, 0.0], 10)), SolverStatus::Exhausted);
        assert_eq!(criterion.status(&state_with(vec![0.0, 0.0], 10)), SolverStatus::Converged);
    }

    #[test]
    fn test_defaults_and_validation() {
        let criterion = StoppingCriterion::<f64>::default();
        assert_eq!(criterion.max_iterations, 100);
        assert_eq!(criterion.gradient_tolerance, 1e-6);
        assert!(criterion.validate().is_ok());

        assert!(StoppingCriterion::<f64>::new()
            .with_gradient_tolerance(-1.0)
            .validate()
            .is_err());
        assert!(StoppingCriterion::<f64>::new()
            .with_max_consecutive_line_search_failures(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_result_from_state() {
        let result = OptimizationResult::from_state(
            state_with(vec![3.0, 4.0], 7),
            Duration::from_millis(5),
            TerminationReason::MaxIterations,
        );
        assert_eq!(result.iterations, 7);
        assert_eq!(result.gradient_norm, 5.0);
        assert_eq!(result.function_evaluations, 3);
        assert_eq!(result.gradient_evaluations, 2);
        assert!(!result.converged);
        assert_eq!(result.termination_reason.to_string(), "Maximum iterations reached");
    }
}
