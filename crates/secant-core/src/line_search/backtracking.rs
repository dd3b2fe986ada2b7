//! Armijo backtracking line search.
//!
//! ```text
//! η = initial guess
//! repeat max_steps times:
//!     if φ(η) ≤ φ(0) + c₁ η φ'(0): accept
//!     η ← decrease_factor · η
//! ```
//!
//! Rejected trials cost one objective evaluation each. On acceptance the
//! gradient at the new point is evaluated once when `store_grad` is set, so
//! the next outer iteration can reuse it.

use super::{
    check_dimensions, sufficient_decrease, InitialGuess, LineSearchState, LineSearchTermination,
    Probe,
};
use crate::{
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the backtracking line search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BacktrackingConfig<T> {
    /// Maximum number of objective evaluations
    pub max_steps: usize,
    /// Factor `ρ ∈ (0, 1)` applied to the step after each rejection
    pub decrease_factor: T,
    /// Armijo constant `c₁ ∈ (0, 1)`
    pub c1: T,
    /// Evaluate and return the gradient at the accepted point
    pub store_grad: bool,
    /// First trial step policy
    pub initial_guess: InitialGuess,
    /// Growth applied to the previous step under [`InitialGuess::Keep`]
    pub increase_factor: T,
    /// Upper bound on the first trial step
    pub max_step: T,
    /// Record diagnostics and warn on failure
    pub verbose: bool,
}

impl<T: Scalar> Default for BacktrackingConfig<T> {
    fn default() -> Self {
        Self {
            max_steps: 30,
            decrease_factor: <T as Scalar>::from_f64(0.8),
            c1: <T as Scalar>::from_f64(1e-4),
            store_grad: true,
            initial_guess: InitialGuess::One,
            increase_factor: <T as Scalar>::from_f64(1.5),
            max_step: T::one(),
            verbose: false,
        }
    }
}

impl<T: Scalar> BacktrackingConfig<T> {
    /// Creates a configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of objective evaluations.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the step reduction factor.
    pub fn with_decrease_factor(mut self, factor: T) -> Self {
        self.decrease_factor = factor;
        self
    }

    /// Sets the Armijo constant.
    pub fn with_c1(mut self, c1: T) -> Self {
        self.c1 = c1;
        self
    }

    /// Enables or disables returning the gradient at the accepted point.
    pub fn with_store_grad(mut self, store_grad: bool) -> Self {
        self.store_grad = store_grad;
        self
    }

    /// Sets the initial guess policy.
    pub fn with_initial_guess(mut self, initial_guess: InitialGuess) -> Self {
        self.initial_guess = initial_guess;
        self
    }

    /// Sets the growth factor used by [`InitialGuess::Keep`].
    pub fn with_increase_factor(mut self, factor: T) -> Self {
        self.increase_factor = factor;
        self
    }

    /// Sets the upper bound on the first trial step.
    pub fn with_max_step(mut self, max_step: T) -> Self {
        self.max_step = max_step;
        self
    }

    /// Enables diagnostics.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if:
    /// - `max_steps` is zero
    /// - `decrease_factor ∉ (0, 1)` or `c1 ∉ (0, 1)`
    /// - `increase_factor` or `max_step` is not positive
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(OptimizerError::invalid_configuration(
                "must allow at least one evaluation",
                "max_steps",
                self.max_steps,
            ));
        }
        if !(self.decrease_factor > T::zero() && self.decrease_factor < T::one()) {
            return Err(OptimizerError::invalid_configuration(
                "must be in (0, 1)",
                "decrease_factor",
                self.decrease_factor,
            ));
        }
        if !(self.c1 > T::zero() && self.c1 < T::one()) {
            return Err(OptimizerError::invalid_configuration(
                "must be in (0, 1)",
                "c1",
                self.c1,
            ));
        }
        if !(self.increase_factor > T::zero()) {
            return Err(OptimizerError::invalid_configuration(
                "must be positive",
                "increase_factor",
                self.increase_factor,
            ));
        }
        if !(self.max_step > T::zero()) {
            return Err(OptimizerError::invalid_configuration(
                "must be positive",
                "max_step",
                self.max_step,
            ));
        }
        Ok(())
    }

    /// Runs the search from `point` along `direction`.
    ///
    /// Never fails for numerical reasons: when the budget runs out the last,
    /// smallest step is returned with `failed = true`. A non-descent
    /// direction simply exhausts the budget.
    pub fn search<C>(
        &self,
        evaluator: &C,
        point: &DVector<T>,
        value: T,
        gradient: &DVector<T>,
        direction: &DVector<T>,
        previous_step: Option<T>,
    ) -> Result<LineSearchState<T>>
    where
        C: CostFunction<T> + ?Sized,
    {
        check_dimensions(point, gradient, direction)?;

        let slope0 = direction.dot(gradient);
        let mut probe = Probe::new(evaluator, point, direction, self.verbose);
        let mut step = self
            .initial_guess
            .initial_step(previous_step, self.increase_factor, self.max_step);
        let mut trial_value = value;

        for attempt in 0..self.max_steps {
            if attempt > 0 {
                step = step * self.decrease_factor;
            }
            trial_value = probe.value(step)?;

            if sufficient_decrease(trial_value, value, self.c1, step, slope0) {
                let grad = if self.store_grad {
                    Some(probe.gradient(step)?)
                } else {
                    None
                };
                return Ok(LineSearchState {
                    step,
                    value: trial_value,
                    grad,
                    lo: None,
                    hi: None,
                    num_evals: probe.num_evals,
                    num_grad_evals: probe.num_grad_evals,
                    failed: false,
                    termination: LineSearchTermination::Accepted,
                    diagnostics: probe.diagnostics(slope0, LineSearchTermination::Accepted),
                });
            }
        }

        let termination = LineSearchTermination::MaxStepsReached;
        if self.verbose {
            log::warn!(
                "Backtracking line search failed: {} (initial slope {:.3e}, last step {:.3e}, {} evaluations)",
                termination,
                <T as Scalar>::to_f64(slope0),
                <T as Scalar>::to_f64(step),
                probe.num_evals,
            );
        }

        Ok(LineSearchState {
            step,
            value: trial_value,
            grad: None,
            lo: None,
            hi: None,
            num_evals: probe.num_evals,
            num_grad_evals: probe.num_grad_evals,
            failed: true,
            termination,
            diagnostics: probe.diagnostics(slope0, termination),
        })
    }
}
