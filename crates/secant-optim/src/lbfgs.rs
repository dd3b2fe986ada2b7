//! Limited-memory BFGS solver.
//!
//! L-BFGS (Limited-memory Broyden-Fletcher-Goldfarb-Shanno) is a quasi-Newton
//! algorithm that approximates the inverse Hessian using a limited history of
//! past gradient and position updates.
//!
//! # Algorithm Overview
//!
//! One call to [`LBFGS::update`]:
//! 1. Computes `d = -H_k g` by two-loop recursion over the stored pairs
//! 2. Runs the configured line search along `d` to get a step `η`
//! 3. Moves to `x + η d` and forms the secant pair `(η d, g' - g)`
//! 4. Stores the pair if `<s, y> > ε`, evicting the oldest when full
//!
//! The solver never decides when to stop. [`LBFGS::minimize`] wraps the
//! iteration in a loop driven by a [`StoppingCriterion`]; callers needing
//! their own instrumentation between steps can drive `update` directly.
//!
//! # Degraded Steps
//!
//! - A rejected secant pair is dropped silently
//! - A failed line search still returns a step, which the solver takes
//! - A non-descent direction clears the history and falls back to steepest
//!   descent. Stored pairs all have positive curvature, so only round-off
//!   in the two-loop recursion can produce one
//! - A non-finite value or gradient at the new point leaves the iterate
//!   where it was
//!
//! None of these produce an `Err`. Only invalid configuration, dimension
//! mismatches and evaluator failures do.
//!
//! # References
//!
//! - Nocedal & Wright, "Numerical Optimization" (2006), Chapter 7

use crate::{
    optimizer::{OptimizationResult, SolverStatus, StoppingCriterion, TerminationReason},
    state::SolverState,
};
use secant_core::{
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    history::HistoryBuffer,
    line_search::{BacktrackingConfig, LineSearch, LineSearchState, ZoomConfig},
    preconditioner::TwoLoopPreconditioner,
    types::{self, DVector, Scalar},
};
use num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::time::Instant;

/// Configuration for the L-BFGS optimizer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "T: Scalar + Serialize",
        deserialize = "T: Scalar + Deserialize<'de>"
    ))
)]
pub struct LBFGSConfig<T: Scalar> {
    /// Number of secant pairs to store (typically 5-20)
    pub memory_size: usize,
    /// Scale the initial inverse Hessian by the newest pair's curvature
    pub scale_init_precond: bool,
    /// Line search and its parameters
    pub line_search: LineSearch<T>,
}

impl<T: Scalar> Default for LBFGSConfig<T> {
    fn default() -> Self {
        Self {
            memory_size: 10,
            scale_init_precond: true,
            line_search: LineSearch::default(),
        }
    }
}

impl<T: Scalar> LBFGSConfig<T> {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the memory size (number of secant pairs to store).
    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = size;
        self
    }

    /// Enables or disables initial inverse Hessian scaling.
    pub fn with_scale_init_precond(mut self, scale: bool) -> Self {
        self.scale_init_precond = scale;
        self
    }

    /// Sets the line search.
    pub fn with_line_search(mut self, line_search: impl Into<LineSearch<T>>) -> Self {
        self.line_search = line_search.into();
        self
    }

    /// Uses the strong Wolfe zoom line search.
    pub fn with_zoom(self, config: ZoomConfig<T>) -> Self {
        self.with_line_search(config)
    }

    /// Uses Armijo backtracking.
    pub fn with_backtracking(self, config: BacktrackingConfig<T>) -> Self {
        self.with_line_search(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero memory size or an invalid
    /// line search configuration.
    pub fn validate(&self) -> Result<()> {
        if self.memory_size == 0 {
            return Err(OptimizerError::invalid_configuration(
                "must store at least one pair",
                "memory_size",
                self.memory_size,
            ));
        }
        self.line_search.validate()
    }
}

/// L-BFGS optimizer.
///
/// The optimizer itself holds only configuration; every run's progress lives
/// in a [`SolverState`].
///
/// # Examples
///
/// ```rust
/// use secant_core::prelude::*;
/// use secant_optim::{LBFGS, LBFGSConfig, StoppingCriterion};
///
/// #[derive(Debug)]
/// struct Bowl;
///
/// impl CostFunction<f64> for Bowl {
///     fn cost(&self, x: &DVector<f64>) -> Result<f64> {
///         Ok(x.dot(x))
///     }
///     fn cost_and_gradient(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>)> {
///         Ok((x.dot(x), x * 2.0))
///     }
/// }
///
/// let lbfgs = LBFGS::new(LBFGSConfig::new().with_memory_size(5))?;
/// let x0 = DVector::from_vec(vec![1.0, -2.0, 3.0]);
/// let result = lbfgs.minimize(&Bowl, &x0, &StoppingCriterion::new())?;
/// assert!(result.converged);
/// # Ok::<(), OptimizerError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LBFGS<T: Scalar> {
    config: LBFGSConfig<T>,
    preconditioner: TwoLoopPreconditioner,
}

impl<T: Scalar> LBFGS<T> {
    /// Creates a new L-BFGS optimizer with given configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration does not validate.
    pub fn new(config: LBFGSConfig<T>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            preconditioner: TwoLoopPreconditioner::new(config.scale_init_precond),
            config,
        })
    }

    /// Creates a new L-BFGS optimizer with default configuration.
    pub fn with_default_config() -> Self {
        Self {
            config: LBFGSConfig::default(),
            preconditioner: TwoLoopPreconditioner::default(),
        }
    }

    /// Returns the optimizer configuration.
    pub fn config(&self) -> &LBFGSConfig<T> {
        &self.config
    }

    /// Returns the optimizer name.
    pub fn name(&self) -> &str {
        "L-BFGS"
    }

    /// Evaluates the objective at `params` and creates the initial state.
    ///
    /// # Errors
    ///
    /// Returns `NonFiniteValue` if the value or gradient at `params` is not
    /// finite, `DimensionMismatch` if the gradient has the wrong length, and
    /// propagates evaluator failures.
    pub fn init<C>(&self, evaluator: &C, params: DVector<T>) -> Result<SolverState<T>>
    where
        C: CostFunction<T> + ?Sized,
    {
        let (value, grad) = evaluator.cost_and_gradient(&params)?;
        if grad.len() != params.len() {
            return Err(OptimizerError::dimension_mismatch(params.len(), grad.len()));
        }
        if !<T as Float>::is_finite(value) {
            return Err(OptimizerError::non_finite("objective value"));
        }
        if !types::all_finite(&grad) {
            return Err(OptimizerError::non_finite("gradient"));
        }

        Ok(SolverState {
            params,
            value,
            grad,
            history: HistoryBuffer::new(self.config.memory_size)?,
            iteration_count: 0,
            last_line_search: None,
            num_fun_evals: 1,
            num_grad_evals: 1,
            last_step: None,
        })
    }

    /// Performs one L-BFGS iteration.
    ///
    /// Consumes `state` and returns its successor. A state whose gradient is
    /// exactly zero is returned at the same point with a zero step.
    ///
    /// The history travels with the state and keeps its own capacity. A state
    /// restored from a checkpoint therefore remembers as many pairs as it did
    /// when it was created; `memory_size` only sizes the buffer in [`init`].
    ///
    /// Every stored pair has positive curvature, so the two-loop direction is
    /// a descent direction in exact arithmetic. If round-off breaks that, the
    /// history is cleared and the step falls back to steepest descent.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the gradient or the stored history does
    /// not match the dimension of `params`, or if the evaluator returns a
    /// gradient of the wrong length. Evaluator failures are propagated.
    ///
    /// [`init`]: LBFGS::init
    pub fn update<C>(&self, evaluator: &C, state: SolverState<T>) -> Result<SolverState<T>>
    where
        C: CostFunction<T> + ?Sized,
    {
        let SolverState {
            mut params,
            value,
            grad,
            mut history,
            iteration_count,
            mut num_fun_evals,
            mut num_grad_evals,
            last_step,
            ..
        } = state;

        if grad.len() != params.len() {
            return Err(OptimizerError::dimension_mismatch(params.len(), grad.len()));
        }
        if let Some(dim) = history.dimension() {
            if dim != params.len() {
                return Err(OptimizerError::dimension_mismatch(params.len(), dim));
            }
        }

        if grad.iter().all(|g| *g == T::zero()) {
            log::debug!("L-BFGS iteration {}: stationary point, zero step", iteration_count + 1);
            let line_search = LineSearchState::stationary(value, grad.clone());
            return Ok(SolverState {
                params,
                value,
                grad,
                history,
                iteration_count: iteration_count + 1,
                last_line_search: Some(line_search),
                num_fun_evals,
                num_grad_evals,
                last_step,
            });
        }

        let mut direction = self.preconditioner.apply(&history, &grad);
        if !(direction.dot(&grad) < T::zero()) {
            log::debug!(
                "L-BFGS iteration {}: direction is not a descent direction, resetting {} stored pairs",
                iteration_count + 1,
                history.len(),
            );
            history.clear();
            direction = -&grad;
        }

        let line_search =
            self.config
                .line_search
                .search(evaluator, &params, value, &grad, &direction, last_step)?;
        num_fun_evals += line_search.num_evals;
        num_grad_evals += line_search.num_grad_evals;

        let mut position_delta = &direction * line_search.step;
        let mut trial = &params + &position_delta;
        let (mut new_value, mut new_grad) = match line_search.grad.as_ref() {
            Some(g) => (line_search.value, g.clone()),
            None => {
                num_fun_evals += 1;
                num_grad_evals += 1;
                evaluator.cost_and_gradient(&trial)?
            }
        };
        if new_grad.len() != params.len() {
            return Err(OptimizerError::dimension_mismatch(params.len(), new_grad.len()));
        }

        if !<T as Float>::is_finite(new_value) || !types::all_finite(&new_grad) {
            log::debug!(
                "L-BFGS iteration {}: non-finite objective at step {:.3e}, holding position",
                iteration_count + 1,
                <T as Scalar>::to_f64(line_search.step),
            );
            position_delta.fill(T::zero());
            trial.copy_from(&params);
            new_value = value;
            new_grad.copy_from(&grad);
        }

        let gradient_delta = &new_grad - &grad;
        if !history.push(position_delta, gradient_delta)? {
            log::trace!(
                "L-BFGS iteration {}: secant pair rejected by curvature condition",
                iteration_count + 1,
            );
        }
        params = trial;

        log::debug!(
            "L-BFGS iteration {}: value = {:.6e}, |grad| = {:.3e}, step = {:.3e}, line search evals = {}{}",
            iteration_count + 1,
            <T as Scalar>::to_f64(new_value),
            <T as Scalar>::to_f64(types::norm(&new_grad)),
            <T as Scalar>::to_f64(line_search.step),
            line_search.num_evals,
            if line_search.failed { " (failed)" } else { "" },
        );

        Ok(SolverState {
            params,
            value: new_value,
            grad: new_grad,
            history,
            iteration_count: iteration_count + 1,
            last_step: Some(line_search.step),
            last_line_search: Some(line_search),
            num_fun_evals,
            num_grad_evals,
        })
    }

    /// Minimizes `evaluator` starting from `initial_point`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the criterion does not validate, and
    /// propagates every error of [`init`](Self::init) and
    /// [`update`](Self::update).
    pub fn minimize<C>(
        &self,
        evaluator: &C,
        initial_point: &DVector<T>,
        criterion: &StoppingCriterion<T>,
    ) -> Result<OptimizationResult<T>>
    where
        C: CostFunction<T> + ?Sized,
    {
        self.minimize_with_callback(evaluator, initial_point, criterion, |_| ControlFlow::Continue(()))
    }

    /// Like [`minimize`](Self::minimize), calling `callback` after every
    /// iteration.
    ///
    /// Returning `ControlFlow::Break` stops the run with
    /// [`TerminationReason::CallbackRequest`].
    pub fn minimize_with_callback<C, F>(
        &self,
        evaluator: &C,
        initial_point: &DVector<T>,
        criterion: &StoppingCriterion<T>,
        mut callback: F,
    ) -> Result<OptimizationResult<T>>
    where
        C: CostFunction<T> + ?Sized,
        F: FnMut(&SolverState<T>) -> ControlFlow<()>,
    {
        criterion.validate()?;
        let start_time = Instant::now();
        let mut state = self.init(evaluator, initial_point.clone())?;
        let mut consecutive_failures = 0usize;

        let reason = loop {
            match criterion.status(&state) {
                SolverStatus::Converged => break TerminationReason::Converged,
                SolverStatus::Exhausted => break TerminationReason::MaxIterations,
                SolverStatus::Running => {}
            }

            state = self.update(evaluator, state)?;

            if state.line_search_failed() {
                consecutive_failures += 1;
            } else {
                consecutive_failures = 0;
            }
            if criterion
                .max_consecutive_line_search_failures
                .is_some_and(|limit| consecutive_failures >= limit)
            {
                break TerminationReason::LineSearchFailed;
            }

            if callback(&state).is_break() {
                break TerminationReason::CallbackRequest;
            }
        };

        let result = OptimizationResult::from_state(state, start_time.elapsed(), reason);
        log::info!(
            "{} finished: {} after {} iterations, value = {:.6e}, |grad| = {:.3e}, {} function and {} gradient evaluations",
            self.name(),
            result.termination_reason,
            result.iterations,
            <T as Scalar>::to_f64(result.value),
            <T as Scalar>::to_f64(result.gradient_norm),
            result.function_evaluations,
            result.gradient_evaluations,
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use secant_core::test_utils::{QuadraticCost, SumOfSquares};

    #[test]
    fn test_config_builder() {
        let config = LBFGSConfig::<f64>::new()
            .with_memory_size(5)
            .with_scale_init_precond(false)
            .with_backtracking(BacktrackingConfig::new().with_max_steps(12));

        assert_eq!(config.memory_size, 5);
        assert!(!config.scale_init_precond);
        assert!(matches!(
            config.line_search,
            LineSearch::Backtracking(ref bt) if bt.max_steps == 12
        ));

        let config = config.with_zoom(ZoomConfig::new());
        assert_eq!(config.line_search.name(), "Zoom");
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = LBFGS::<f64>::new(LBFGSConfig::new().with_memory_size(0)).unwrap_err();
        assert!(matches!(
            err,
            OptimizerError::InvalidConfiguration { ref parameter, .. } if parameter == "memory_size"
        ));

        let err = LBFGS::<f64>::new(
            LBFGSConfig::new().with_zoom(ZoomConfig::new().with_max_steps(0)),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            OptimizerError::InvalidConfiguration { ref parameter, .. } if parameter == "max_steps"
        ));
    }

    #[test]
    fn test_init_counts_one_evaluation() {
        let lbfgs = LBFGS::<f64>::with_default_config();
        let state = lbfgs
            .init(&SumOfSquares, DVector::from_vec(vec![1.0, 2.0]))
            .unwrap();

        assert_eq!(state.iteration_count, 0);
        assert!(state.history.is_empty());
        assert_eq!(state.history.capacity(), 10);
        assert_eq!((state.num_fun_evals, state.num_grad_evals), (1, 1));
        assert_relative_eq!(state.value, 5.0);
        assert_relative_eq!(state.grad, DVector::from_vec(vec![2.0, 4.0]));
    }

    #[test]
    fn test_update_stores_secant_pair() {
        let quadratic = QuadraticCost::diagonal(&[1.0, 10.0]);
        let lbfgs = LBFGS::new(LBFGSConfig::new()).unwrap();
        let state = lbfgs
            .init(&quadratic, DVector::from_vec(vec![1.0, 1.0]))
            .unwrap();
        let before = state.clone();

        let next = lbfgs.update(&quadratic, state).unwrap();
        assert_eq!(next.iteration_count, 1);
        assert_eq!(next.history.len(), 1);
        assert!(next.value < before.value);

        let pair = next.history.newest().unwrap();
        assert_relative_eq!(pair.position_delta, &next.params - &before.params, epsilon = 1e-15);
        assert_relative_eq!(pair.gradient_delta, &next.grad - &before.grad, epsilon = 1e-15);
    }

    #[test]
    fn test_overflowing_history_falls_back_to_steepest_descent() {
        let lbfgs =
            LBFGS::new(LBFGSConfig::new().with_backtracking(BacktrackingConfig::new())).unwrap();
        let mut state = lbfgs
            .init(&SumOfSquares, DVector::from_vec(vec![1.0, -1.0]))
            .unwrap();

        // <s, y> = 2 but <y, y> is subnormal, so the initial scaling overflows
        // and the two-loop direction comes out NaN.
        let stored = state
            .history
            .push(
                DVector::from_element(2, 1e160),
                DVector::from_element(2, 1e-160),
            )
            .unwrap();
        assert!(stored);
        let direction = lbfgs.preconditioner.apply(&state.history, &state.grad);
        assert!(direction.iter().any(|d| d.is_nan()));

        let next = lbfgs.update(&SumOfSquares, state).unwrap();
        assert!(next.value < 2.0);
        assert_eq!(next.history.len(), 1);

        let pair = next.history.newest().unwrap();
        assert!(pair.position_delta[0] < 0.0);
        assert_relative_eq!(pair.position_delta[0], -pair.position_delta[1]);
    }

    #[test]
    fn test_restored_state_keeps_history_capacity() {
        let quadratic = QuadraticCost::diagonal(&[1.0, 4.0, 9.0, 16.0]);
        let small = LBFGS::new(LBFGSConfig::new().with_memory_size(3)).unwrap();
        let large = LBFGS::new(LBFGSConfig::new().with_memory_size(10)).unwrap();

        let mut state = small
            .init(&quadratic, DVector::from_vec(vec![1.0, -1.0, 0.5, 2.0]))
            .unwrap();
        for _ in 0..5 {
            state = large.update(&quadratic, state).unwrap();
        }

        assert_eq!(state.history.capacity(), 3);
        assert!(state.history.len() <= 3);
    }
}
