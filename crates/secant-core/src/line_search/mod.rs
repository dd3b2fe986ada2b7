//! Line search algorithms for quasi-Newton optimization.
//!
//! Given a point `x`, a search direction `d` and the value and gradient at
//! `x`, a line search picks a step length `η` along `d`. Both procedures work
//! on the one-dimensional restriction
//!
//! ```text
//! φ(η) = f(x + η d),        φ'(η) = <∇f(x + η d), d>
//! ```
//!
//! # Conditions
//!
//! ## Armijo Condition (Sufficient Decrease)
//! φ(η) ≤ φ(0) + c₁ η φ'(0)
//!
//! where 0 < c₁ < 1 (typically c₁ = 10⁻⁴).
//!
//! ## Strong Curvature Condition
//! |φ'(η)| ≤ c₂ |φ'(0)|
//!
//! where c₁ < c₂, typically c₂ = 0.9 for quasi-Newton methods. Setting
//! c₂ = ∞ disables the check.
//!
//! # Algorithm Variants
//!
//! ## Backtracking
//! Armijo only. Starts from an initial guess and shrinks geometrically.
//! Evaluates the gradient once, at the accepted point, and only if asked to.
//!
//! ## Zoom
//! Strong Wolfe. A bracketing phase expands the step until an interval
//! containing an acceptable point is known, then a zoom phase shrinks the
//! interval by safeguarded interpolation. Every trial evaluates value and
//! gradient, so the accepted point's gradient comes for free.
//!
//! # Failure Semantics
//!
//! Neither search returns `Err` for numerical reasons. An exhausted budget,
//! an underflowing bracket or a non-descent direction is reported through
//! [`LineSearchState::failed`] and [`LineSearchState::termination`]. Only
//! evaluator errors and dimension mismatches propagate.

pub mod backtracking;
pub mod zoom;

pub use backtracking::BacktrackingConfig;
pub use zoom::ZoomConfig;

use crate::{
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
use num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy for the first trial step of a line search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InitialGuess {
    /// Always start from `η = 1`
    #[default]
    One,
    /// Start from the previously accepted step times `increase_factor`
    Keep,
}

impl InitialGuess {
    /// Computes the first trial step.
    ///
    /// `Keep` falls back to 1 when there is no usable previous step. The
    /// result never exceeds `max_step`.
    pub fn initial_step<T: Scalar>(self, previous: Option<T>, increase_factor: T, max_step: T) -> T {
        let guess = match self {
            InitialGuess::One => T::one(),
            InitialGuess::Keep => previous
                .filter(|s| *s > T::zero() && <T as Float>::is_finite(*s))
                .map(|s| s * increase_factor)
                .unwrap_or_else(T::one),
        };
        <T as Float>::min(guess, max_step)
    }
}

/// One evaluated point on the search line.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BracketPoint<T> {
    /// Step length `η`
    pub step: T,
    /// `φ(η)`
    pub value: T,
    /// `φ'(η)`
    pub slope: T,
}

/// Why a line search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LineSearchTermination {
    /// A step satisfying the search's conditions was found.
    Accepted,
    /// The evaluation budget ran out.
    MaxStepsReached,
    /// The bracket shrank below machine precision.
    IntervalUnderflow,
    /// Expansion hit the step upper bound without meeting the conditions.
    StepBoundReached,
}

impl fmt::Display for LineSearchTermination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineSearchTermination::Accepted => write!(f, "Accepted"),
            LineSearchTermination::MaxStepsReached => write!(f, "Maximum evaluations reached"),
            LineSearchTermination::IntervalUnderflow => write!(f, "Bracket width underflow"),
            LineSearchTermination::StepBoundReached => write!(f, "Step upper bound reached"),
        }
    }
}

/// Extra information recorded when a search runs with `verbose` set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineSearchDiagnostics<T> {
    /// `φ'(0)`
    pub initial_slope: T,
    /// Every trial step, in evaluation order
    pub trial_steps: Vec<T>,
    /// Termination reason
    pub reason: LineSearchTermination,
}

/// Outcome of one line search invocation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "T: Scalar + Serialize",
        deserialize = "T: Scalar + Deserialize<'de>"
    ))
)]
pub struct LineSearchState<T: Scalar> {
    /// Returned step length
    pub step: T,
    /// Objective value at `x + step·d`
    pub value: T,
    /// Gradient at `x + step·d`, if the search computed it
    pub grad: Option<DVector<T>>,
    /// Low end of the last bracket (zoom only)
    pub lo: Option<BracketPoint<T>>,
    /// High end of the last bracket (zoom only)
    pub hi: Option<BracketPoint<T>>,
    /// Number of objective evaluations
    pub num_evals: usize,
    /// Number of gradient evaluations
    pub num_grad_evals: usize,
    /// True if no acceptable step was found
    pub failed: bool,
    /// Termination reason
    pub termination: LineSearchTermination,
    /// Present only when the search ran with `verbose`
    pub diagnostics: Option<LineSearchDiagnostics<T>>,
}

impl<T: Scalar> LineSearchState<T> {
    /// A zero step at the starting point, with no evaluations spent.
    ///
    /// Used when the gradient vanishes and there is nothing to search.
    pub fn stationary(value: T, grad: DVector<T>) -> Self {
        Self {
            step: T::zero(),
            value,
            grad: Some(grad),
            lo: None,
            hi: None,
            num_evals: 0,
            num_grad_evals: 0,
            failed: false,
            termination: LineSearchTermination::Accepted,
            diagnostics: None,
        }
    }
}

/// Line search selection with its configuration.
///
/// The set of supported searches is closed, so this is an enum rather than
/// a trait object.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "T: Scalar + Serialize",
        deserialize = "T: Scalar + Deserialize<'de>"
    ))
)]
pub enum LineSearch<T: Scalar> {
    /// Armijo backtracking
    Backtracking(BacktrackingConfig<T>),
    /// Strong Wolfe bracketing and zoom
    Zoom(ZoomConfig<T>),
}

impl<T: Scalar> Default for LineSearch<T> {
    fn default() -> Self {
        LineSearch::Zoom(ZoomConfig::default())
    }
}

impl<T: Scalar> LineSearch<T> {
    /// Human-readable name of the selected search.
    pub fn name(&self) -> &'static str {
        match self {
            LineSearch::Backtracking(_) => "Backtracking",
            LineSearch::Zoom(_) => "Zoom",
        }
    }

    /// Validates the selected configuration.
    pub fn validate(&self) -> Result<()> {
        match self {
            LineSearch::Backtracking(config) => config.validate(),
            LineSearch::Zoom(config) => config.validate(),
        }
    }

    /// Whether the accepted point's gradient is always part of the result.
    pub fn returns_gradient(&self) -> bool {
        match self {
            LineSearch::Backtracking(config) => config.store_grad,
            LineSearch::Zoom(_) => true,
        }
    }

    /// Runs the selected search from `point` along `direction`.
    ///
    /// `previous_step` feeds the [`InitialGuess::Keep`] policy.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vectors disagree in length, and
    /// propagates evaluator failures.
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
        match self {
            LineSearch::Backtracking(config) => {
                config.search(evaluator, point, value, gradient, direction, previous_step)
            }
            LineSearch::Zoom(config) => {
                config.search(evaluator, point, value, gradient, direction, previous_step)
            }
        }
    }
}

impl<T: Scalar> From<BacktrackingConfig<T>> for LineSearch<T> {
    fn from(config: BacktrackingConfig<T>) -> Self {
        LineSearch::Backtracking(config)
    }
}

impl<T: Scalar> From<ZoomConfig<T>> for LineSearch<T> {
    fn from(config: ZoomConfig<T>) -> Self {
        LineSearch::Zoom(config)
    }
}

/// Armijo test `φ(η) ≤ φ(0) + c₁ η φ'(0)`. NaN values never pass.
pub(crate) fn sufficient_decrease<T: Scalar>(value: T, value0: T, c1: T, step: T, slope0: T) -> bool {
    value <= value0 + c1 * step * slope0
}

pub(crate) fn check_dimensions<T: Scalar>(
    point: &DVector<T>,
    gradient: &DVector<T>,
    direction: &DVector<T>,
) -> Result<()> {
    if gradient.len() != point.len() {
        return Err(OptimizerError::dimension_mismatch(point.len(), gradient.len()));
    }
    if direction.len() != point.len() {
        return Err(OptimizerError::dimension_mismatch(point.len(), direction.len()));
    }
    Ok(())
}

/// Evaluates the objective along `x + η d` and keeps the bookkeeping.
pub(crate) struct Probe<'a, C: ?Sized, T: Scalar> {
    evaluator: &'a C,
    origin: &'a DVector<T>,
    direction: &'a DVector<T>,
    trial: DVector<T>,
    pub(crate) num_evals: usize,
    pub(crate) num_grad_evals: usize,
    trial_steps: Option<Vec<T>>,
}

impl<'a, C, T> Probe<'a, C, T>
where
    C: CostFunction<T> + ?Sized,
    T: Scalar,
{
    pub(crate) fn new(
        evaluator: &'a C,
        origin: &'a DVector<T>,
        direction: &'a DVector<T>,
        record_steps: bool,
    ) -> Self {
        Self {
            evaluator,
            origin,
            direction,
            trial: origin.clone(),
            num_evals: 0,
            num_grad_evals: 0,
            trial_steps: record_steps.then(Vec::new),
        }
    }

    fn move_to(&mut self, step: T) {
        self.trial.copy_from(self.origin);
        self.trial.axpy(step, self.direction, T::one());
    }

    fn record(&mut self, step: T) {
        if let Some(steps) = self.trial_steps.as_mut() {
            steps.push(step);
        }
    }

    /// `φ(η)`, one objective evaluation.
    pub(crate) fn value(&mut self, step: T) -> Result<T> {
        self.move_to(step);
        self.record(step);
        self.num_evals += 1;
        self.evaluator.cost(&self.trial)
    }

    /// `∇f(x + η d)` alone, counted as one gradient evaluation.
    pub(crate) fn gradient(&mut self, step: T) -> Result<DVector<T>> {
        self.move_to(step);
        self.num_grad_evals += 1;
        self.evaluator.gradient(&self.trial)
    }

    /// `φ(η)`, `φ'(η)` and the full gradient.
    pub(crate) fn value_and_slope(&mut self, step: T) -> Result<(BracketPoint<T>, DVector<T>)> {
        self.move_to(step);
        self.record(step);
        self.num_evals += 1;
        self.num_grad_evals += 1;
        let (value, grad) = self.evaluator.cost_and_gradient(&self.trial)?;
        if grad.len() != self.direction.len() {
            return Err(OptimizerError::dimension_mismatch(self.direction.len(), grad.len()));
        }
        let slope = grad.dot(self.direction);
        Ok((BracketPoint { step, value, slope }, grad))
    }

    pub(crate) fn diagnostics(
        &mut self,
        initial_slope: T,
        reason: LineSearchTermination,
    ) -> Option<LineSearchDiagnostics<T>> {
        self.trial_steps.take().map(|trial_steps| LineSearchDiagnostics {
            initial_slope,
            trial_steps,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_guess_policies() {
        assert_eq!(InitialGuess::One.initial_step(Some(0.25), 2.0, f64::INFINITY), 1.0);
        assert_eq!(InitialGuess::Keep.initial_step(Some(0.25), 2.0, f64::INFINITY), 0.5);
        assert_eq!(InitialGuess::Keep.initial_step(Some(0.75), 2.0, 1.0), 1.0);
        assert_eq!(InitialGuess::Keep.initial_step::<f64>(None, 2.0, 10.0), 1.0);
        assert_eq!(InitialGuess::Keep.initial_step(Some(0.0), 2.0, 10.0), 1.0);
        assert_eq!(InitialGuess::One.initial_step(None, 1.0, 0.5), 0.5);
    }

    #[test]
    fn test_sufficient_decrease_rejects_nan() {
        assert!(sufficient_decrease(0.5, 1.0, 1e-4, 1.0, -1.0));
        assert!(!sufficient_decrease(1.0, 1.0, 1e-4, 1.0, -1.0));
        assert!(!sufficient_decrease(f64::NAN, 1.0, 1e-4, 1.0, -1.0));
    }

    #[test]
    fn test_default_is_zoom() {
        let search = LineSearch::<f64>::default();
        assert_eq!(search.name(), "Zoom");
        assert!(search.returns_gradient());

        let search: LineSearch<f64> = BacktrackingConfig::new().with_store_grad(false).into();
        assert_eq!(search.name(), "Backtracking");
        assert!(!search.returns_gradient());
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(LineSearchTermination::Accepted.to_string(), "Accepted");
        assert_eq!(
            LineSearchTermination::IntervalUnderflow.to_string(),
            "Bracket width underflow"
        );
    }
}
