//! Strong Wolfe line search by bracketing and zoom.
//!
//! Finds a step `η` satisfying
//!
//! ```text
//! φ(η) ≤ φ(0) + c₁ η φ'(0)          (sufficient decrease)
//! |φ'(η)| ≤ curv_rtol |φ'(0)|       (strong curvature)
//! ```
//!
//! # Bracketing
//!
//! Trial steps grow from the initial guess until one of:
//! - sufficient decrease fails, or the value stops decreasing: the
//!   acceptable region lies in `[prev, cur]`
//! - both conditions hold: done
//! - the slope turns non-negative: the acceptable region lies in `[cur, prev]`
//!
//! Otherwise the next trial is a cubic extrapolation clamped to
//! `[cur + 0.01 (cur - prev), min(10 cur, max_step)]`.
//!
//! # Zoom
//!
//! The bracket `[lo, hi]` keeps the invariant that `lo` satisfies sufficient
//! decrease with the lowest value seen and `φ'(lo) (hi - lo) < 0`. Each trial
//! is the minimizer of the cubic through both endpoints (values and slopes),
//! else of the quadratic through `lo`'s value and slope and `hi`'s value.
//! A trial that lands within `0.1 w` of either end, or outside the bracket,
//! is replaced by the midpoint, so the bracket shrinks by at least a
//! constant factor per evaluation.
//!
//! # References
//!
//! - Nocedal & Wright, "Numerical Optimization" (2006), Algorithms 3.5 and 3.6

use super::{
    check_dimensions, sufficient_decrease, BracketPoint, InitialGuess, LineSearchState,
    LineSearchTermination, Probe,
};
use crate::{
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
use num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fraction of the bracket width kept clear of either endpoint.
const SAFEGUARD: f64 = 0.1;
/// Smallest relative extension of an expanding trial.
const EXTRAPOLATION_MIN: f64 = 0.01;
/// Largest growth of an expanding trial.
const EXTRAPOLATION_MAX: f64 = 10.0;

/// Configuration for the strong Wolfe zoom line search.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZoomConfig<T> {
    /// Maximum number of value-and-gradient evaluations
    pub max_steps: usize,
    /// Armijo constant `c₁ ∈ (0, 1)`
    pub c1: T,
    /// Curvature constant; `∞` disables the curvature check
    pub curv_rtol: T,
    /// First trial step policy
    pub initial_guess: InitialGuess,
    /// Growth applied to the previous step under [`InitialGuess::Keep`]
    pub increase_factor: T,
    /// Upper bound on every trial step
    pub max_step: T,
    /// Record diagnostics and warn on failure
    pub verbose: bool,
}

impl<T: Scalar> Default for ZoomConfig<T> {
    fn default() -> Self {
        Self {
            max_steps: 30,
            c1: <T as Scalar>::from_f64(1e-4),
            curv_rtol: <T as Scalar>::from_f64(0.9),
            initial_guess: InitialGuess::One,
            increase_factor: T::one(),
            max_step: <T as Float>::infinity(),
            verbose: false,
        }
    }
}

impl<T: Scalar> ZoomConfig<T> {
    /// Creates a configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of evaluations.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the Armijo constant.
    pub fn with_c1(mut self, c1: T) -> Self {
        self.c1 = c1;
        self
    }

    /// Sets the curvature constant. Use `T::infinity()` to disable the check.
    pub fn with_curv_rtol(mut self, curv_rtol: T) -> Self {
        self.curv_rtol = curv_rtol;
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

    /// Sets the upper bound on trial steps.
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
    /// - `c1 ∉ (0, 1)`
    /// - `curv_rtol ≤ c1`
    /// - `increase_factor` or `max_step` is not positive
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(OptimizerError::invalid_configuration(
                "must allow at least one evaluation",
                "max_steps",
                self.max_steps,
            ));
        }
        if !(self.c1 > T::zero() && self.c1 < T::one()) {
            return Err(OptimizerError::invalid_configuration(
                "must be in (0, 1)",
                "c1",
                self.c1,
            ));
        }
        if !(self.curv_rtol > self.c1) {
            return Err(OptimizerError::invalid_configuration(
                "must be greater than c1",
                "curv_rtol",
                self.curv_rtol,
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

    fn curvature_holds(&self, slope: T, slope0: T) -> bool {
        <T as Float>::is_infinite(self.curv_rtol)
            || <T as Float>::abs(slope) <= self.curv_rtol * <T as Float>::abs(slope0)
    }

    /// Next trial of the bracketing phase, or `cur.step` if `max_step` leaves
    /// no room to grow.
    fn extrapolate(&self, prev: &BracketPoint<T>, cur: &BracketPoint<T>) -> T {
        let upper = <T as Float>::min(
            <T as Scalar>::from_f64(EXTRAPOLATION_MAX) * cur.step,
            self.max_step,
        );
        if upper <= cur.step {
            return cur.step;
        }
        let lower = cur.step + <T as Scalar>::from_f64(EXTRAPOLATION_MIN) * (cur.step - prev.step);
        let lower = <T as Float>::min(lower, upper);

        match cubic_minimizer(prev, cur) {
            Some(t) if t > cur.step => <T as Float>::max(<T as Float>::min(t, upper), lower),
            _ => upper,
        }
    }

    /// Runs the search from `point` along `direction`.
    ///
    /// Value and gradient are evaluated together at every trial. The
    /// returned state always carries the gradient at the returned step.
    ///
    /// On failure the lowest-valued trial satisfying sufficient decrease is
    /// returned, or the starting point with `step = 0` if there is none.
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
        let start = BracketPoint {
            step: T::zero(),
            value,
            slope: slope0,
        };
        let mut probe = Probe::new(evaluator, point, direction, self.verbose);
        let mut best: Option<(BracketPoint<T>, DVector<T>)> = None;

        let mut prev = start;
        let mut step = self
            .initial_guess
            .initial_step(previous_step, self.increase_factor, self.max_step);

        let (mut lo, mut hi) = loop {
            if probe.num_evals >= self.max_steps {
                return Ok(self.failure(
                    &mut probe,
                    start,
                    gradient,
                    best,
                    None,
                    None,
                    LineSearchTermination::MaxStepsReached,
                ));
            }

            let (cur, grad) = probe.value_and_slope(step)?;
            let decreased = sufficient_decrease(cur.value, value, self.c1, cur.step, slope0);

            if !decreased || (probe.num_evals > 1 && cur.value >= prev.value) {
                if decreased {
                    keep_best(&mut best, cur, grad);
                }
                break (prev, cur);
            }
            if self.curvature_holds(cur.slope, slope0) {
                return Ok(self.accept(&mut probe, cur, grad, None, None, slope0));
            }
            keep_best(&mut best, cur, grad);
            if cur.slope >= T::zero() {
                break (cur, prev);
            }

            let next = self.extrapolate(&prev, &cur);
            if next <= cur.step {
                return Ok(self.failure(
                    &mut probe,
                    start,
                    gradient,
                    best,
                    Some(prev),
                    Some(cur),
                    LineSearchTermination::StepBoundReached,
                ));
            }
            prev = cur;
            step = next;
        };

        loop {
            if probe.num_evals >= self.max_steps {
                return Ok(self.failure(
                    &mut probe,
                    start,
                    gradient,
                    best,
                    Some(lo),
                    Some(hi),
                    LineSearchTermination::MaxStepsReached,
                ));
            }
            if interval_underflow(lo.step, hi.step) {
                return Ok(self.failure(
                    &mut probe,
                    start,
                    gradient,
                    best,
                    Some(lo),
                    Some(hi),
                    LineSearchTermination::IntervalUnderflow,
                ));
            }

            let (cur, grad) = probe.value_and_slope(interpolate(&lo, &hi))?;
            let decreased = sufficient_decrease(cur.value, value, self.c1, cur.step, slope0);

            if !decreased || cur.value >= lo.value {
                if decreased {
                    keep_best(&mut best, cur, grad);
                }
                hi = cur;
                continue;
            }
            if self.curvature_holds(cur.slope, slope0) {
                return Ok(self.accept(&mut probe, cur, grad, Some(lo), Some(hi), slope0));
            }
            keep_best(&mut best, cur, grad);
            if cur.slope * (hi.step - lo.step) >= T::zero() {
                hi = lo;
            }
            lo = cur;
        }
    }

    fn accept<C>(
        &self,
        probe: &mut Probe<'_, C, T>,
        point: BracketPoint<T>,
        grad: DVector<T>,
        lo: Option<BracketPoint<T>>,
        hi: Option<BracketPoint<T>>,
        slope0: T,
    ) -> LineSearchState<T>
    where
        C: CostFunction<T> + ?Sized,
    {
        LineSearchState {
            step: point.step,
            value: point.value,
            grad: Some(grad),
            lo,
            hi,
            num_evals: probe.num_evals,
            num_grad_evals: probe.num_grad_evals,
            failed: false,
            termination: LineSearchTermination::Accepted,
            diagnostics: probe.diagnostics(slope0, LineSearchTermination::Accepted),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn failure<C>(
        &self,
        probe: &mut Probe<'_, C, T>,
        start: BracketPoint<T>,
        grad0: &DVector<T>,
        best: Option<(BracketPoint<T>, DVector<T>)>,
        lo: Option<BracketPoint<T>>,
        hi: Option<BracketPoint<T>>,
        termination: LineSearchTermination,
    ) -> LineSearchState<T>
    where
        C: CostFunction<T> + ?Sized,
    {
        let diagnostics = probe.diagnostics(start.slope, termination);
        if let Some(diag) = diagnostics.as_ref() {
            log::warn!(
                "Zoom line search failed: {} (initial slope {:.3e}, {} evaluations, trial steps {:?})",
                termination,
                <T as Scalar>::to_f64(diag.initial_slope),
                probe.num_evals,
                diag.trial_steps,
            );
        }

        let (point, grad) = best.unwrap_or_else(|| (start, grad0.clone()));
        LineSearchState {
            step: point.step,
            value: point.value,
            grad: Some(grad),
            lo,
            hi,
            num_evals: probe.num_evals,
            num_grad_evals: probe.num_grad_evals,
            failed: true,
            termination,
            diagnostics,
        }
    }
}

fn keep_best<T: Scalar>(
    best: &mut Option<(BracketPoint<T>, DVector<T>)>,
    point: BracketPoint<T>,
    grad: DVector<T>,
) {
    if best.as_ref().map_or(true, |(b, _)| point.value < b.value) {
        *best = Some((point, grad));
    }
}

/// True once the bracket can no longer be split in floating point.
fn interval_underflow<T: Scalar>(a: T, b: T) -> bool {
    let width = <T as Float>::abs(b - a);
    let scale = <T as Float>::max(<T as Float>::abs(a), <T as Float>::abs(b));
    width <= T::EPSILON * scale || width < <T as Float>::min_positive_value()
}

/// Safeguarded trial step inside the bracket.
fn interpolate<T: Scalar>(lo: &BracketPoint<T>, hi: &BracketPoint<T>) -> T {
    let a = <T as Float>::min(lo.step, hi.step);
    let b = <T as Float>::max(lo.step, hi.step);
    let width = b - a;
    let margin = <T as Scalar>::from_f64(SAFEGUARD) * width;

    match cubic_minimizer(lo, hi).or_else(|| quadratic_minimizer(lo, hi)) {
        Some(t) if t >= a + margin && t <= b - margin => t,
        _ => a + width * <T as Scalar>::from_f64(0.5),
    }
}

/// Minimizer of the cubic matching values and slopes at both points.
fn cubic_minimizer<T: Scalar>(p: &BracketPoint<T>, q: &BracketPoint<T>) -> Option<T> {
    let (a, b) = if p.step <= q.step { (p, q) } else { (q, p) };
    let h = b.step - a.step;
    if !(h > T::zero()) {
        return None;
    }

    let three = <T as Scalar>::from_f64(3.0);
    let two = <T as Scalar>::from_f64(2.0);
    let d1 = a.slope + b.slope - three * (b.value - a.value) / h;
    let discriminant = d1 * d1 - a.slope * b.slope;
    if !(discriminant >= T::zero()) {
        return None;
    }
    let d2 = <T as Float>::sqrt(discriminant);
    let t = b.step - h * (b.slope + d2 - d1) / (b.slope - a.slope + two * d2);
    <T as Float>::is_finite(t).then_some(t)
}

/// Minimizer of the quadratic through `lo`'s value and slope and `hi`'s value.
fn quadratic_minimizer<T: Scalar>(lo: &BracketPoint<T>, hi: &BracketPoint<T>) -> Option<T> {
    let h = hi.step - lo.step;
    if h == T::zero() {
        return None;
    }
    let curvature = (hi.value - lo.value - lo.slope * h) / (h * h);
    if !(curvature > T::zero()) {
        return None;
    }
    let t = lo.step - lo.slope / (<T as Scalar>::from_f64(2.0) * curvature);
    <T as Float>::is_finite(t).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_function::CountingCostFunction;
    use approx::assert_relative_eq;

    #[derive(Debug)]
    struct HalfSquaredNorm;

    impl CostFunction<f64> for HalfSquaredNorm {
        fn cost(&self, x: &DVector<f64>) -> Result<f64> {
            Ok(0.5 * x.dot(x))
        }

        fn cost_and_gradient(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>)> {
            Ok((0.5 * x.dot(x), x.clone()))
        }
    }

    fn start() -> (DVector<f64>, f64, DVector<f64>) {
        let x = DVector::from_vec(vec![2.0, -1.0, 0.5, 3.0]);
        let value = 0.5 * x.dot(&x);
        let grad = x.clone();
        (x, value, grad)
    }

    fn assert_strong_wolfe(
        result: &LineSearchState<f64>,
        value0: f64,
        slope0: f64,
        direction: &DVector<f64>,
        config: &ZoomConfig<f64>,
    ) {
        assert!(!result.failed);
        assert!(result.value <= value0 + config.c1 * result.step * slope0);
        let slope = result.grad.as_ref().unwrap().dot(direction);
        assert!(slope.abs() <= config.curv_rtol * slope0.abs());
    }

    #[test]
    fn test_validate() {
        assert!(ZoomConfig::<f64>::new().validate().is_ok());
        assert!(ZoomConfig::<f64>::new()
            .with_curv_rtol(f64::INFINITY)
            .validate()
            .is_ok());
        assert!(ZoomConfig::<f64>::new().with_max_steps(0).validate().is_err());
        assert!(ZoomConfig::<f64>::new().with_c1(1.0).validate().is_err());
        assert!(ZoomConfig::<f64>::new().with_curv_rtol(1e-5).validate().is_err());
        assert!(ZoomConfig::<f64>::new().with_max_step(-1.0).validate().is_err());
    }

    #[test]
    fn test_steepest_descent_on_quadratic() {
        let (x, value, grad) = start();
        let direction = -&grad;
        let config = ZoomConfig::new();
        let counted = CountingCostFunction::new(HalfSquaredNorm);

        let result = config
            .search(&counted, &x, value, &grad, &direction, None)
            .unwrap();

        assert_strong_wolfe(&result, value, direction.dot(&grad), &direction, &config);
        assert_eq!(result.step, 1.0);
        assert_eq!(result.num_evals, 1);
        assert_eq!(counted.counts(), (1, 1));
    }

    #[test]
    fn test_short_direction_expands() {
        // φ(η) = 0.5 (1 - η/20)^2 |x|^2, minimized at η = 20
        let (x, value, grad) = start();
        let direction = &grad * -0.05;
        let config = ZoomConfig::new();

        let result = config
            .search(&HalfSquaredNorm, &x, value, &grad, &direction, None)
            .unwrap();

        assert_strong_wolfe(&result, value, direction.dot(&grad), &direction, &config);
        assert!(result.step > 1.0);
        assert_eq!(result.num_evals, 2);
    }

    #[test]
    fn test_long_direction_zooms_to_minimizer() {
        // φ(η) = 0.5 (1 - 4η)^2 |x|^2, minimized at η = 0.25
        let (x, value, grad) = start();
        let direction = &grad * -4.0;
        let config = ZoomConfig::new().with_verbose(true);

        let result = config
            .search(&HalfSquaredNorm, &x, value, &grad, &direction, None)
            .unwrap();

        assert_strong_wolfe(&result, value, direction.dot(&grad), &direction, &config);
        assert_relative_eq!(result.step, 0.25, epsilon = 1e-12);
        assert!(result.lo.is_some() && result.hi.is_some());

        let diagnostics = result.diagnostics.unwrap();
        assert_eq!(diagnostics.reason, LineSearchTermination::Accepted);
        assert_eq!(diagnostics.trial_steps.len(), result.num_evals);
        assert_eq!(diagnostics.trial_steps[0], 1.0);
    }

    #[test]
    fn test_ascent_direction_returns_start_point() {
        let (x, value, grad) = start();
        let config = ZoomConfig::new().with_max_steps(5).with_verbose(true);

        let result = config
            .search(&HalfSquaredNorm, &x, value, &grad, &grad, None)
            .unwrap();

        assert!(result.failed);
        assert_eq!(result.termination, LineSearchTermination::MaxStepsReached);
        assert_eq!(result.num_evals, 5);
        assert_eq!(result.step, 0.0);
        assert_eq!(result.value, value);
        assert_eq!(result.grad.as_ref(), Some(&grad));
        assert_eq!(result.diagnostics.unwrap().trial_steps.len(), 5);
    }

    #[test]
    fn test_step_bound_returns_best_point() {
        let (x, value, grad) = start();
        let direction = &grad * -0.05;
        let config = ZoomConfig::new().with_max_step(1.0);

        let result = config
            .search(&HalfSquaredNorm, &x, value, &grad, &direction, None)
            .unwrap();

        assert!(result.failed);
        assert_eq!(result.termination, LineSearchTermination::StepBoundReached);
        assert_eq!(result.step, 1.0);
        assert!(result.value < value);
        assert_eq!(result.num_evals, 1);
    }

    #[test]
    fn test_disabled_curvature_accepts_first_decrease() {
        let (x, value, grad) = start();
        let direction = &grad * -0.05;
        let config = ZoomConfig::new().with_curv_rtol(f64::INFINITY);

        let result = config
            .search(&HalfSquaredNorm, &x, value, &grad, &direction, None)
            .unwrap();

        assert!(!result.failed);
        assert_eq!(result.step, 1.0);
    }

    #[test]
    fn test_cubic_minimizer_is_exact_on_quadratics() {
        // φ(t) = (t - 0.3)^2
        let a = BracketPoint { step: 0.0, value: 0.09, slope: -0.6 };
        let b = BracketPoint { step: 1.0, value: 0.49, slope: 1.4 };
        assert_relative_eq!(cubic_minimizer(&a, &b).unwrap(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(cubic_minimizer(&b, &a).unwrap(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(quadratic_minimizer(&a, &b).unwrap(), 0.3, epsilon = 1e-12);
        assert_relative_eq!(quadratic_minimizer(&b, &a).unwrap(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolation_safeguard_bisects() {
        // Minimizer at 0.01 sits inside the safeguard margin of [0, 1].
        let lo = BracketPoint { step: 0.0, value: 1e-4, slope: -0.02 };
        let hi = BracketPoint { step: 1.0, value: 0.9801, slope: 1.98 };
        assert_eq!(interpolate(&lo, &hi), 0.5);

        let lo = BracketPoint { step: 0.0, value: 1.0, slope: -1.0 };
        let hi = BracketPoint { step: 1.0, value: f64::INFINITY, slope: f64::NAN };
        assert_eq!(interpolate(&lo, &hi), 0.5);
    }

    #[test]
    fn test_interval_underflow() {
        assert!(!interval_underflow(0.0, 1e-300));
        assert!(interval_underflow(0.0, 0.0));
        assert!(interval_underflow(1.0, 1.0 + f64::EPSILON / 2.0));
        assert!(!interval_underflow(1.0, 1.0 + 1e-10));
    }

    /// f(x) = |x| with a gradient stuck at -1: the slope promises descent
    /// that no positive step delivers.
    #[derive(Debug)]
    struct FalseSlope;

    impl CostFunction<f64> for FalseSlope {
        fn cost(&self, x: &DVector<f64>) -> Result<f64> {
            Ok(x[0].abs())
        }

        fn cost_and_gradient(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>)> {
            Ok((x[0].abs(), DVector::from_element(1, -1.0)))
        }
    }

    #[test]
    fn test_collapsed_bracket_returns_start_point() {
        let x = DVector::from_element(1, 0.0);
        let grad = DVector::from_element(1, -1.0);
        let direction = DVector::from_element(1, 1.0);
        let config = ZoomConfig::new().with_max_steps(5000);

        let result = config
            .search(&FalseSlope, &x, 0.0, &grad, &direction, None)
            .unwrap();

        assert!(result.failed);
        assert_eq!(result.termination, LineSearchTermination::IntervalUnderflow);
        assert!(result.num_evals < 5000);
        assert_eq!(result.step, 0.0);
        assert_eq!(result.value, 0.0);
        assert_eq!(result.grad.as_ref(), Some(&grad));
    }

    #[test]
    fn test_dimension_mismatch() {
        let (x, value, grad) = start();
        let direction = DVector::from_vec(vec![1.0, 2.0]);
        let err = ZoomConfig::new()
            .search(&HalfSquaredNorm, &x, value, &grad, &direction, None)
            .unwrap_err();
        assert_eq!(err, OptimizerError::dimension_mismatch(4, 2));
    }
}
