//! Evaluator interface for optimization algorithms.
//!
//! The solver treats the objective as an opaque oracle: given a point it
//! returns the value and, on request, the gradient. Nothing beyond first
//! order is ever asked for.
//!
//! # Design Philosophy
//!
//! - Separate value-only and value-with-gradient entry points so the
//!   backtracking line search can avoid gradient work on rejected trials
//! - Central finite differences as a fallback when no analytic gradient exists
//! - Wrappers for counting and caching compose around any implementation

use crate::{
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
use num_traits::Float;
use std::cell::Cell;
use std::fmt::Debug;

/// Trait for objective functions minimized by the solver.
///
/// Implementations must be deterministic: evaluating twice at the same
/// point returns the same result.
pub trait CostFunction<T>: Debug
where
    T: Scalar,
{
    /// Evaluates the objective at a point.
    fn cost(&self, point: &DVector<T>) -> Result<T>;

    /// Evaluates the objective and its gradient at a point.
    ///
    /// # Default Implementation
    ///
    /// Uses central finite differences to approximate the gradient if not
    /// overridden.
    fn cost_and_gradient(&self, point: &DVector<T>) -> Result<(T, DVector<T>)> {
        let cost = self.cost(point)?;
        let gradient = self.gradient_fd(point)?;
        Ok((cost, gradient))
    }

    /// Computes only the gradient at a point.
    ///
    /// # Default Implementation
    ///
    /// Calls `cost_and_gradient` and discards the cost value.
    fn gradient(&self, point: &DVector<T>) -> Result<DVector<T>> {
        self.cost_and_gradient(point).map(|(_, grad)| grad)
    }

    /// Computes the gradient using central finite differences.
    ///
    /// Costs `2n` evaluations of [`cost`](Self::cost).
    fn gradient_fd(&self, point: &DVector<T>) -> Result<DVector<T>> {
        let n = point.len();
        let mut gradient = DVector::zeros(n);
        let h = <T as Float>::cbrt(T::EPSILON);
        let mut shifted = point.clone();

        for i in 0..n {
            let xi = point[i];
            let step = h * <T as Float>::max(T::one(), <T as Float>::abs(xi));

            shifted[i] = xi + step;
            let f_plus = self.cost(&shifted)?;
            shifted[i] = xi - step;
            let f_minus = self.cost(&shifted)?;
            shifted[i] = xi;

            gradient[i] = (f_plus - f_minus) / (step + step);
        }

        Ok(gradient)
    }
}

impl<T, C> CostFunction<T> for &C
where
    T: Scalar,
    C: CostFunction<T> + ?Sized,
{
    fn cost(&self, point: &DVector<T>) -> Result<T> {
        (**self).cost(point)
    }

    fn cost_and_gradient(&self, point: &DVector<T>) -> Result<(T, DVector<T>)> {
        (**self).cost_and_gradient(point)
    }

    fn gradient(&self, point: &DVector<T>) -> Result<DVector<T>> {
        (**self).gradient(point)
    }
}

/// Wrapper to count function evaluations for testing and debugging.
///
/// `cost_and_gradient` counts as one cost and one gradient evaluation.
#[derive(Debug)]
pub struct CountingCostFunction<F> {
    /// The underlying cost function
    pub inner: F,
    cost_count: Cell<usize>,
    gradient_count: Cell<usize>,
}

impl<F> CountingCostFunction<F> {
    /// Creates a new counting wrapper around a cost function.
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            cost_count: Cell::new(0),
            gradient_count: Cell::new(0),
        }
    }

    /// Resets all counters to zero.
    pub fn reset_counts(&self) {
        self.cost_count.set(0);
        self.gradient_count.set(0);
    }

    /// Returns the current evaluation counts as `(cost, gradient)`.
    pub fn counts(&self) -> (usize, usize) {
        (self.cost_count.get(), self.gradient_count.get())
    }
}

impl<F, T> CostFunction<T> for CountingCostFunction<F>
where
    F: CostFunction<T>,
    T: Scalar,
{
    fn cost(&self, point: &DVector<T>) -> Result<T> {
        self.cost_count.set(self.cost_count.get() + 1);
        self.inner.cost(point)
    }

    fn cost_and_gradient(&self, point: &DVector<T>) -> Result<(T, DVector<T>)> {
        self.cost_count.set(self.cost_count.get() + 1);
        self.gradient_count.set(self.gradient_count.get() + 1);
        self.inner.cost_and_gradient(point)
    }

    fn gradient(&self, point: &DVector<T>) -> Result<DVector<T>> {
        self.gradient_count.set(self.gradient_count.get() + 1);
        self.inner.gradient(point)
    }
}

/// Utilities for checking gradient implementations.
pub struct DerivativeChecker;

impl DerivativeChecker {
    /// Checks if the gradient implementation matches finite differences.
    ///
    /// Returns `(passes, max_error)` where `max_error` is the largest
    /// component-wise deviation relative to `max(1, |g_i|)`.
    pub fn check_gradient<T, C>(cost_fn: &C, point: &DVector<T>, tol: T) -> Result<(bool, T)>
    where
        T: Scalar,
        C: CostFunction<T> + ?Sized,
    {
        let analytical_grad = cost_fn.gradient(point)?;
        let fd_grad = cost_fn.gradient_fd(point)?;

        if analytical_grad.len() != fd_grad.len() {
            return Err(OptimizerError::dimension_mismatch(
                fd_grad.len(),
                analytical_grad.len(),
            ));
        }

        let max_error = analytical_grad
            .iter()
            .zip(fd_grad.iter())
            .map(|(a, f)| {
                let scale = <T as Float>::max(T::one(), <T as Float>::abs(*a));
                <T as Float>::abs(*a - *f) / scale
            })
            .fold(T::zero(), |a, b| <T as Float>::max(a, b));

        Ok((max_error < tol, max_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Debug)]
    struct ValueOnly;

    impl CostFunction<f64> for ValueOnly {
        fn cost(&self, point: &DVector<f64>) -> Result<f64> {
            Ok(point.iter().enumerate().map(|(i, x)| (i as f64 + 1.0) * x * x).sum())
        }
    }

    #[test]
    fn test_finite_difference_fallback() {
        let point = DVector::from_vec(vec![1.0, -2.0, 0.5]);
        let (value, grad) = ValueOnly.cost_and_gradient(&point).unwrap();

        assert_relative_eq!(value, 1.0 + 8.0 + 0.75);
        assert_relative_eq!(grad[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(grad[1], -8.0, epsilon = 1e-6);
        assert_relative_eq!(grad[2], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_counting_wrapper() {
        let counted = CountingCostFunction::new(ValueOnly);
        let point = DVector::from_vec(vec![1.0, 1.0]);

        counted.cost(&point).unwrap();
        counted.cost(&point).unwrap();
        counted.cost_and_gradient(&point).unwrap();
        assert_eq!(counted.counts(), (3, 1));

        counted.reset_counts();
        assert_eq!(counted.counts(), (0, 0));
    }

    #[test]
    fn test_reference_forwarding() {
        let inner = ValueOnly;
        let by_ref = &inner;
        let point = DVector::from_vec(vec![2.0]);
        assert_relative_eq!(by_ref.cost(&point).unwrap(), 4.0);
    }
}
