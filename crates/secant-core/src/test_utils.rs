//! Standard objectives for testing and benchmarking optimizers.
//!
//! All of them implement [`CostFunction`] with analytic gradients. They
//! are available to other crates through the `test-utils` feature.

use crate::{
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
use nalgebra::DMatrix;

/// f(w) = ‖w‖², minimized at the origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumOfSquares;

impl<T: Scalar> CostFunction<T> for SumOfSquares {
    fn cost(&self, point: &DVector<T>) -> Result<T> {
        Ok(point.dot(point))
    }

    fn cost_and_gradient(&self, point: &DVector<T>) -> Result<(T, DVector<T>)> {
        Ok((point.dot(point), point * <T as Scalar>::from_f64(2.0)))
    }
}

/// A simple quadratic cost function for testing.
///
/// Computes f(x) = 0.5 * x^T * A * x + b^T * x
#[derive(Debug, Clone)]
pub struct QuadraticCost<T: Scalar> {
    /// The quadratic form matrix (should be symmetric)
    pub a: DMatrix<T>,
    /// The linear term
    pub b: DVector<T>,
}

impl<T: Scalar> QuadraticCost<T> {
    /// Creates a new quadratic cost function.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `a` is not square or `b` does not
    /// match it.
    pub fn new(a: DMatrix<T>, b: DVector<T>) -> Result<Self> {
        if a.nrows() != a.ncols() {
            return Err(OptimizerError::dimension_mismatch(a.nrows(), a.ncols()));
        }
        if b.len() != a.nrows() {
            return Err(OptimizerError::dimension_mismatch(a.nrows(), b.len()));
        }
        Ok(Self { a, b })
    }

    /// f(x) = 0.5 * sum_i d_i x_i^2
    pub fn diagonal(diag: &[T]) -> Self {
        let n = diag.len();
        Self {
            a: DMatrix::from_diagonal(&DVector::from_column_slice(diag)),
            b: DVector::zeros(n),
        }
    }

    /// The unique minimizer `-A⁻¹ b`, if `A` is invertible.
    pub fn minimizer(&self) -> Option<DVector<T>> {
        self.a.clone().lu().solve(&(-&self.b))
    }
}

impl<T: Scalar> CostFunction<T> for QuadraticCost<T> {
    fn cost(&self, point: &DVector<T>) -> Result<T> {
        let ax = &self.a * point;
        Ok(point.dot(&ax) * <T as Scalar>::from_f64(0.5) + self.b.dot(point))
    }

    fn cost_and_gradient(&self, point: &DVector<T>) -> Result<(T, DVector<T>)> {
        let ax = &self.a * point;
        let cost = point.dot(&ax) * <T as Scalar>::from_f64(0.5) + self.b.dot(point);
        Ok((cost, ax + &self.b))
    }
}

/// Chained Rosenbrock function
///
/// f(w) = sum_i 100 (w_{i+1} - w_i^2)^2 + (1 - w_i)^2, minimized at all ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rosenbrock;

impl<T: Scalar> CostFunction<T> for Rosenbrock {
    fn cost(&self, x: &DVector<T>) -> Result<T> {
        let hundred = <T as Scalar>::from_f64(100.0);
        let mut cost = T::zero();
        for i in 0..x.len().saturating_sub(1) {
            let a = T::one() - x[i];
            let b = x[i + 1] - x[i] * x[i];
            cost += a * a + hundred * b * b;
        }
        Ok(cost)
    }

    fn cost_and_gradient(&self, x: &DVector<T>) -> Result<(T, DVector<T>)> {
        let n = x.len();
        let two = <T as Scalar>::from_f64(2.0);
        let hundred = <T as Scalar>::from_f64(100.0);
        let mut cost = T::zero();
        let mut gradient = DVector::zeros(n);

        for i in 0..n.saturating_sub(1) {
            let a = T::one() - x[i];
            let b = x[i + 1] - x[i] * x[i];
            cost += a * a + hundred * b * b;

            gradient[i] -= two * a + two * two * hundred * x[i] * b;
            gradient[i + 1] += two * hundred * b;
        }

        Ok((cost, gradient))
    }
}

/// Zakharov function
///
/// f(x) = sum x_i^2 + S^2 + S^4 with S = sum 0.5 i x_i (1-based i).
/// Minimized at the origin; badly scaled far from it because of the
/// quartic term.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zakharov;

impl Zakharov {
    fn weighted_sum<T: Scalar>(x: &DVector<T>) -> T {
        let half = <T as Scalar>::from_f64(0.5);
        x.iter()
            .enumerate()
            .fold(T::zero(), |acc, (i, xi)| acc + half * <T as Scalar>::from_f64((i + 1) as f64) * *xi)
    }
}

impl<T: Scalar> CostFunction<T> for Zakharov {
    fn cost(&self, x: &DVector<T>) -> Result<T> {
        let s = Self::weighted_sum(x);
        let s2 = s * s;
        Ok(x.dot(x) + s2 + s2 * s2)
    }

    fn cost_and_gradient(&self, x: &DVector<T>) -> Result<(T, DVector<T>)> {
        let half = <T as Scalar>::from_f64(0.5);
        let two = <T as Scalar>::from_f64(2.0);
        let four = <T as Scalar>::from_f64(4.0);
        let s = Self::weighted_sum(x);
        let s2 = s * s;
        let ds = two * s + four * s2 * s;

        let gradient = DVector::from_fn(x.len(), |i, _| {
            two * x[i] + ds * half * <T as Scalar>::from_f64((i + 1) as f64)
        });
        Ok((x.dot(x) + s2 + s2 * s2, gradient))
    }
}
