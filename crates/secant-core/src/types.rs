//! Type definitions and aliases for quasi-Newton optimization.
//!
//! This module provides the scalar trait shared by every component, the
//! vector alias used for parameters and gradients, and numerical constants.

use nalgebra::{Dyn, OVector, RealField, Scalar as NalgebraScalar};
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};

/// Trait for scalar types used in optimization (f32 or f64).
///
/// This trait combines all the necessary numeric traits required
/// by the history buffer, the line searches and the solver.
pub trait Scalar:
    NalgebraScalar
    + RealField
    + Float
    + FromPrimitive
    + Display
    + Debug
    + Default
    + Copy
    + Send
    + Sync
    + 'static
{
    /// Machine epsilon for this scalar type.
    const EPSILON: Self;

    /// Smallest curvature `<s, y>` for which a secant pair is stored.
    ///
    /// Pairs at or below this threshold would make the implied inverse
    /// Hessian approximation indefinite or badly scaled.
    const CURVATURE_EPSILON: Self;

    /// Default tolerance on the gradient norm.
    const DEFAULT_GRADIENT_TOLERANCE: Self;

    /// Convert from f64 (for constants).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails. Use `try_from_f64` for a non-panicking version.
    fn from_f64(v: f64) -> Self {
        <Self as FromPrimitive>::from_f64(v).expect("Failed to convert from f64")
    }

    /// Try to convert from f64.
    ///
    /// Returns None if the conversion fails.
    fn try_from_f64(v: f64) -> Option<Self> {
        <Self as FromPrimitive>::from_f64(v)
    }

    /// Convert to f64 (for logging/display).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails. Use `try_to_f64` for a non-panicking version.
    fn to_f64(self) -> f64 {
        num_traits::cast(self).expect("Failed to convert to f64")
    }

    /// Try to convert to f64.
    fn try_to_f64(self) -> Option<f64> {
        num_traits::cast(self)
    }
}

impl Scalar for f32 {
    const EPSILON: Self = f32::EPSILON;
    const CURVATURE_EPSILON: Self = 1e-10;
    const DEFAULT_GRADIENT_TOLERANCE: Self = 1e-4;
}

impl Scalar for f64 {
    const EPSILON: Self = f64::EPSILON;
    const CURVATURE_EPSILON: Self = 1e-16;
    const DEFAULT_GRADIENT_TOLERANCE: Self = 1e-6;
}

/// Type alias for a dynamically-sized vector.
///
/// Parameters, gradients, search directions and secant vectors all use it.
pub type DVector<T> = OVector<T, Dyn>;

/// Numerical constants for different precision levels.
pub mod constants {
    use super::Scalar;

    /// Get machine epsilon for the given scalar type.
    pub fn epsilon<T: Scalar>() -> T {
        T::EPSILON
    }

    /// Get the secant curvature threshold.
    pub fn curvature_epsilon<T: Scalar>() -> T {
        T::CURVATURE_EPSILON
    }

    /// Get default gradient convergence tolerance.
    pub fn gradient_tolerance<T: Scalar>() -> T {
        T::DEFAULT_GRADIENT_TOLERANCE
    }
}

/// Euclidean norm of a vector, computed in the scalar's own precision.
pub fn norm<T: Scalar>(v: &DVector<T>) -> T {
    <T as Float>::sqrt(v.dot(v))
}

/// Returns true if every component is finite.
pub fn all_finite<T: Scalar>(v: &DVector<T>) -> bool {
    v.iter().all(|x| <T as Float>::is_finite(*x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar_trait_f32() {
        assert_eq!(<f32 as Scalar>::EPSILON, f32::EPSILON);
        assert!(f32::CURVATURE_EPSILON > 0.0);
        assert!(f32::DEFAULT_GRADIENT_TOLERANCE > f32::CURVATURE_EPSILON);
    }

    #[test]
    fn test_scalar_trait_f64() {
        assert_eq!(<f64 as Scalar>::EPSILON, f64::EPSILON);
        assert!(f64::CURVATURE_EPSILON > 0.0);
        assert!(f64::DEFAULT_GRADIENT_TOLERANCE < f32::DEFAULT_GRADIENT_TOLERANCE as f64);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(<f64 as Scalar>::from_f64(0.5), 0.5);
        assert_relative_eq!(<f32 as Scalar>::from_f64(0.1), 0.1_f32);
        assert_eq!(Scalar::to_f64(2.0_f32), 2.0);
        assert_eq!(<f64 as Scalar>::try_from_f64(f64::NAN).map(f64::is_nan), Some(true));
    }

    #[test]
    fn test_norm_and_finiteness() {
        let v = DVector::from_vec(vec![3.0, 4.0]);
        assert_relative_eq!(norm(&v), 5.0);
        assert!(all_finite(&v));

        let w = DVector::from_vec(vec![1.0, f64::INFINITY]);
        assert!(!all_finite(&w));
    }
}
