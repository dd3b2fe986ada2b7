//! L-BFGS two-loop recursion.
//!
//! Applies the implicit limited-memory inverse Hessian approximation `H_k`
//! to a gradient without ever forming a matrix:
//!
//! ```text
//! q = g
//! for i = newest ..= oldest:
//!     α_i = ρ_i <s_i, q>
//!     q  -= α_i y_i
//!
//! r = γ q            γ = <s_newest, y_newest> / <y_newest, y_newest>  (or 1)
//!
//! for i = oldest ..= newest:
//!     β = ρ_i <y_i, r>
//!     r += (α_i - β) s_i
//!
//! direction = -r
//! ```
//!
//! With an empty history this reduces to steepest descent. Because every
//! stored pair satisfies `<s, y> > 0`, `H_k` is positive definite and the
//! returned direction is a descent direction whenever the gradient is
//! nonzero.

use crate::{
    history::HistoryBuffer,
    types::{DVector, Scalar},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Two-loop recursion with optional initial scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TwoLoopPreconditioner {
    /// Scale the initial approximation `H_0 = γ I` by the newest pair
    pub scale_init_precond: bool,
}

impl Default for TwoLoopPreconditioner {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TwoLoopPreconditioner {
    /// Creates a preconditioner.
    pub fn new(scale_init_precond: bool) -> Self {
        Self { scale_init_precond }
    }

    /// Computes the preconditioned descent direction `-H_k g`.
    pub fn apply<T: Scalar>(&self, history: &HistoryBuffer<T>, gradient: &DVector<T>) -> DVector<T> {
        let mut direction = DVector::zeros(gradient.len());
        let mut alphas = vec![T::zero(); history.len()];
        self.apply_into(history, gradient, &mut direction, &mut alphas);
        direction
    }

    /// Allocation-free variant of [`apply`](Self::apply).
    ///
    /// `direction` must have the gradient's length and `alphas` must hold at
    /// least `history.len()` entries.
    ///
    /// # Panics
    ///
    /// Panics if the buffers are too small.
    pub fn apply_into<T: Scalar>(
        &self,
        history: &HistoryBuffer<T>,
        gradient: &DVector<T>,
        direction: &mut DVector<T>,
        alphas: &mut [T],
    ) {
        let m = history.len();
        assert!(alphas.len() >= m, "alpha scratch smaller than history");

        let q = direction;
        q.copy_from(gradient);

        for (i, pair) in history.pairs().enumerate().rev() {
            let alpha = pair.inverse_curvature * pair.position_delta.dot(&*q);
            q.axpy(-alpha, &pair.gradient_delta, T::one());
            alphas[i] = alpha;
        }

        if self.scale_init_precond {
            if let Some(newest) = history.newest() {
                let yy = newest.gradient_delta.dot(&newest.gradient_delta);
                if yy > T::zero() {
                    let gamma = newest.curvature() / yy;
                    q.scale_mut(gamma);
                }
            }
        }

        let r = q;
        for (i, pair) in history.pairs().enumerate() {
            let beta = pair.inverse_curvature * pair.gradient_delta.dot(&*r);
            r.axpy(alphas[i] - beta, &pair.position_delta, T::one());
        }

        r.neg_mut();
    }
}
