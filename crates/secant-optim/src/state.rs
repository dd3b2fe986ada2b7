//! Solver state passed between L-BFGS iterations.
//!
//! A [`SolverState`] is a plain value. [`LBFGS::update`](crate::LBFGS::update)
//! consumes one and returns the next, so a caller can keep any earlier
//! state by cloning it, checkpoint it with serde, or stop between any two
//! iterations without cleanup.

use secant_core::{
    history::HistoryBuffer,
    line_search::LineSearchState,
    types::{self, DVector, Scalar},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything the solver needs to take the next step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "T: Scalar + Serialize",
        deserialize = "T: Scalar + Deserialize<'de>"
    ))
)]
pub struct SolverState<T: Scalar> {
    /// Current parameters
    pub params: DVector<T>,
    /// Objective value at `params`
    pub value: T,
    /// Gradient at `params`
    pub grad: DVector<T>,
    /// Stored secant pairs
    pub history: HistoryBuffer<T>,
    /// Number of completed `update` calls
    pub iteration_count: usize,
    /// Outcome of the most recent line search
    pub last_line_search: Option<LineSearchState<T>>,
    /// Cumulative objective evaluations
    pub num_fun_evals: usize,
    /// Cumulative gradient evaluations
    pub num_grad_evals: usize,
    /// Step accepted by the most recent line search
    pub last_step: Option<T>,
}

impl<T: Scalar> SolverState<T> {
    /// Euclidean norm of the current gradient.
    pub fn grad_norm(&self) -> T {
        types::norm(&self.grad)
    }

    /// Number of parameters.
    pub fn dimension(&self) -> usize {
        self.params.len()
    }

    /// True if the most recent line search reported failure.
    pub fn line_search_failed(&self) -> bool {
        self.last_line_search.as_ref().is_some_and(|ls| ls.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn state() -> SolverState<f64> {
        SolverState {
            params: DVector::from_vec(vec![1.0, 2.0]),
            value: 5.0,
            grad: DVector::from_vec(vec![3.0, 4.0]),
            history: HistoryBuffer::new(2).unwrap(),
            iteration_count: 0,
            last_line_search: None,
            num_fun_evals: 1,
            num_grad_evals: 1,
            last_step: None,
        }
    }

    #[test]
    fn test_accessors() {
        let s = state();
        assert_relative_eq!(s.grad_norm(), 5.0);
        assert_eq!(s.dimension(), 2);
        assert!(!s.line_search_failed());
    }

    #[test]
    fn test_clone_is_independent() {
        let a = state();
        let mut b = a.clone();
        b.params[0] = -1.0;
        b.history
            .push(DVector::from_vec(vec![1.0, 0.0]), DVector::from_vec(vec![1.0, 0.0]))
            .unwrap();
        assert_eq!(a.params[0], 1.0);
        assert!(a.history.is_empty());
    }
}
