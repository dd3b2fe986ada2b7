//! Limited-memory quasi-Newton optimization.
//!
//! This crate re-exports the workspace under one name:
//!
//! - [`secant_core`]: objective interface, secant history, two-loop
//!   preconditioner and line searches
//! - [`secant_optim`]: the L-BFGS solver, its state and the driver loop
//!
//! # Example
//!
//! ```rust
//! use secant::prelude::*;
//!
//! /// f(x, y) = (x - 1)² + 10 (y + 2)²
//! #[derive(Debug)]
//! struct Bowl;
//!
//! impl CostFunction<f64> for Bowl {
//!     fn cost(&self, p: &DVector<f64>) -> Result<f64> {
//!         Ok((p[0] - 1.0).powi(2) + 10.0 * (p[1] + 2.0).powi(2))
//!     }
//!
//!     fn cost_and_gradient(&self, p: &DVector<f64>) -> Result<(f64, DVector<f64>)> {
//!         let grad = DVector::from_vec(vec![2.0 * (p[0] - 1.0), 20.0 * (p[1] + 2.0)]);
//!         Ok((self.cost(p)?, grad))
//!     }
//! }
//!
//! let lbfgs = LBFGS::new(LBFGSConfig::new().with_zoom(ZoomConfig::new()))?;
//! let result = lbfgs.minimize(&Bowl, &DVector::zeros(2), &StoppingCriterion::new())?;
//!
//! assert!(result.converged);
//! assert!((result.params[0] - 1.0).abs() < 1e-5);
//! assert!((result.params[1] + 2.0).abs() < 1e-5);
//! # Ok::<(), OptimizerError>(())
//! ```

pub use nalgebra;
pub use secant_core;
pub use secant_optim;

pub use secant_core::{DVector, OptimizerError, Result, Scalar};
pub use secant_optim::{
    LBFGSConfig, OptimizationResult, SolverState, StoppingCriterion, TerminationReason, LBFGS,
};

/// Everything needed to define an objective and minimize it.
pub mod prelude {
    pub use secant_optim::prelude::*;
}
