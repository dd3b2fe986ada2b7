//! Core building blocks for limited-memory quasi-Newton optimization.
//!
//! This crate provides everything an L-BFGS iteration is made of, short of
//! the outer loop: the objective interface, the bounded secant history, the
//! two-loop preconditioner and the two line searches.
//!
//! # Key Concepts
//!
//! - **Secant pairs**: Position and gradient changes between accepted iterates
//! - **Two-loop recursion**: Applies the implicit inverse Hessian built from
//!   the stored pairs to a gradient
//! - **Line searches**: Armijo backtracking and strong Wolfe bracketing/zoom
//!
//! # Modules
//!
//! - [`cost_function`]: Objective interface and counting wrapper
//! - [`cached_cost_function`]: Last-point caching wrapper
//! - [`error`]: Error types
//! - [`history`]: Ring buffer of secant pairs
//! - [`line_search`]: Backtracking and zoom line searches
//! - [`preconditioner`]: Two-loop recursion
//! - [`types`]: Scalar trait, vector alias and numerical constants

pub mod cached_cost_function;
pub mod cost_function;
pub mod error;
pub mod history;
pub mod line_search;
pub mod preconditioner;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key items
pub use error::{OptimizerError, Result};
pub use types::{DVector, Scalar};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use secant_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cached_cost_function::CachedCostFunction;
    pub use crate::cost_function::{CostFunction, CountingCostFunction, DerivativeChecker};
    pub use crate::error::{OptimizerError, Result};
    pub use crate::history::{HistoryBuffer, SecantPair};
    pub use crate::line_search::{
        BacktrackingConfig, BracketPoint, InitialGuess, LineSearch, LineSearchDiagnostics,
        LineSearchState, LineSearchTermination, ZoomConfig,
    };
    pub use crate::preconditioner::TwoLoopPreconditioner;
    pub use crate::types::{constants, DVector, Scalar};
}
