//! Secant Optimization - the L-BFGS solver and its driver loop.
//!
//! This crate assembles the building blocks of `secant-core` into a
//! limited-memory BFGS solver. The solver is a pure state transition:
//! [`LBFGS::init`] evaluates the starting point, [`LBFGS::update`] takes one
//! step, and [`LBFGS::minimize`] loops until a [`StoppingCriterion`] fires.
//!
//! # Examples
//!
//! ```rust
//! use secant_optim::{LBFGS, LBFGSConfig, StoppingCriterion};
//! use secant_core::line_search::BacktrackingConfig;
//!
//! // L-BFGS with 5 stored pairs and Armijo backtracking
//! let lbfgs = LBFGS::<f64>::new(
//!     LBFGSConfig::new()
//!         .with_memory_size(5)
//!         .with_backtracking(BacktrackingConfig::new().with_c1(1e-4)),
//! )
//! .unwrap();
//!
//! // Set up stopping criteria
//! let stopping_criterion = StoppingCriterion::<f64>::new()
//!     .with_max_iterations(1000)
//!     .with_gradient_tolerance(1e-6);
//!
//! // Run optimization (cost_fn, initial_point defined elsewhere)
//! // let result = lbfgs.minimize(&cost_fn, &initial_point, &stopping_criterion)?;
//! ```

pub mod lbfgs;
pub mod optimizer;
pub mod state;

// Re-export main types for convenience
pub use lbfgs::{LBFGSConfig, LBFGS};
pub use optimizer::{OptimizationResult, SolverStatus, StoppingCriterion, TerminationReason};
pub use state::SolverState;

// Re-export commonly used items from core
pub use secant_core::{
    history::HistoryBuffer,
    line_search::{BacktrackingConfig, InitialGuess, LineSearch, LineSearchState, ZoomConfig},
    preconditioner::TwoLoopPreconditioner,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::lbfgs::{LBFGSConfig, LBFGS};
    pub use crate::optimizer::{
        OptimizationResult, SolverStatus, StoppingCriterion, TerminationReason,
    };
    pub use crate::state::SolverState;
    pub use secant_core::prelude::*;
}
