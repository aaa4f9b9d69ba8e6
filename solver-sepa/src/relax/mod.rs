//! LP relaxation interface consumed by the separation layer.

mod dive;
mod memory;

pub use dive::DiveGuard;
pub use memory::{Column, LpOracle, LpOutcome, LpView, MemoryDiveState, MemoryRelaxation};

use crate::cuts::{RowId, SharedRow};
use crate::error::SepaResult;

/// Status of the last relaxation solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    /// Relaxation has not been solved since it was last modified.
    NotSolved,

    /// Optimal solution found.
    Optimal,

    /// Relaxation is infeasible.
    Infeasible,

    /// Relaxation is unbounded.
    Unbounded,

    /// Iteration or time limit hit inside the LP solver.
    Limit,

    /// Numerical difficulties.
    NumericalError,
}

/// Trait for LP relaxation backends.
///
/// The relaxation owns the current LP at the node being processed: column
/// data, the rows added so far and the last solution. The separation layer
/// reads it, appends accepted cuts and re-solves it inside dives.
pub trait Relaxation {
    /// Restore token captured when a dive starts.
    type DiveState;

    /// Number of columns.
    fn num_cols(&self) -> usize;

    /// Number of rows (including cuts added so far).
    fn num_rows(&self) -> usize;

    /// Primal values of the last solve (length `num_cols`).
    fn primal_values(&self) -> &[f64];

    /// Objective value of the last solve.
    fn objective_value(&self) -> f64;

    /// Status of the last solve.
    fn status(&self) -> LpStatus;

    /// Objective coefficients (length `num_cols`).
    fn objective_coefs(&self) -> &[f64];

    /// Current local lower bounds.
    fn col_lb(&self) -> &[f64];

    /// Current local upper bounds.
    fn col_ub(&self) -> &[f64];

    /// Whether a column is integer constrained.
    fn is_integral(&self, col: usize) -> bool;

    /// Whether every problem column is present in the LP (no unpriced columns).
    fn all_cols_in_lp(&self) -> bool;

    /// Number of non-dive solves performed so far.
    fn lp_count(&self) -> u64;

    /// Whether the row is currently part of the LP.
    fn has_row(&self, id: RowId) -> bool;

    /// Append a row to the LP.
    fn add_row(&mut self, row: SharedRow) -> SepaResult<()>;

    /// Solve the current LP.
    fn solve(&mut self) -> SepaResult<LpStatus>;

    /// Whether a dive is currently open.
    fn in_dive(&self) -> bool;

    /// Open a dive and return the state needed to undo it.
    ///
    /// Fails with `SepaError::DiveActive` if a dive is already open.
    fn start_dive(&mut self) -> SepaResult<Self::DiveState>;

    /// Close the dive, restoring the LP to the captured state.
    fn end_dive(&mut self, state: Self::DiveState);

    /// Squared Euclidean norm of the objective.
    fn objective_sqr_norm(&self) -> f64 {
        self.objective_coefs().iter().map(|c| c * c).sum()
    }
}
