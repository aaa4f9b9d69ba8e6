//! In-memory relaxation with a pluggable LP oracle.
//!
//! Stores column data, rows and the last LP solution. Solving is delegated
//! to an [`LpOracle`], so the relaxation can sit in front of any LP solver
//! (or a scripted one in tests).

use std::collections::HashSet;

use super::{LpStatus, Relaxation};
use crate::cuts::{RowId, SharedRow};
use crate::error::{SepaError, SepaResult};

/// A relaxation column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Objective coefficient.
    pub obj: f64,

    /// Lower bound.
    pub lb: f64,

    /// Upper bound.
    pub ub: f64,

    /// Integer constrained.
    pub integral: bool,
}

impl Column {
    /// Continuous column.
    pub fn continuous(obj: f64, lb: f64, ub: f64) -> Self {
        Self {
            obj,
            lb,
            ub,
            integral: false,
        }
    }

    /// Integer column.
    pub fn integer(obj: f64, lb: f64, ub: f64) -> Self {
        Self {
            obj,
            lb,
            ub,
            integral: true,
        }
    }

    /// Binary column.
    pub fn binary(obj: f64) -> Self {
        Self::integer(obj, 0.0, 1.0)
    }
}

/// Read-only view of the LP handed to the oracle.
#[derive(Debug)]
pub struct LpView<'a> {
    /// Objective coefficients.
    pub obj: &'a [f64],

    /// Lower bounds.
    pub lb: &'a [f64],

    /// Upper bounds.
    pub ub: &'a [f64],

    /// Rows in the LP.
    pub rows: &'a [SharedRow],

    /// Whether the LP is a dive.
    pub diving: bool,
}

/// Result of an oracle solve.
#[derive(Debug, Clone)]
pub struct LpOutcome {
    /// Solve status.
    pub status: LpStatus,

    /// Primal values (ignored unless optimal).
    pub x: Vec<f64>,

    /// Objective value (ignored unless optimal).
    pub obj_val: f64,
}

impl LpOutcome {
    /// Optimal outcome.
    pub fn optimal(x: Vec<f64>, obj_val: f64) -> Self {
        Self {
            status: LpStatus::Optimal,
            x,
            obj_val,
        }
    }

    /// Non-optimal outcome with the given status.
    pub fn failed(status: LpStatus) -> Self {
        Self {
            status,
            x: Vec::new(),
            obj_val: f64::INFINITY,
        }
    }
}

/// LP solver behind a [`MemoryRelaxation`].
pub trait LpOracle {
    /// Solve the LP described by `lp`.
    fn solve(&mut self, lp: &LpView<'_>) -> SepaResult<LpOutcome>;
}

impl<F> LpOracle for F
where
    F: FnMut(&LpView<'_>) -> SepaResult<LpOutcome>,
{
    fn solve(&mut self, lp: &LpView<'_>) -> SepaResult<LpOutcome> {
        self(lp)
    }
}

/// State captured when a dive starts.
#[derive(Debug, Clone)]
pub struct MemoryDiveState {
    num_rows: usize,
    x: Vec<f64>,
    obj_val: f64,
    status: LpStatus,
    lb: Vec<f64>,
    ub: Vec<f64>,
}

/// Relaxation keeping all LP data in memory.
pub struct MemoryRelaxation {
    /// Objective coefficients.
    obj: Vec<f64>,

    /// Current local lower bounds.
    lb: Vec<f64>,

    /// Current local upper bounds.
    ub: Vec<f64>,

    /// Integrality flags.
    integral: Vec<bool>,

    /// Rows in the LP, in insertion order.
    rows: Vec<SharedRow>,

    /// Ids of `rows`.
    row_ids: HashSet<RowId>,

    /// Last primal solution.
    x: Vec<f64>,

    /// Last objective value.
    obj_val: f64,

    /// Last status.
    status: LpStatus,

    /// Number of non-dive solves.
    lp_count: u64,

    /// Dive open.
    diving: bool,

    /// Some columns are not yet priced into the LP.
    has_unpriced_cols: bool,

    /// Maximum number of rows the LP accepts.
    row_limit: Option<usize>,

    /// LP solver.
    oracle: Option<Box<dyn LpOracle>>,
}

impl MemoryRelaxation {
    /// Create a relaxation over the given columns.
    pub fn new(columns: Vec<Column>) -> Self {
        let n = columns.len();
        let mut obj = Vec::with_capacity(n);
        let mut lb = Vec::with_capacity(n);
        let mut ub = Vec::with_capacity(n);
        let mut integral = Vec::with_capacity(n);
        for col in columns {
            obj.push(col.obj);
            lb.push(col.lb);
            ub.push(col.ub);
            integral.push(col.integral);
        }
        Self {
            obj,
            lb,
            ub,
            integral,
            rows: Vec::new(),
            row_ids: HashSet::new(),
            x: vec![0.0; n],
            obj_val: 0.0,
            status: LpStatus::NotSolved,
            lp_count: 0,
            diving: false,
            has_unpriced_cols: false,
            row_limit: None,
            oracle: None,
        }
    }

    /// Attach the LP solver.
    pub fn with_oracle(mut self, oracle: impl LpOracle + 'static) -> Self {
        self.oracle = Some(Box::new(oracle));
        self
    }

    /// Reject rows beyond `limit`.
    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = Some(limit);
        self
    }

    /// Replace the LP solver.
    pub fn set_oracle(&mut self, oracle: impl LpOracle + 'static) {
        self.oracle = Some(Box::new(oracle));
    }

    /// Store an externally computed optimal solution, as if the LP was solved.
    pub fn set_solution(&mut self, x: Vec<f64>, obj_val: f64) -> SepaResult<()> {
        if x.len() != self.obj.len() {
            return Err(SepaError::Relaxation(format!(
                "solution has {} values for {} columns",
                x.len(),
                self.obj.len()
            )));
        }
        self.x = x;
        self.obj_val = obj_val;
        self.status = LpStatus::Optimal;
        if !self.diving {
            self.lp_count += 1;
        }
        Ok(())
    }

    /// Change the local bounds of a column.
    pub fn set_bounds(&mut self, col: usize, lb: f64, ub: f64) -> SepaResult<()> {
        if col >= self.obj.len() {
            return Err(SepaError::Relaxation(format!("column {} out of range", col)));
        }
        self.lb[col] = lb;
        self.ub[col] = ub;
        self.status = LpStatus::NotSolved;
        Ok(())
    }

    /// Mark whether some columns are still unpriced.
    pub fn set_unpriced_cols(&mut self, unpriced: bool) {
        self.has_unpriced_cols = unpriced;
    }

    /// Rows currently in the LP.
    pub fn rows(&self) -> &[SharedRow] {
        &self.rows
    }
}

impl Relaxation for MemoryRelaxation {
    type DiveState = MemoryDiveState;

    fn num_cols(&self) -> usize {
        self.obj.len()
    }

    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn primal_values(&self) -> &[f64] {
        &self.x
    }

    fn objective_value(&self) -> f64 {
        self.obj_val
    }

    fn status(&self) -> LpStatus {
        self.status
    }

    fn objective_coefs(&self) -> &[f64] {
        &self.obj
    }

    fn col_lb(&self) -> &[f64] {
        &self.lb
    }

    fn col_ub(&self) -> &[f64] {
        &self.ub
    }

    fn is_integral(&self, col: usize) -> bool {
        self.integral[col]
    }

    fn all_cols_in_lp(&self) -> bool {
        !self.has_unpriced_cols
    }

    fn lp_count(&self) -> u64 {
        self.lp_count
    }

    fn has_row(&self, id: RowId) -> bool {
        self.row_ids.contains(&id)
    }

    fn add_row(&mut self, row: SharedRow) -> SepaResult<()> {
        if row.dim() > self.obj.len() {
            return Err(SepaError::Relaxation(format!(
                "row over {} columns added to LP with {} columns",
                row.dim(),
                self.obj.len()
            )));
        }
        if self.row_limit.is_some_and(|limit| self.rows.len() >= limit) {
            return Err(SepaError::Relaxation(format!(
                "LP row limit {} reached",
                self.rows.len()
            )));
        }
        if !self.row_ids.insert(row.id()) {
            return Err(SepaError::Relaxation(format!(
                "row {} is already in the LP",
                row.id()
            )));
        }
        self.rows.push(row);
        self.status = LpStatus::NotSolved;
        Ok(())
    }

    fn solve(&mut self) -> SepaResult<LpStatus> {
        let oracle = self
            .oracle
            .as_mut()
            .ok_or_else(|| SepaError::Relaxation("no LP oracle attached".to_string()))?;

        let view = LpView {
            obj: &self.obj,
            lb: &self.lb,
            ub: &self.ub,
            rows: &self.rows,
            diving: self.diving,
        };
        let outcome = oracle.solve(&view)?;

        self.status = outcome.status;
        if outcome.status == LpStatus::Optimal {
            if outcome.x.len() != self.obj.len() {
                self.status = LpStatus::NumericalError;
                return Err(SepaError::Relaxation(format!(
                    "oracle returned {} values for {} columns",
                    outcome.x.len(),
                    self.obj.len()
                )));
            }
            self.x = outcome.x;
            self.obj_val = outcome.obj_val;
        } else {
            self.obj_val = f64::INFINITY;
        }
        if !self.diving {
            self.lp_count += 1;
        }
        log::trace!(
            "LP solve: status={:?} obj={:.6e} rows={} diving={}",
            self.status,
            self.obj_val,
            self.rows.len(),
            self.diving
        );
        Ok(self.status)
    }

    fn in_dive(&self) -> bool {
        self.diving
    }

    fn start_dive(&mut self) -> SepaResult<MemoryDiveState> {
        if self.diving {
            return Err(SepaError::DiveActive);
        }
        self.diving = true;
        Ok(MemoryDiveState {
            num_rows: self.rows.len(),
            x: self.x.clone(),
            obj_val: self.obj_val,
            status: self.status,
            lb: self.lb.clone(),
            ub: self.ub.clone(),
        })
    }

    fn end_dive(&mut self, state: MemoryDiveState) {
        for row in self.rows.drain(state.num_rows..) {
            self.row_ids.remove(&row.id());
        }
        self.x = state.x;
        self.obj_val = state.obj_val;
        self.status = state.status;
        self.lb = state.lb;
        self.ub = state.ub;
        self.diving = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuts::Row;
    use crate::relax::DiveGuard;

    fn relax() -> MemoryRelaxation {
        MemoryRelaxation::new(vec![Column::binary(1.0), Column::continuous(2.0, 0.0, 4.0)])
            .with_oracle(|lp: &LpView<'_>| -> SepaResult<LpOutcome> {
                // Each row raises the objective by one.
                Ok(LpOutcome::optimal(vec![0.5, 1.0], 1.0 + lp.rows.len() as f64))
            })
    }

    fn row() -> SharedRow {
        Row::builder(2).coef(0, 1.0).rhs(1.0).build_shared().unwrap()
    }

    #[test]
    fn test_solve_counts_lps() {
        let mut lp = relax();
        assert_eq!(lp.status(), LpStatus::NotSolved);
        assert_eq!(lp.solve().unwrap(), LpStatus::Optimal);
        assert_eq!(lp.lp_count(), 1);
        assert_eq!(lp.objective_value(), 1.0);
        assert_eq!(lp.primal_values(), &[0.5, 1.0]);
    }

    #[test]
    fn test_add_row_twice_rejected() {
        let mut lp = relax();
        let r = row();
        lp.add_row(r.clone()).unwrap();
        assert!(lp.add_row(r.clone()).is_err());
        assert!(lp.has_row(r.id()));
        assert_eq!(lp.num_rows(), 1);
    }

    #[test]
    fn test_dive_restores_state() {
        let mut lp = relax();
        lp.solve().unwrap();
        let rows_before = lp.num_rows();
        let obj_before = lp.objective_value();
        let r = row();

        {
            let mut dive = DiveGuard::enter(&mut lp).unwrap();
            dive.add_row(r.clone()).unwrap();
            dive.solve().unwrap();
            assert_eq!(dive.objective_value(), 2.0);
            assert_eq!(dive.relaxation().num_rows(), rows_before + 1);
        }

        assert!(!lp.in_dive());
        assert_eq!(lp.num_rows(), rows_before);
        assert_eq!(lp.objective_value(), obj_before);
        assert!(!lp.has_row(r.id()));
        assert_eq!(lp.lp_count(), 1);
    }

    #[test]
    fn test_nested_dive_rejected() {
        let mut lp = relax();
        let state = lp.start_dive().unwrap();
        assert!(matches!(lp.start_dive(), Err(SepaError::DiveActive)));
        lp.end_dive(state);
        assert!(!lp.in_dive());
    }

    #[test]
    fn test_dive_restores_after_failed_solve() {
        let mut lp = relax();
        lp.solve().unwrap();
        lp.set_oracle(|_: &LpView<'_>| -> SepaResult<LpOutcome> {
            Err(SepaError::Relaxation("boom".to_string()))
        });

        let result = (|| -> SepaResult<LpStatus> {
            let mut dive = DiveGuard::enter(&mut lp)?;
            dive.add_row(row())?;
            dive.solve()
        })();

        assert!(result.is_err());
        assert!(!lp.in_dive());
        assert_eq!(lp.num_rows(), 0);
        assert_eq!(lp.objective_value(), 1.0);
        assert_eq!(lp.status(), LpStatus::Optimal);
    }

    #[test]
    fn test_solve_without_oracle() {
        let mut lp = MemoryRelaxation::new(vec![Column::binary(1.0)]);
        assert!(lp.solve().is_err());
        lp.set_solution(vec![0.3], 0.3).unwrap();
        assert_eq!(lp.status(), LpStatus::Optimal);
        assert_eq!(lp.lp_count(), 1);
        assert!(lp.set_solution(vec![0.3, 0.1], 0.3).is_err());
    }
}
